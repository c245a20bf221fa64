//! Metrics sink boundary.
//!
//! Search logic never touches `obs::metrics` directly. Every session carries
//! a `&dyn MetricsSink` in its context and emits `MetricsEvent`s through it;
//! `GlobalMetricsSink` is the default bridge into the thread-local counters.

use crate::obs::metrics;

///
/// VlvStrategy
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VlvStrategy {
    MemoryArray,
    Boundary,
    BoundaryWalk,
    KeyReseek,
    FractionalSeek,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    SearchStart,
    Reposition,
    IndexSeek {
        index: &'a str,
    },
    RowScanned {
        index: &'a str,
    },
    CandidatePositioned,
    RowSkipped,
    RangeAdvanced,
    SubtreeSkipped,
    TimeLimitExceeded,
    EntryReturned,
    FilterRejected,
    DuplicateSuppressed,
    DuplicatePromoted,
    ReferralRaised,
    AsqFetch {
        rows: u64,
    },
    VlvPositioned {
        strategy: VlvStrategy,
    },
    VlvExactCount,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into thread-local metrics state.

pub struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        metrics::with_state_mut(|m| {
            let ops = &mut m.ops;
            match event {
                MetricsEvent::SearchStart => {
                    ops.searches_started = ops.searches_started.saturating_add(1);
                }
                MetricsEvent::Reposition => ops.repositions = ops.repositions.saturating_add(1),
                MetricsEvent::IndexSeek { index } => {
                    let entry = m.indexes.entry(index.to_string()).or_default();
                    entry.seeks = entry.seeks.saturating_add(1);
                }
                MetricsEvent::RowScanned { index } => {
                    let entry = m.indexes.entry(index.to_string()).or_default();
                    entry.rows_scanned = entry.rows_scanned.saturating_add(1);
                }
                MetricsEvent::CandidatePositioned => {
                    ops.candidates_positioned = ops.candidates_positioned.saturating_add(1);
                }
                MetricsEvent::RowSkipped => ops.rows_skipped = ops.rows_skipped.saturating_add(1),
                MetricsEvent::RangeAdvanced => {
                    ops.range_advances = ops.range_advances.saturating_add(1);
                }
                MetricsEvent::SubtreeSkipped => {
                    ops.subtree_skips = ops.subtree_skips.saturating_add(1);
                }
                MetricsEvent::TimeLimitExceeded => {
                    ops.time_limits_hit = ops.time_limits_hit.saturating_add(1);
                }
                MetricsEvent::EntryReturned => {
                    ops.entries_returned = ops.entries_returned.saturating_add(1);
                }
                MetricsEvent::FilterRejected => {
                    ops.filter_rejects = ops.filter_rejects.saturating_add(1);
                }
                MetricsEvent::DuplicateSuppressed => {
                    ops.duplicates_suppressed = ops.duplicates_suppressed.saturating_add(1);
                }
                MetricsEvent::DuplicatePromoted => {
                    ops.duplicate_promotions = ops.duplicate_promotions.saturating_add(1);
                }
                MetricsEvent::ReferralRaised => {
                    ops.referrals_raised = ops.referrals_raised.saturating_add(1);
                }
                MetricsEvent::AsqFetch { rows } => {
                    ops.asq_fetches = ops.asq_fetches.saturating_add(1);
                    ops.asq_rows_fetched = ops.asq_rows_fetched.saturating_add(rows);
                }
                MetricsEvent::VlvPositioned { strategy } => {
                    let vlv = &mut m.vlv;
                    let slot = match strategy {
                        VlvStrategy::MemoryArray => &mut vlv.array_positions,
                        VlvStrategy::Boundary | VlvStrategy::BoundaryWalk => {
                            &mut vlv.boundary_walks
                        }
                        VlvStrategy::KeyReseek => &mut vlv.key_reseeks,
                        VlvStrategy::FractionalSeek => &mut vlv.fractional_seeks,
                    };
                    *slot = slot.saturating_add(1);
                }
                MetricsEvent::VlvExactCount => {
                    m.vlv.exact_counts = m.vlv.exact_counts.saturating_add(1);
                }
            }
        });
    }
}

pub static GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

/// Snapshot the current metrics state for endpoint/test plumbing.
///
/// `window_start_ms` filters by window start (`EventState::window_start_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}
