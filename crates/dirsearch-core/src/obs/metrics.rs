use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for search activity.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub vlv: VlvCounters,
    pub indexes: BTreeMap<String, IndexCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            vlv: VlvCounters::default(),
            indexes: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Session entrypoints
    pub searches_started: u64,
    pub repositions: u64,

    // Positioning
    pub candidates_positioned: u64,
    pub rows_skipped: u64,
    pub range_advances: u64,
    pub subtree_skips: u64,
    pub time_limits_hit: u64,

    // Result shaping
    pub entries_returned: u64,
    pub filter_rejects: u64,
    pub duplicates_suppressed: u64,
    pub duplicate_promotions: u64,
    pub referrals_raised: u64,

    // ASQ
    pub asq_fetches: u64,
    pub asq_rows_fetched: u64,
}

///
/// VlvCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct VlvCounters {
    pub array_positions: u64,
    pub boundary_walks: u64,
    pub key_reseeks: u64,
    pub fractional_seeks: u64,
    pub exact_counts: u64,
}

///
/// IndexCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IndexCounters {
    pub seeks: u64,
    pub rows_scanned: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and restart the window.
pub fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `window_start_ms`.
    pub counters: Option<EventState>,
    /// Per-index summaries, busiest first.
    pub index_counters: Vec<IndexSummary>,
}

///
/// IndexSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IndexSummary {
    pub name: String,
    pub seeks: u64,
    pub rows_scanned: u64,
    pub avg_rows_per_seek: f64,
}

/// Build a report, optionally filtered by the caller's window start.
///
/// A `window_start_ms` later than the current window yields an empty report.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if window_start_ms.is_some_and(|start| start > snap.window_start_ms) {
        return EventReport::default();
    }

    let mut index_counters: Vec<IndexSummary> = snap
        .indexes
        .iter()
        .map(|(name, c)| IndexSummary {
            name: name.clone(),
            seeks: c.seeks,
            rows_scanned: c.rows_scanned,
            avg_rows_per_seek: if c.seeks > 0 {
                c.rows_scanned as f64 / c.seeks as f64
            } else {
                0.0
            },
        })
        .collect();

    index_counters.sort_by(|a, b| {
        b.rows_scanned
            .cmp(&a.rows_scanned)
            .then_with(|| a.name.cmp(&b.name))
    });

    EventReport {
        counters: Some(snap),
        index_counters,
    }
}

///
/// TESTS
///
