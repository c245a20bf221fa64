//! Module: db::asq
//! Responsibility: attribute-scoped query enumeration over batched link values.
//! Does not own: resolving identifiers to rows (the positioner does that) or
//! building the link-value batches (an injected `AsqSource` does).
//! Boundary: the storage-side read watermark only moves forward.

use crate::{
    db::{array::IdArray, direction::Direction},
    error::InternalError,
    obs::{MetricsEvent, MetricsSink},
    traits::AsqSource,
    types::Dnt,
};

///
/// ReferralCause
///
/// Ordered by priority; a sticky referral never moves down.
///

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub enum ReferralCause {
    #[default]
    None,
    AffectsMultipleDsas,
    MissingAttributesOnGc,
}

///
/// StickyReferral
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StickyReferral {
    cause: ReferralCause,
}

impl StickyReferral {
    /// Record `cause` unless an equal or higher-priority cause is set.
    /// Returns whether the stored cause changed.
    pub fn raise(&mut self, cause: ReferralCause) -> bool {
        if cause > self.cause {
            self.cause = cause;
            return true;
        }

        false
    }

    #[must_use]
    pub const fn cause(self) -> ReferralCause {
        self.cause
    }
}

///
/// AsqMode
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AsqMode {
    pub paged: bool,
    pub sorted: bool,
}

impl AsqMode {
    pub const SIMPLE: Self = Self {
        paged: false,
        sorted: false,
    };
    pub const PAGED: Self = Self {
        paged: true,
        sorted: false,
    };
    pub const SORTED: Self = Self {
        paged: false,
        sorted: true,
    };
    pub const SORTED_PAGED: Self = Self {
        paged: true,
        sorted: true,
    };
}

///
/// AsqState
///
/// Per-search ASQ bookkeeping plus the link-value source.
///

pub struct AsqState {
    pub mode: AsqMode,
    pub size_limit: u32,

    /// Link values consumed so far; the next storage read starts here.
    pub last_upper_bound: u32,

    pub missing_attributes_on_gc: bool,
    pub err: StickyReferral,

    /// Total value count, once a batch reported the end of the values.
    known_total: Option<u32>,
    sorted_loaded: bool,
    source: Box<dyn AsqSource>,
}

impl AsqState {
    #[must_use]
    pub fn new(source: Box<dyn AsqSource>, mode: AsqMode, size_limit: u32) -> Self {
        Self {
            mode,
            size_limit: size_limit.max(1),
            last_upper_bound: 0,
            missing_attributes_on_gc: false,
            err: StickyReferral::default(),
            known_total: None,
            sorted_loaded: false,
            source,
        }
    }

    /// Never fetch more than `page_size` values per batch.
    pub(crate) fn cap_page_size(&mut self, page_size: u32) {
        self.size_limit = self.size_limit.min(page_size.max(1));
    }

    fn fetch_batch(
        &mut self,
        array: &mut IdArray,
        metrics: &dyn MetricsSink,
    ) -> Result<(), InternalError> {
        let batch = self.source.fetch(self.last_upper_bound, self.size_limit)?;
        let fetched = u32::try_from(batch.ids.len()).unwrap_or(u32::MAX);
        metrics.record(MetricsEvent::AsqFetch {
            rows: u64::from(fetched),
        });
        tracing::debug!(
            watermark = self.last_upper_bound,
            fetched,
            exhausted = batch.exhausted,
            "asq batch fetched"
        );

        if batch.exhausted {
            self.known_total = Some(self.last_upper_bound.saturating_add(fetched));
        }
        array.replace(batch.ids);

        Ok(())
    }

    fn fetch_all(
        &mut self,
        array: &mut IdArray,
        metrics: &dyn MetricsSink,
    ) -> Result<(), InternalError> {
        let mut all = Vec::new();
        let mut watermark = 0u32;
        loop {
            let batch = self.source.fetch(watermark, self.size_limit)?;
            let fetched = u32::try_from(batch.ids.len()).unwrap_or(u32::MAX);
            metrics.record(MetricsEvent::AsqFetch {
                rows: u64::from(fetched),
            });
            watermark = watermark.saturating_add(fetched);
            all.extend(batch.ids);
            if batch.exhausted || fetched == 0 {
                break;
            }
        }
        self.known_total = Some(watermark);
        array.replace(all);

        Ok(())
    }

    fn values_remain(&self) -> bool {
        self.known_total
            .is_none_or(|total| self.last_upper_bound < total)
    }

    /// Move the batch cursor one identifier; `None` is end-of-results.
    pub fn move_next(
        &mut self,
        array: &mut IdArray,
        direction: Direction,
        search_in_progress: bool,
        metrics: &dyn MetricsSink,
    ) -> Result<Option<Dnt>, InternalError> {
        let forward = direction.is_forward();
        if !forward && self.mode.paged && !self.mode.sorted {
            return Err(InternalError::asq_unsupported(
                "reverse ASQ paged search is not supported",
            ));
        }

        if search_in_progress {
            if forward {
                array.set_position(array.position().saturating_add(1));
            } else {
                let Some(position) = array.position().checked_sub(1) else {
                    return Ok(None);
                };
                array.set_position(position);
            }
        } else {
            self.start(array, forward, metrics)?;
        }

        if forward {
            if array.position() > array.len() {
                if self.mode.sorted || !self.values_remain() {
                    return Ok(None);
                }
                self.fetch_batch(array, metrics)?;
                array.set_position(1);
            }
            let Some(dnt) = array.current() else {
                return Ok(None);
            };
            self.last_upper_bound = self.last_upper_bound.saturating_add(1);

            return Ok(Some(dnt));
        }

        Ok(array.current())
    }

    fn start(
        &mut self,
        array: &mut IdArray,
        forward: bool,
        metrics: &dyn MetricsSink,
    ) -> Result<(), InternalError> {
        if self.mode.sorted {
            if !self.sorted_loaded {
                let ids = self.source.fetch_sorted()?;
                metrics.record(MetricsEvent::AsqFetch {
                    rows: ids.len() as u64,
                });
                array.replace(ids);
                self.sorted_loaded = true;
            }
            if self.mode.paged {
                let resume = usize::try_from(self.last_upper_bound).unwrap_or(usize::MAX);
                if forward {
                    array.set_position(resume.saturating_add(1));
                } else {
                    array.set_position(resume.min(array.len()));
                }
            } else {
                self.last_upper_bound = 0;
                array.set_position(if forward { 1 } else { array.len() });
            }

            return Ok(());
        }

        if !self.mode.paged {
            self.last_upper_bound = 0;
            self.known_total = None;
            if !forward {
                self.fetch_all(array, metrics)?;
                array.set_position(array.len());
                return Ok(());
            }
        }

        // Paged: the watermark already reflects earlier pages.
        if self.values_remain() {
            self.fetch_batch(array, metrics)?;
            array.set_position(1);
        } else {
            array.clear();
            array.set_position(1);
        }

        Ok(())
    }
}

///
/// TESTS
///
