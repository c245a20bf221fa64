//! Module: db::dedup
//! Responsibility: exactly-once delivery when several index entries can reach
//! one object.
//! Does not own: deciding whether a strategy can revisit rows (the session
//! picks the initial mode from its access plan).

use crate::{
    error::{ErrorOrigin, InternalError},
    obs::{MetricsEvent, MetricsSink},
    types::Dnt,
};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

///
/// DuplicateDetectionMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DuplicateDetectionMode {
    Never,
    FixedBlock,
    HashTable,
}

///
/// DuplicateSuppressor
///
/// Tri-modal seen-set. Starts as a small linear block and promotes itself to
/// a hash table when the block fills.
///

#[derive(Debug)]
pub struct DuplicateSuppressor {
    state: State,
    block_capacity: usize,
}

#[derive(Debug)]
enum State {
    Never,
    FixedBlock(Vec<Dnt>),
    HashTable(HashSet<Dnt, Xxh3Builder>),
}

impl DuplicateSuppressor {
    #[must_use]
    pub const fn never() -> Self {
        Self {
            state: State::Never,
            block_capacity: 0,
        }
    }

    #[must_use]
    pub fn fixed_block(block_capacity: usize) -> Self {
        let block_capacity = block_capacity.max(1);

        Self {
            state: State::FixedBlock(Vec::with_capacity(block_capacity)),
            block_capacity,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> DuplicateDetectionMode {
        match self.state {
            State::Never => DuplicateDetectionMode::Never,
            State::FixedBlock(_) => DuplicateDetectionMode::FixedBlock,
            State::HashTable(_) => DuplicateDetectionMode::HashTable,
        }
    }

    /// Report whether `dnt` was seen before, recording it when it was not.
    pub fn is_duplicate(
        &mut self,
        dnt: Dnt,
        metrics: &dyn MetricsSink,
    ) -> Result<bool, InternalError> {
        let duplicate = self.check_and_record(dnt, metrics, true)?;
        if duplicate {
            metrics.record(MetricsEvent::DuplicateSuppressed);
        }

        Ok(duplicate)
    }

    fn check_and_record(
        &mut self,
        dnt: Dnt,
        metrics: &dyn MetricsSink,
        may_promote: bool,
    ) -> Result<bool, InternalError> {
        match &mut self.state {
            State::Never => Ok(false),
            State::FixedBlock(block) => {
                if block.contains(&dnt) {
                    return Ok(true);
                }
                if block.len() < self.block_capacity {
                    block.push(dnt);
                    return Ok(false);
                }
                if !may_promote {
                    return Err(InternalError::search_invariant(
                        "duplicate block still full after promotion",
                    ));
                }

                self.promote(metrics)?;
                self.check_and_record(dnt, metrics, false)
            }
            State::HashTable(table) => {
                if table.contains(&dnt) {
                    return Ok(true);
                }
                table.try_reserve(1).map_err(|err| {
                    InternalError::out_of_memory(
                        ErrorOrigin::Search,
                        format!("duplicate table insert failed: {err}"),
                    )
                })?;
                table.insert(dnt);

                Ok(false)
            }
        }
    }

    fn promote(&mut self, metrics: &dyn MetricsSink) -> Result<(), InternalError> {
        let State::FixedBlock(block) = &mut self.state else {
            return Err(InternalError::search_invariant(
                "duplicate promotion requested outside fixed-block mode",
            ));
        };

        let mut table = HashSet::with_hasher(Xxh3Builder::new());
        table
            .try_reserve(block.len().saturating_mul(2))
            .map_err(|err| {
                InternalError::out_of_memory(
                    ErrorOrigin::Search,
                    format!("duplicate table allocation failed: {err}"),
                )
            })?;
        for dnt in block.drain(..) {
            if !table.insert(dnt) {
                return Err(InternalError::search_invariant(format!(
                    "duplicate block held {dnt} twice"
                )));
            }
        }

        tracing::debug!(entries = table.len(), "promoting duplicate block to hash table");
        metrics.record(MetricsEvent::DuplicatePromoted);
        self.state = State::HashTable(table);

        Ok(())
    }

    /// Every identifier recorded so far, in no particular order.
    #[must_use]
    pub fn seen(&self) -> Vec<Dnt> {
        match &self.state {
            State::Never => Vec::new(),
            State::FixedBlock(block) => block.clone(),
            State::HashTable(table) => table.iter().copied().collect(),
        }
    }

    /// Rebuild a suppressor in `mode`, replaying previously seen identifiers.
    pub fn restore(
        mode: DuplicateDetectionMode,
        block_capacity: usize,
        seen: &[Dnt],
        metrics: &dyn MetricsSink,
    ) -> Result<Self, InternalError> {
        let mut out = match mode {
            DuplicateDetectionMode::Never => return Ok(Self::never()),
            DuplicateDetectionMode::FixedBlock | DuplicateDetectionMode::HashTable => {
                Self::fixed_block(block_capacity)
            }
        };
        for dnt in seen {
            out.check_and_record(*dnt, metrics, true)?;
        }

        Ok(out)
    }
}

///
/// TESTS
///
