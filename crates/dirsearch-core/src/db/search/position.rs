//! Candidate positioning: move the storage cursor to the next row that
//! satisfies the structural search criteria. Filter, security and duplicate
//! checks happen one level up in the session.

use crate::{
    db::{
        array::IdArray,
        asq::{ReferralCause, StickyReferral},
        direction::Direction,
        index::{IndexStrategy, IndexType, next_subtree_lower_bound},
        scope::{LocationMode, ScopeValidator, SearchType},
        search::{Positioned, key::PendingStep, session::SearchSession},
        store::{
            ColumnRead, DirectoryCursor, RangeLimit, SeekMode, TempColumn, read_dnt, read_flag,
            read_u32,
        },
        vlv::VlvState,
    },
    error::{InternalError, StoreResultExt},
    obs::MetricsEvent,
    types::{ColumnId, Dnt, InstanceType},
};

///
/// Step
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Step {
    Moved,
    Exhausted,
}

///
/// RowVerdict
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RowVerdict {
    Candidate(Dnt),
    Skip,
    /// Reject this row and every row below it in the ancestors index.
    SkipSubtree,
    NotAnObject(Dnt),
}

impl<C: DirectoryCursor> SearchSession<'_, C> {
    pub(crate) fn move_to_next_candidate(
        &mut self,
        direction: Direction,
    ) -> Result<Positioned, InternalError> {
        let direction = direction.xor(self.key.change_direction);
        self.key.on_candidate = false;

        loop {
            if self.ctx.shutdown.should_stop(self.ctx.caller) {
                tracing::debug!("search abandoned during shutdown");
                return Ok(Positioned::NoMoreCandidates);
            }
            if !std::mem::take(&mut self.force_loop) && self.time_limit_hit() {
                self.ctx.metrics.record(MetricsEvent::TimeLimitExceeded);
                return Ok(Positioned::TimeLimitExceeded);
            }

            if self.step(direction)? == Step::Exhausted {
                if self.advance_chain() {
                    continue;
                }
                return Ok(Positioned::NoMoreCandidates);
            }
            self.key.search_in_progress = true;
            self.resolve_link()?;

            match self.inspect_row()? {
                RowVerdict::Candidate(dnt) => {
                    self.key.on_candidate = true;
                    self.ctx.metrics.record(MetricsEvent::CandidatePositioned);
                    return Ok(Positioned::Candidate(dnt));
                }
                RowVerdict::NotAnObject(dnt) => return Ok(Positioned::NotAnObject(dnt)),
                RowVerdict::Skip => self.ctx.metrics.record(MetricsEvent::RowSkipped),
                RowVerdict::SkipSubtree => {
                    if !self.skip_subtree()? && !self.advance_chain() {
                        return Ok(Positioned::NoMoreCandidates);
                    }
                    self.force_loop = true;
                }
            }
        }
    }

    pub(crate) fn time_limit_hit(&self) -> bool {
        self.key.scope.search_type != SearchType::BaseOnly
            && self
                .deadline
                .is_some_and(|deadline| deadline.expired(self.ctx.clock))
    }

    /// Release the exhausted chain element; `true` when another one follows.
    fn advance_chain(&mut self) -> bool {
        if !self.key.is_chain_strategy() || !self.key.chain.advance() {
            return false;
        }

        self.key.index_type = IndexType::Unset;
        self.key.search_in_progress = false;
        self.ctx.metrics.record(MetricsEvent::RangeAdvanced);
        tracing::debug!(remaining = self.key.chain.len(), "advancing to next index range");

        true
    }

    fn step(&mut self, direction: Direction) -> Result<Step, InternalError> {
        match std::mem::take(&mut self.key.pending) {
            PendingStep::Exhausted => return Ok(Step::Exhausted),
            PendingStep::Current => {
                if self.resume_on_current()? {
                    return Ok(Step::Moved);
                }
            }
            PendingStep::None => {}
        }

        match self.key.index_type {
            IndexType::Invalid => Ok(Step::Exhausted),
            IndexType::TempTableOnDisk => self.step_sort_table(direction),
            IndexType::TempTableMemoryArray => {
                if self.key.is_asq() {
                    self.step_asq(direction)
                } else if self.key.vlv.is_some() && direction.is_forward() {
                    self.step_vlv_array()
                } else {
                    self.step_array(direction)
                }
            }
            IndexType::Unset => self.start_chain_element(direction),
            IndexType::Intersection => self.step_intersection(direction),
            IndexType::Generic | IndexType::AncestorsIndex | IndexType::TupleIndex => {
                if self.key.search_in_progress {
                    self.step_index(direction)
                } else {
                    self.seek_range_start(direction)
                }
            }
        }
    }

    /// The cursor was left on a row that has not been inspected yet.
    fn resume_on_current(&mut self) -> Result<bool, InternalError> {
        if self.key.index_type != IndexType::TempTableMemoryArray {
            return Ok(true);
        }
        let Some(dnt) = self.key.array.current() else {
            return Ok(false);
        };

        self.cursor.find_object(dnt).map_store()
    }

    fn start_chain_element(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Some(front) = self.key.chain.front() else {
            return Ok(Step::Exhausted);
        };
        self.key.index_type = front.index_type();
        self.key.search_in_progress = false;

        if self.key.index_type == IndexType::Intersection {
            self.step_intersection(direction)
        } else {
            self.seek_range_start(direction)
        }
    }

    fn seek_range_start(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Self {
            cursor, key, ctx, ..
        } = self;
        let Some(range) = key.chain.front().and_then(IndexStrategy::key_range) else {
            return Err(InternalError::search_invariant(
                "index strategy has no key range",
            ));
        };
        if key.index_type == IndexType::AncestorsIndex && !direction.is_forward() {
            return Err(InternalError::index_invariant(
                "ancestors index cannot be walked backward",
            ));
        }
        if range.is_empty() {
            return Ok(Step::Exhausted);
        }

        cursor.set_index(&range.index).map_store()?;
        ctx.metrics.record(MetricsEvent::IndexSeek {
            index: range.index.as_str(),
        });

        if range.exact_match {
            let Some(lower) = range.lower.as_deref() else {
                return Err(InternalError::search_invariant(
                    "exact-match range has no key",
                ));
            };
            let found = cursor.seek(lower, SeekMode::Eq).map_store()?.is_found();
            return Ok(if found { Step::Moved } else { Step::Exhausted });
        }

        let (start, mode, limit_key, limit) = if direction.is_forward() {
            (
                range.lower.as_deref(),
                SeekMode::Ge,
                range.upper.as_deref(),
                RangeLimit::Upper { inclusive: true },
            )
        } else {
            (
                range.upper.as_deref(),
                SeekMode::Le,
                range.lower.as_deref(),
                RangeLimit::Lower { inclusive: true },
            )
        };

        let landed = match start {
            Some(start) => cursor.seek(start, mode).map_store()?.is_found(),
            None => cursor.move_to(direction.start()).map_store()?.is_moved(),
        };
        if !landed {
            return Ok(Step::Exhausted);
        }
        if let Some(limit_key) = limit_key
            && !cursor.set_index_range(limit_key, limit).map_store()?.is_moved()
        {
            return Ok(Step::Exhausted);
        }
        tracing::trace!(index = range.index.as_str(), ?direction, "range start");

        Ok(Step::Moved)
    }

    fn step_index(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Self {
            cursor, key, ctx, ..
        } = self;
        let Some(range) = key.chain.front().and_then(IndexStrategy::key_range) else {
            return Ok(Step::Exhausted);
        };
        if range.exact_match {
            return Ok(Step::Exhausted);
        }
        if key.index_type == IndexType::AncestorsIndex && !direction.is_forward() {
            return Err(InternalError::index_invariant(
                "ancestors index cannot be walked backward",
            ));
        }
        debug_assert_eq!(
            cursor.current_index_name(),
            Some(range.index.as_str()),
            "cursor is not on the range's index"
        );

        if !cursor.move_to(direction.step()).map_store()?.is_moved() {
            return Ok(Step::Exhausted);
        }
        ctx.metrics.record(MetricsEvent::RowScanned {
            index: range.index.as_str(),
        });

        Ok(Step::Moved)
    }

    fn step_intersection(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Self { cursor, key, .. } = self;
        let Some(IndexStrategy::Intersection(table)) = key.chain.front_mut() else {
            return Err(InternalError::search_invariant(
                "intersection strategy without an intersection table",
            ));
        };
        if !table.has_column(TempColumn::Bookmark) {
            return Err(InternalError::index_invariant(
                "intersection table carries no bookmark column",
            ));
        }

        loop {
            let step = if key.search_in_progress {
                direction.step()
            } else {
                direction.start()
            };
            key.search_in_progress = true;
            if !table.move_to(step).map_store()?.is_moved() {
                return Ok(Step::Exhausted);
            }

            let Some(bookmark) = table.retrieve_column(TempColumn::Bookmark).map_store()? else {
                return Err(InternalError::store_corruption(
                    "intersection row has no bookmark",
                ));
            };
            if cursor.goto_bookmark(&bookmark).map_store()? {
                return Ok(Step::Moved);
            }
            tracing::trace!("intersection bookmark no longer resolves");
        }
    }

    fn step_sort_table(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Self { cursor, key, .. } = self;
        let Some(table) = key.sort_table.as_mut() else {
            return Err(InternalError::search_invariant(
                "sort-table strategy without a table",
            ));
        };

        loop {
            let step = if key.search_in_progress {
                direction.step()
            } else {
                direction.start()
            };
            key.search_in_progress = true;
            if !table.move_to(step).map_store()?.is_moved() {
                return Ok(Step::Exhausted);
            }

            let raw = table.retrieve_column(TempColumn::Dnt).map_store()?;
            let Some(dnt) = raw.as_deref().and_then(Dnt::from_column_slice) else {
                return Err(InternalError::store_corruption(
                    "sort table row has no identifier",
                ));
            };
            if cursor.find_object(dnt).map_store()? {
                return Ok(Step::Moved);
            }
            tracing::trace!(%dnt, "sort table entry no longer resolves");
        }
    }

    fn step_array(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Self { cursor, key, .. } = self;

        loop {
            let Some(next) = next_array_position(&key.array, direction, key.search_in_progress)
            else {
                key.array.set_position(if direction.is_forward() {
                    key.array.len().saturating_add(1)
                } else {
                    0
                });
                return Ok(Step::Exhausted);
            };
            key.search_in_progress = true;
            key.array.set_position(next);

            let Some(dnt) = key.array.current() else {
                return Ok(Step::Exhausted);
            };
            if cursor.find_object(dnt).map_store()? {
                return Ok(Step::Moved);
            }
            tracing::trace!(%dnt, "array entry no longer resolves");
        }
    }

    fn step_vlv_array(&mut self) -> Result<Step, InternalError> {
        let Self { cursor, key, .. } = self;

        loop {
            let Some(dnt) = VlvState::step_in_array(&mut key.array) else {
                return Ok(Step::Exhausted);
            };
            if cursor.find_object(dnt).map_store()? {
                return Ok(Step::Moved);
            }
        }
    }

    fn step_asq(&mut self, direction: Direction) -> Result<Step, InternalError> {
        let Self {
            cursor, key, ctx, ..
        } = self;
        let Some(asq) = key.asq.as_mut() else {
            return Err(InternalError::search_invariant("asq strategy without asq state"));
        };

        let Some(dnt) =
            asq.move_next(&mut key.array, direction, key.search_in_progress, ctx.metrics)?
        else {
            return Ok(Step::Exhausted);
        };
        key.search_in_progress = true;
        if !cursor.find_object(dnt).map_store()? {
            return Err(InternalError::store_not_found(dnt.to_string()));
        }

        Ok(Step::Moved)
    }

    /// Link and backlink indexes position on the link row; move the object
    /// cursor to the row the entry points at.
    fn resolve_link(&mut self) -> Result<(), InternalError> {
        let Some(column) = self
            .key
            .chain
            .front()
            .and_then(IndexStrategy::key_range)
            .and_then(|range| range.link_column)
        else {
            return Ok(());
        };
        if !matches!(
            self.key.index_type,
            IndexType::Generic | IndexType::TupleIndex
        ) {
            return Ok(());
        }

        let mut buf = [0u8; 4];
        let target = match self
            .cursor
            .retrieve_index_column(column, &mut buf)
            .map_store()?
        {
            ColumnRead::Value(4) => Dnt::from_column_bytes(buf),
            other => {
                return Err(InternalError::store_corruption(format!(
                    "link index entry has unusable target column: {other:?}"
                )));
            }
        };
        if !self.cursor.find_object(target).map_store()? {
            return Err(InternalError::search_internal(format!(
                "link target {target} has no object row"
            )));
        }

        Ok(())
    }

    /// Structural checks on the object row under the cursor.
    pub(crate) fn inspect_row(&mut self) -> Result<RowVerdict, InternalError> {
        let Self {
            cursor,
            key,
            ancestors,
            ctx,
            ..
        } = self;
        let dnt = read_dnt(cursor, ColumnId::Dnt)?
            .ok_or_else(|| InternalError::store_corruption("object row has no identifier"))?;
        let walking_ancestors = key.index_type == IndexType::AncestorsIndex;

        if !read_flag(cursor, ColumnId::ObjectFlag)? {
            if key.asq.is_some() {
                return Ok(RowVerdict::NotAnObject(dnt));
            }
            return Ok(RowVerdict::Skip);
        }

        if !key.scope.include_deleted && read_flag(cursor, ColumnId::IsDeleted)? {
            return Ok(if walking_ancestors {
                RowVerdict::SkipSubtree
            } else {
                RowVerdict::Skip
            });
        }

        let instance_type = read_u32(cursor, ColumnId::InstanceType)?.map(InstanceType::from_bits);
        if let Some(asq) = key.asq.as_mut()
            && instance_type.is_some_and(|it| !it.is_writable())
            && (key.scope.gc_partial_attributes || key.scope.one_nc_only)
        {
            asq.missing_attributes_on_gc = true;
            if asq.err.raise(ReferralCause::MissingAttributesOnGc) {
                ctx.metrics.record(MetricsEvent::ReferralRaised);
            }
            if key.scope.one_nc_only {
                return Ok(RowVerdict::NotAnObject(dnt));
            }
        }

        let asq_active = key.asq.is_some();
        if key.index_type.prefilters_location() && !asq_active {
            return Ok(RowVerdict::Candidate(dnt));
        }

        let validator = ScopeValidator::new(&key.scope);
        let nc_dnt = read_dnt(cursor, ColumnId::NcDnt)?;
        let mut scratch = StickyReferral::default();
        let referral = key.asq.as_mut().map_or(&mut scratch, |asq| &mut asq.err);
        let before = referral.cause();
        let in_nc = validator.is_in_correct_nc(dnt, instance_type, nc_dnt, asq_active, referral);
        if referral.cause() != before {
            ctx.metrics.record(MetricsEvent::ReferralRaised);
        }
        if !in_nc {
            // Everything below a foreign NC head is foreign too, but only
            // when the search is confined to one naming context.
            return Ok(if walking_ancestors && key.scope.one_nc_only {
                RowVerdict::SkipSubtree
            } else {
                RowVerdict::Skip
            });
        }

        let mode = LocationMode {
            asq_active,
            container_index: key
                .vlv
                .as_ref()
                .is_some_and(|vlv| vlv.using_alternate_container_key),
        };
        if validator.is_in_correct_location(cursor, ancestors, mode)? {
            return Ok(RowVerdict::Candidate(dnt));
        }
        if walking_ancestors {
            return Ok(RowVerdict::SkipSubtree);
        }

        let pdnt_leading = key
            .chain
            .front()
            .and_then(IndexStrategy::key_range)
            .is_some_and(|range| range.pdnt_leading);
        if pdnt_leading && key.scope.search_type == SearchType::ImmediateChildren {
            return Err(InternalError::index_invariant(format!(
                "{dnt} reached through a parent-keyed range but is not a child of {}",
                key.scope.root
            )));
        }

        Ok(RowVerdict::Skip)
    }

    /// Replace the ancestors range's lower bound with the first key past the
    /// current object's subtree. Returns `false` when nothing can follow.
    fn skip_subtree(&mut self) -> Result<bool, InternalError> {
        let Self {
            cursor,
            key,
            ancestors,
            ctx,
            ..
        } = self;
        ancestors.fetch(cursor)?;

        let Some(IndexStrategy::Ancestors(range)) = key.chain.front_mut() else {
            return Err(InternalError::index_invariant(
                "subtree skip requested outside an ancestors range",
            ));
        };
        let Some(next) = next_subtree_lower_bound(ancestors.as_bytes()) else {
            return Ok(false);
        };
        range.set_lower(&next);

        key.search_in_progress = false;
        key.index_type = IndexType::Unset;
        ctx.metrics.record(MetricsEvent::SubtreeSkipped);
        tracing::trace!(depth = ancestors.len(), "skipped ancestors subtree");

        Ok(!range.is_empty())
    }
}

fn next_array_position(array: &IdArray, direction: Direction, in_progress: bool) -> Option<usize> {
    let position = match (in_progress, direction.is_forward()) {
        (false, true) => 1,
        (false, false) => array.len(),
        (true, true) => array.position().saturating_add(1),
        (true, false) => array.position().checked_sub(1)?,
    };

    (position >= 1 && position <= array.len()).then_some(position)
}
