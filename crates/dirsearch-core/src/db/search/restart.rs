//! Suspend a search between pages and resume it on a fresh cursor.
//!
//! Index walks remember the row they stopped on by bookmark, identifier and
//! key. On resume the bookmark is tried first; if the row is gone or no longer
//! carries the same key, the cursor seeks the saved key and the row it lands
//! on is inspected without moving past it.

use crate::{
    db::{
        array::IdArray,
        asq::AsqState,
        dedup::{DuplicateDetectionMode, DuplicateSuppressor},
        direction::Direction,
        index::{IndexChain, IndexStrategy, IndexType},
        scope::SearchScope,
        search::{
            context::SearchContext,
            key::{PendingStep, SearchKey},
            session::SearchSession,
        },
        store::{DirectoryCursor, RangeLimit, SeekMode, TempTable, read_dnt},
        vlv::VlvState,
    },
    error::{InternalError, StoreResultExt},
    obs::MetricsEvent,
    types::{ColumnId, Dnt},
};

///
/// SavedPosition
///

#[derive(Clone, Debug, Eq, PartialEq)]
struct SavedPosition {
    dnt: Dnt,
    key: Vec<u8>,
    bookmark: Vec<u8>,
    /// The row was positioned but not yet delivered.
    undelivered: bool,
}

///
/// RestartState
///
/// Everything a suspended search needs to continue. Temp tables and ASQ
/// sources move here with their own positions.
///

pub struct RestartState {
    scope: SearchScope,
    index_type: IndexType,
    search_in_progress: bool,
    change_direction: bool,
    direction: Direction,
    time_limit: Option<u64>,

    chain: IndexChain,
    sort_table: Option<Box<dyn TempTable>>,
    array: IdArray,
    vlv: Option<VlvState>,
    asq: Option<AsqState>,

    dup_mode: DuplicateDetectionMode,
    seen: Vec<Dnt>,
    saved: Option<SavedPosition>,
}

impl RestartState {
    #[must_use]
    pub const fn scope(&self) -> &SearchScope {
        &self.scope
    }

    #[must_use]
    pub const fn has_saved_position(&self) -> bool {
        self.saved.is_some()
    }
}

impl<'a, C: DirectoryCursor> SearchSession<'a, C> {
    /// Capture the search state and release the cursor.
    pub fn suspend(mut self) -> Result<(C, RestartState), InternalError> {
        self.security.release();

        let walking_index = matches!(
            self.key.index_type,
            IndexType::Generic | IndexType::AncestorsIndex | IndexType::TupleIndex
        );
        let saved = if walking_index
            && self.key.search_in_progress
            && self.key.pending != PendingStep::Exhausted
        {
            Some(self.save_position()?)
        } else {
            None
        };

        let mut key = self.key;
        let mut search_in_progress = key.search_in_progress;
        if let Some(asq) = key.asq.as_ref()
            && asq.mode.paged
        {
            // Paged ASQ resumes from its watermark, not from the batch.
            search_in_progress = false;
            if !asq.mode.sorted {
                key.array.clear();
            }
        }

        tracing::debug!(
            index_type = ?key.index_type,
            saved = saved.is_some(),
            "search suspended"
        );

        let state = RestartState {
            scope: key.scope,
            index_type: key.index_type,
            search_in_progress,
            change_direction: key.change_direction,
            direction: self.last_direction,
            time_limit: self.time_limit,
            chain: key.chain,
            sort_table: key.sort_table,
            array: key.array,
            vlv: key.vlv,
            asq: key.asq,
            dup_mode: key.dups.mode(),
            seen: key.dups.seen(),
            saved,
        };

        Ok((self.cursor, state))
    }

    fn save_position(&mut self) -> Result<SavedPosition, InternalError> {
        let dnt = read_dnt(&mut self.cursor, ColumnId::Dnt)?
            .ok_or_else(|| InternalError::store_corruption("object row has no identifier"))?;

        Ok(SavedPosition {
            dnt,
            key: self.cursor.retrieve_key().map_store()?,
            bookmark: self.cursor.bookmark().map_store()?,
            undelivered: self.key.pending == PendingStep::Current,
        })
    }

    /// Rebuild a session from a suspended state on `cursor`.
    pub fn reposition(
        cursor: C,
        state: RestartState,
        ctx: SearchContext<'a>,
    ) -> Result<Self, InternalError> {
        ctx.metrics.record(MetricsEvent::Reposition);
        let dups = DuplicateSuppressor::restore(
            state.dup_mode,
            ctx.config.dup_block_capacity,
            &state.seen,
            ctx.metrics,
        )?;

        let key = SearchKey {
            scope: state.scope,
            index_type: state.index_type,
            search_in_progress: state.search_in_progress,
            on_candidate: false,
            change_direction: state.change_direction,
            pending: PendingStep::None,
            chain: state.chain,
            sort_table: state.sort_table,
            array: state.array,
            dups,
            vlv: state.vlv,
            asq: state.asq,
        };
        let mut session = Self::from_parts(cursor, key, ctx);
        session.time_limit = state.time_limit;
        session.last_direction = state.direction;

        if let Some(saved) = state.saved {
            session.restore_position(&saved, state.direction)?;
        }

        Ok(session)
    }

    fn restore_position(
        &mut self,
        saved: &SavedPosition,
        direction: Direction,
    ) -> Result<(), InternalError> {
        let direction = direction.xor(self.key.change_direction);
        let Some(range) = self
            .key
            .chain
            .front()
            .and_then(IndexStrategy::key_range)
            .cloned()
        else {
            return Err(InternalError::search_invariant(
                "saved index position without an index range",
            ));
        };
        self.cursor.set_index(&range.index).map_store()?;

        let on_saved_row = self.cursor.goto_bookmark(&saved.bookmark).map_store()?
            && read_dnt(&mut self.cursor, ColumnId::Dnt)? == Some(saved.dnt)
            && self.cursor.seek(&saved.key, SeekMode::Eq).map_store()?.is_found();

        if on_saved_row {
            if saved.undelivered {
                self.key.pending = PendingStep::Current;
            }
        } else {
            let mode = if direction.is_forward() {
                SeekMode::Ge
            } else {
                SeekMode::Le
            };
            if !self.cursor.seek(&saved.key, mode).map_store()?.is_found() {
                tracing::debug!(dnt = %saved.dnt, "saved position is past the end of its range");
                self.key.pending = PendingStep::Exhausted;
                return Ok(());
            }
            self.key.pending = PendingStep::Current;
        }

        let limit = if direction.is_forward() {
            range.upper.as_deref().map(|key| (key, RangeLimit::Upper { inclusive: true }))
        } else {
            range.lower.as_deref().map(|key| (key, RangeLimit::Lower { inclusive: true }))
        };
        if let Some((key, limit)) = limit
            && !self.cursor.set_index_range(key, limit).map_store()?.is_moved()
        {
            self.key.pending = PendingStep::Exhausted;
        }
        tracing::debug!(
            dnt = %saved.dnt,
            restored = on_saved_row,
            "search repositioned"
        );

        Ok(())
    }
}
