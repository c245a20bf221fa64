use crate::{
    db::{
        asq::ReferralCause,
        direction::Direction,
        index::{AncestorBlob, IndexType},
        scope::SearchScope,
        search::{
            Positioned, SearchOutcome,
            context::{Deadline, SearchContext},
            key::{AccessPlan, PendingStep, SearchKey},
        },
        security::{FilterSecurityGate, SecuritySlot},
        store::{DirectoryCursor, Move, TempColumn},
        vlv::{VlvOutcome, VlvRequest},
    },
    error::{ErrorClass, ErrorOrigin, InternalError, StoreResultExt},
    obs::{MetricsEvent, VlvStrategy},
    traits::SecurityDescriptor,
    types::Dnt,
};

///
/// SearchSession
///
/// One directory search: the storage cursor, the positioning state, and the
/// capabilities it evaluates candidates against. Sessions are single-threaded
/// and own everything they touch except the injected context.
///

pub struct SearchSession<'a, C: DirectoryCursor> {
    pub(crate) cursor: C,
    pub(crate) key: SearchKey,
    pub(crate) ancestors: AncestorBlob,
    pub(crate) security: SecuritySlot,
    pub(crate) ctx: SearchContext<'a>,

    pub(crate) time_limit: Option<u64>,
    pub(crate) deadline: Option<Deadline>,

    /// Skip the next time-limit check; set at the start of every step and
    /// after a subtree skip so the re-seek always completes.
    pub(crate) force_loop: bool,
    pub(crate) last_direction: Direction,
}

impl<'a, C: DirectoryCursor> SearchSession<'a, C> {
    #[must_use]
    pub fn new(cursor: C, key: SearchKey, ctx: SearchContext<'a>) -> Self {
        ctx.metrics.record(MetricsEvent::SearchStart);
        tracing::debug!(
            search_type = ?key.scope.search_type,
            root = %key.scope.root,
            index_type = ?key.index_type,
            asq = key.is_asq(),
            vlv = key.vlv.is_some(),
            "search session opened"
        );

        Self::from_parts(cursor, key, ctx)
    }

    /// Open a session from a scope and the optimizer's access plan.
    #[must_use]
    pub fn open(cursor: C, scope: SearchScope, plan: AccessPlan, ctx: SearchContext<'a>) -> Self {
        let key = SearchKey::new(scope, plan, ctx.config);
        Self::new(cursor, key, ctx)
    }

    pub(crate) fn from_parts(cursor: C, key: SearchKey, ctx: SearchContext<'a>) -> Self {
        Self {
            cursor,
            key,
            ancestors: AncestorBlob::with_capacity(ctx.config.ancestors_initial_capacity),
            security: SecuritySlot::default(),
            time_limit: ctx.config.time_limit_ticks,
            deadline: None,
            force_loop: false,
            last_direction: Direction::Forward,
            ctx,
        }
    }

    /// Per-step time limit in clock ticks; `None` disables the check.
    pub const fn set_time_limit(&mut self, ticks: Option<u64>) {
        self.time_limit = ticks;
    }

    #[must_use]
    pub const fn key(&self) -> &SearchKey {
        &self.key
    }

    pub const fn cursor_mut(&mut self) -> &mut C {
        &mut self.cursor
    }

    /// Descriptor of the object most recently returned.
    #[must_use]
    pub const fn security_descriptor(&self) -> Option<&SecurityDescriptor> {
        self.security.descriptor()
    }

    #[must_use]
    pub fn referral(&self) -> ReferralCause {
        self.key
            .asq
            .as_ref()
            .map_or(ReferralCause::None, |asq| asq.err.cause())
    }

    pub(crate) fn arm_deadline(&mut self) {
        self.deadline = self
            .time_limit
            .map(|delta| Deadline::starting_now(self.ctx.clock, delta));
        self.force_loop = true;
    }

    /// Advance to the next object that passes duplicate, security and
    /// filter checks.
    pub fn get_next_search_object(
        &mut self,
        direction: Direction,
    ) -> Result<SearchOutcome, InternalError> {
        if self.ctx.security.is_some() {
            self.security.release();
        }
        self.last_direction = direction;
        self.arm_deadline();

        let gate = FilterSecurityGate::new(self.ctx.security, self.ctx.filter);
        loop {
            let dnt = match self.move_to_next_candidate(direction)? {
                Positioned::Candidate(dnt) => dnt,
                Positioned::NotAnObject(dnt) => {
                    tracing::debug!(%dnt, "asq member is not an object here");
                    return Ok(SearchOutcome::NotAnObject(dnt));
                }
                Positioned::TimeLimitExceeded => return Ok(SearchOutcome::TimeLimitExceeded),
                Positioned::NoMoreCandidates => {
                    let referral = self.referral();
                    if referral != ReferralCause::None {
                        return Ok(SearchOutcome::Referral(referral));
                    }
                    return Ok(SearchOutcome::EndOfResults);
                }
            };

            if self.key.dups.is_duplicate(dnt, self.ctx.metrics)? {
                self.key.on_candidate = false;
                continue;
            }
            if !gate.evaluate(dnt, &mut self.cursor, &mut self.security)? {
                self.key.on_candidate = false;
                self.ctx.metrics.record(MetricsEvent::FilterRejected);
                continue;
            }

            self.ctx.metrics.record(MetricsEvent::EntryReturned);
            return Ok(SearchOutcome::Entry(dnt));
        }
    }

    /// Position a VLV window. The next `get_next_search_object` in the same
    /// direction returns the first row of the window.
    pub fn position_vlv(
        &mut self,
        direction: Direction,
        request: VlvRequest,
    ) -> Result<VlvOutcome, InternalError> {
        let Some(vlv) = self.key.vlv.as_mut() else {
            return Err(InternalError::vlv_invariant(
                "VLV positioning requested on a search without VLV state",
            ));
        };
        vlv.begin(request);
        self.last_direction = direction;
        self.arm_deadline();
        self.security.release();

        let direction = direction.xor(self.key.change_direction);
        let outcome = match self.key.index_type {
            IndexType::TempTableOnDisk => {
                self.materialize_sort_table()?;
                self.position_in_array(direction)
            }
            IndexType::TempTableMemoryArray if !self.key.is_asq() => {
                self.position_in_array(direction)
            }
            IndexType::Unset | IndexType::Generic if !direction.is_forward() => {
                return Err(InternalError::new(
                    ErrorClass::Unsupported,
                    ErrorOrigin::Vlv,
                    "VLV container positioning only serves forward windows",
                ));
            }
            IndexType::Unset | IndexType::Generic => self.position_in_container()?,
            IndexType::Invalid => VlvOutcome::Empty,
            other => {
                return Err(InternalError::new(
                    ErrorClass::Unsupported,
                    ErrorOrigin::Vlv,
                    format!("VLV positioning is not supported over {other:?}"),
                ));
            }
        };

        match outcome {
            VlvOutcome::Positioned { .. } => {
                self.key.search_in_progress = true;
                self.key.pending = PendingStep::Current;
            }
            VlvOutcome::Empty => {
                self.key.search_in_progress = true;
                self.key.pending = PendingStep::Exhausted;
            }
            VlvOutcome::TimeLimitExceeded => {
                self.ctx.metrics.record(MetricsEvent::TimeLimitExceeded);
            }
            VlvOutcome::OffsetRangeError => {}
        }
        tracing::debug!(?outcome, "vlv positioned");

        Ok(outcome)
    }

    fn position_in_array(&mut self, direction: Direction) -> VlvOutcome {
        let key = &mut self.key;
        let Some(vlv) = key.vlv.as_mut() else {
            return VlvOutcome::Empty;
        };
        let outcome = vlv.position_in_array(&mut key.array, direction);
        if matches!(outcome, VlvOutcome::Positioned { .. }) {
            self.ctx.metrics.record(MetricsEvent::VlvPositioned {
                strategy: VlvStrategy::MemoryArray,
            });
        }

        outcome
    }

    /// Read a sort table into the memory array so VLV can index it.
    fn materialize_sort_table(&mut self) -> Result<(), InternalError> {
        let Some(mut table) = self.key.sort_table.take() else {
            return Err(InternalError::vlv_invariant("sort-table strategy without a table"));
        };

        let mut ids = Vec::new();
        let mut step = Move::First;
        while table.move_to(step).map_store()?.is_moved() {
            step = Move::Next;
            let raw = table.retrieve_column(TempColumn::Dnt).map_store()?;
            let dnt = raw
                .as_deref()
                .and_then(Dnt::from_column_slice)
                .ok_or_else(|| InternalError::store_corruption("sort table row has no identifier"))?;
            ids.push(dnt);
        }

        tracing::debug!(rows = ids.len(), "materialized sort table for vlv");
        self.key.array.replace(ids);
        self.key.index_type = IndexType::TempTableMemoryArray;

        Ok(())
    }

    /// End the search and hand back the cursor.
    #[must_use]
    pub fn close(mut self) -> C {
        self.security.release();
        tracing::debug!(root = %self.key.scope.root, "search session closed");

        self.cursor
    }
}
