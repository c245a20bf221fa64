//! VLV positioning over a real container: a bounded range of one index.
//!
//! Row counts come from the engine's fractional positions and are only
//! estimates. Positions near either container boundary, or near the previous
//! position, are found by walking eligible rows instead so the window lands
//! on the exact row.

use crate::{
    db::{
        direction::Direction,
        index::{IndexStrategy, IndexType},
        search::{position::RowVerdict, session::SearchSession},
        security::FilterSecurityGate,
        store::{DirectoryCursor, FractionalPosition, Move, RangeLimit, SeekMode},
        vlv::{
            PositionOp, VlvOutcome,
            math::{mul_div_round, proportional_position, rescale},
        },
    },
    error::{InternalError, StoreResultExt},
    obs::{MetricsEvent, VlvStrategy},
};

///
/// ContainerBounds
///
/// Fractional positions of the first and last container rows, rescaled onto
/// one common denominator.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ContainerBounds {
    begin: u32,
    end: u32,
    denominator: u32,
}

impl ContainerBounds {
    fn normalize(begin: FractionalPosition, end: FractionalPosition) -> Self {
        let sum = u64::from(begin.denominator) + u64::from(end.denominator);
        let denominator = u32::try_from(sum / 2).unwrap_or(u32::MAX);

        Self {
            begin: rescale(begin.numerator, begin.denominator, denominator),
            end: rescale(end.numerator, end.denominator, denominator),
            denominator,
        }
    }

    /// Estimated row count; never zero since both boundary rows exist.
    const fn estimate(self) -> u32 {
        if self.denominator <= 1 {
            return 1;
        }

        self.end.saturating_sub(self.begin).saturating_add(1)
    }

    /// Numerator of the `required`-th of `content` rows.
    fn interpolate(self, required: u32, content: u32) -> FractionalPosition {
        let offset = mul_div_round(
            self.end.saturating_sub(self.begin),
            required.saturating_sub(1),
            content.saturating_sub(1),
        )
        .unwrap_or(0);

        FractionalPosition::new(self.begin.saturating_add(offset), self.denominator)
    }
}

///
/// Anchor
///
/// Where a boundary or key reseek left the cursor, and how far the target
/// row still is.
///

#[derive(Clone, Copy, Debug)]
struct Anchor {
    position: u32,
    direction: Direction,
    distance: u32,
}

impl Anchor {
    const fn new(position: u32, direction: Direction, distance: u32) -> Self {
        Self {
            position,
            direction,
            distance,
        }
    }
}

///
/// Walk
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Walk {
    /// Stopped on an eligible row after this many eligible rows.
    Done(u32),
    /// No eligible row in the container in that direction.
    OutOfRange,
    TimeLimit,
}

impl<C: DirectoryCursor> SearchSession<'_, C> {
    pub(crate) fn position_in_container(&mut self) -> Result<VlvOutcome, InternalError> {
        let Some(IndexStrategy::Generic(range)) = self.key.chain.front() else {
            return Err(InternalError::vlv_invariant(
                "VLV container positioning needs a generic index range",
            ));
        };
        let (Some(begin), Some(end)) = (range.lower.clone(), range.upper.clone()) else {
            return Err(InternalError::vlv_invariant(
                "VLV container range must be bounded on both ends",
            ));
        };
        let index = range.index.clone();
        let parent_keyed = range.pdnt_leading;
        let Some(vlv) = self.key.vlv.as_mut() else {
            return Err(InternalError::vlv_invariant("VLV state missing"));
        };
        vlv.using_alternate_container_key = !parent_keyed;
        let request = vlv.request;

        self.key.index_type = IndexType::Generic;
        self.cursor.set_index(&index).map_store()?;
        self.ctx.metrics.record(MetricsEvent::IndexSeek {
            index: index.as_str(),
        });

        let Some(bounds) = self.container_bounds(&begin, &end)? else {
            return Ok(VlvOutcome::Empty);
        };
        let epsilon = self.ctx.config.vlv_epsilon;
        let mut content = bounds.estimate();
        if content < epsilon {
            content = self.count_container(&begin, &end)?;
            self.ctx.metrics.record(MetricsEvent::VlvExactCount);
        }
        if content == 0 {
            return Ok(VlvOutcome::Empty);
        }

        let (target, strategy) = match request.op {
            PositionOp::MoveFirst => {
                self.cursor.seek(&begin, SeekMode::Ge).map_store()?;
                (Some(Anchor::new(1, Direction::Forward, 0)), VlvStrategy::Boundary)
            }
            PositionOp::MoveLast => {
                self.cursor.seek(&end, SeekMode::Le).map_store()?;
                (
                    Some(Anchor::new(content, Direction::Backward, 0)),
                    VlvStrategy::Boundary,
                )
            }
            PositionOp::CalcPosition => {
                if request.last_known_position == 0 {
                    return Ok(VlvOutcome::OffsetRangeError);
                }
                let required = proportional_position(
                    content,
                    request.last_known_position,
                    request.last_known_content_count,
                );
                self.seek_near(required, content, bounds, &begin, &end)?
            }
        };

        // Settle on an eligible row, then walk the remaining distance.
        let position = match target {
            Some(anchor) => {
                match self.walk(anchor.direction, anchor.distance, &begin, &end)? {
                    Walk::Done(walked) if anchor.direction.is_forward() => {
                        anchor.position.saturating_add(walked)
                    }
                    Walk::Done(walked) => anchor.position.saturating_sub(walked).max(1),
                    Walk::OutOfRange => return Ok(VlvOutcome::Empty),
                    Walk::TimeLimit => return Ok(VlvOutcome::TimeLimitExceeded),
                }
            }
            None => {
                let required = self.key.vlv.as_ref().map_or(1, |vlv| vlv.current_position);
                match self.walk(Direction::Forward, 0, &begin, &end)? {
                    Walk::Done(_) => required,
                    Walk::OutOfRange => {
                        self.cursor.seek(&end, SeekMode::Le).map_store()?;
                        match self.walk(Direction::Backward, 0, &begin, &end)? {
                            Walk::Done(_) => required,
                            Walk::OutOfRange => return Ok(VlvOutcome::Empty),
                            Walk::TimeLimit => return Ok(VlvOutcome::TimeLimitExceeded),
                        }
                    }
                    Walk::TimeLimit => return Ok(VlvOutcome::TimeLimitExceeded),
                }
            }
        };

        let position_key = self.cursor.retrieve_key().map_store()?;
        let before_count = request.before_count;
        let walked = match self.walk(Direction::Backward, before_count, &begin, &end)? {
            Walk::Done(walked) => walked,
            Walk::OutOfRange => 0,
            Walk::TimeLimit => return Ok(VlvOutcome::TimeLimitExceeded),
        };

        if !self
            .cursor
            .set_index_range(&end, RangeLimit::Upper { inclusive: true })
            .map_store()?
            .is_moved()
        {
            return Err(InternalError::vlv_invariant(
                "VLV window start lies outside its container",
            ));
        }

        let Some(vlv) = self.key.vlv.as_mut() else {
            return Err(InternalError::vlv_invariant("VLV state missing"));
        };
        vlv.content_count = content;
        vlv.current_position = position;
        vlv.last_position = position;
        vlv.current_position_key = position_key;
        vlv.shrink_window(walked);

        self.ctx.metrics.record(MetricsEvent::VlvPositioned { strategy });
        tracing::debug!(
            position,
            content,
            before = walked,
            ?strategy,
            "vlv container positioned"
        );

        Ok(VlvOutcome::Positioned {
            current_position: position,
            content_count: content,
            requested_entries: vlv.requested_entries,
        })
    }

    /// Place the cursor near the `required`-th row. Returns the position the
    /// cursor represents, the direction to walk, and the distance; `None`
    /// when the cursor already sits on `required` by interpolation.
    fn seek_near(
        &mut self,
        required: u32,
        content: u32,
        bounds: ContainerBounds,
        begin: &[u8],
        end: &[u8],
    ) -> Result<(Option<Anchor>, VlvStrategy), InternalError> {
        let epsilon = self.ctx.config.vlv_epsilon;

        if required - 1 < epsilon {
            self.cursor.seek(begin, SeekMode::Ge).map_store()?;
            return Ok((
                Some(Anchor::new(1, Direction::Forward, required - 1)),
                VlvStrategy::BoundaryWalk,
            ));
        }
        if content - required < epsilon {
            self.cursor.seek(end, SeekMode::Le).map_store()?;
            return Ok((
                Some(Anchor::new(content, Direction::Backward, content - required)),
                VlvStrategy::BoundaryWalk,
            ));
        }

        let (last, saved) = self.key.vlv.as_ref().map_or((0, Vec::new()), |vlv| {
            (vlv.last_position, vlv.current_position_key.clone())
        });
        if last != 0 && !saved.is_empty() && last.abs_diff(required) < epsilon {
            let landed = self.cursor.seek(&saved, SeekMode::Ge).map_store()?.is_found();
            let inside = landed && self.cursor.retrieve_key().map_store()?.as_slice() <= end;
            if !inside {
                self.cursor.seek(end, SeekMode::Le).map_store()?;
                return Ok((
                    Some(Anchor::new(content, Direction::Backward, content - required)),
                    VlvStrategy::KeyReseek,
                ));
            }
            let direction = if required >= last {
                Direction::Forward
            } else {
                Direction::Backward
            };
            return Ok((
                Some(Anchor::new(last, direction, last.abs_diff(required))),
                VlvStrategy::KeyReseek,
            ));
        }

        let fraction = bounds.interpolate(required, content);
        let moved = self
            .cursor
            .set_fractional_position(fraction)
            .map_store()?
            .is_moved();
        if moved {
            let key = self.cursor.retrieve_key().map_store()?;
            if key.as_slice() < begin {
                self.cursor.seek(begin, SeekMode::Ge).map_store()?;
            } else if key.as_slice() > end {
                self.cursor.seek(end, SeekMode::Le).map_store()?;
            }
        } else {
            self.cursor.seek(end, SeekMode::Le).map_store()?;
        }
        if let Some(vlv) = self.key.vlv.as_mut() {
            vlv.current_position = required;
        }

        Ok((None, VlvStrategy::FractionalSeek))
    }

    /// Seek both container boundaries and read their fractional positions.
    fn container_bounds(
        &mut self,
        begin: &[u8],
        end: &[u8],
    ) -> Result<Option<ContainerBounds>, InternalError> {
        if !self.cursor.seek(begin, SeekMode::Ge).map_store()?.is_found()
            || self.cursor.retrieve_key().map_store()?.as_slice() > end
        {
            return Ok(None);
        }
        let first = self.cursor.fractional_position().map_store()?;

        if !self.cursor.seek(end, SeekMode::Le).map_store()?.is_found()
            || self.cursor.retrieve_key().map_store()?.as_slice() < begin
        {
            return Ok(None);
        }
        let last = self.cursor.fractional_position().map_store()?;

        Ok(Some(ContainerBounds::normalize(first, last)))
    }

    /// Exact row count, walking a second cursor back from the end boundary.
    fn count_container(&mut self, begin: &[u8], end: &[u8]) -> Result<u32, InternalError> {
        let mut probe = self.cursor.dup_cursor().map_store()?;
        if !probe.seek(end, SeekMode::Le).map_store()?.is_found() {
            return Ok(0);
        }

        let mut count = 0u32;
        loop {
            if probe.retrieve_key().map_store()?.as_slice() < begin {
                break;
            }
            count = count.saturating_add(1);
            if !probe.move_to(Move::Prev).map_store()?.is_moved() {
                break;
            }
        }

        Ok(count)
    }

    /// Settle on the nearest eligible row in `direction`, then pass `steps`
    /// more eligible rows. Stops early on the last eligible row before the
    /// container boundary.
    fn walk(
        &mut self,
        direction: Direction,
        steps: u32,
        begin: &[u8],
        end: &[u8],
    ) -> Result<Walk, InternalError> {
        match self.settle(direction, begin, end)? {
            Walk::Done(_) => {}
            other => return Ok(other),
        }

        // Keys need not be unique; only the bookmark names this exact row.
        let mut anchor = self.cursor.bookmark().map_store()?;
        let mut walked = 0;
        while walked < steps {
            if self.time_limit_hit() {
                return Ok(Walk::TimeLimit);
            }
            if !self.container_move(direction, begin, end)? {
                if !self.cursor.goto_bookmark(&anchor).map_store()? {
                    return Err(InternalError::vlv_invariant(
                        "VLV walk lost the last eligible row",
                    ));
                }
                break;
            }
            if self.row_is_eligible()? {
                walked += 1;
                anchor = self.cursor.bookmark().map_store()?;
            }
        }

        Ok(Walk::Done(walked))
    }

    fn settle(
        &mut self,
        direction: Direction,
        begin: &[u8],
        end: &[u8],
    ) -> Result<Walk, InternalError> {
        let key = self.cursor.retrieve_key().map_store()?;
        if key.as_slice() < begin || key.as_slice() > end {
            return Ok(Walk::OutOfRange);
        }

        loop {
            if self.row_is_eligible()? {
                return Ok(Walk::Done(0));
            }
            if self.time_limit_hit() {
                return Ok(Walk::TimeLimit);
            }
            if !self.container_move(direction, begin, end)? {
                return Ok(Walk::OutOfRange);
            }
        }
    }

    /// One raw index step; `false` once the cursor leaves the container.
    fn container_move(
        &mut self,
        direction: Direction,
        begin: &[u8],
        end: &[u8],
    ) -> Result<bool, InternalError> {
        if !self.cursor.move_to(direction.step()).map_store()?.is_moved() {
            return Ok(false);
        }
        let key = self.cursor.retrieve_key().map_store()?;

        Ok(key.as_slice() >= begin && key.as_slice() <= end)
    }

    /// Whether the current row would be returned by a get-next.
    fn row_is_eligible(&mut self) -> Result<bool, InternalError> {
        let RowVerdict::Candidate(dnt) = self.inspect_row()? else {
            return Ok(false);
        };
        let gate = FilterSecurityGate::new(self.ctx.security, self.ctx.filter);

        gate.evaluate(dnt, &mut self.cursor, &mut self.security)
    }
}
