use crate::{
    db::{
        array::IdArray,
        direction::Direction,
        vlv::{PositionOp, VlvOutcome, VlvState, math::proportional_position},
    },
    types::Dnt,
};

impl VlvState {
    /// Position a materialized result array for the current request.
    ///
    /// Positions count in traversal order, so a backward window's first row
    /// is the last array element. On success the array cursor sits on the
    /// first window row; the caller resumes delivery on it without moving.
    pub(crate) fn position_in_array(
        &mut self,
        array: &mut IdArray,
        direction: Direction,
    ) -> VlvOutcome {
        let content = u32::try_from(array.len()).unwrap_or(u32::MAX);
        self.content_count = content;
        if content == 0 {
            array.set_position(0);
            return VlvOutcome::Empty;
        }

        let target = match self.request.op {
            PositionOp::MoveFirst => 1,
            PositionOp::MoveLast => content,
            PositionOp::CalcPosition => {
                if self.request.last_known_position == 0 {
                    return VlvOutcome::OffsetRangeError;
                }
                proportional_position(
                    content,
                    self.request.last_known_position,
                    self.request.last_known_content_count,
                )
            }
        };
        self.current_position = target;
        self.last_position = target;

        let start = self.window_start(target);
        let index = if direction.is_forward() {
            start
        } else {
            content + 1 - start
        };
        array.set_position(index as usize);

        VlvOutcome::Positioned {
            current_position: target,
            content_count: content,
            requested_entries: self.requested_entries,
        }
    }

    /// Forward step through the window; never refills the array.
    pub(crate) fn step_in_array(array: &mut IdArray) -> Option<Dnt> {
        let next = array.position().saturating_add(1);
        if next > array.len() {
            array.set_position(array.len().saturating_add(1));
            return None;
        }
        array.set_position(next);

        array.current()
    }
}
