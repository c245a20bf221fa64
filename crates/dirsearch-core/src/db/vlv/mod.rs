//! Module: db::vlv
//! Responsibility: virtual-list-view positioning over a sorted result set.
//! Does not own: walking forward from the positioned row (the session's
//! normal get-next path delivers the requested window).
//! Boundary: positions are 1-based; 0 means "no position".

mod array;
pub(crate) mod container;
pub(crate) mod math;

pub use math::{mul_div_round, proportional_position};

///
/// PositionOp
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PositionOp {
    #[default]
    MoveFirst,
    MoveLast,
    /// Interpolate the client's `last_known_position / last_known_content_count`.
    CalcPosition,
}

///
/// VlvRequest
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VlvRequest {
    pub op: PositionOp,
    pub before_count: u32,
    pub after_count: u32,
    pub last_known_position: u32,
    pub last_known_content_count: u32,
}

impl VlvRequest {
    #[must_use]
    pub const fn first(before_count: u32, after_count: u32) -> Self {
        Self {
            op: PositionOp::MoveFirst,
            before_count,
            after_count,
            last_known_position: 0,
            last_known_content_count: 0,
        }
    }

    #[must_use]
    pub const fn last(before_count: u32, after_count: u32) -> Self {
        Self {
            op: PositionOp::MoveLast,
            ..Self::first(before_count, after_count)
        }
    }

    #[must_use]
    pub const fn at(
        last_known_position: u32,
        last_known_content_count: u32,
        before_count: u32,
        after_count: u32,
    ) -> Self {
        Self {
            op: PositionOp::CalcPosition,
            before_count,
            after_count,
            last_known_position,
            last_known_content_count,
        }
    }
}

///
/// VlvState
///
/// Per-search VLV bookkeeping. Survives between pages so a follow-up request
/// near the previous one can reseek the saved key.
///

#[derive(Clone, Debug, Default)]
pub struct VlvState {
    pub request: VlvRequest,

    /// Rows the window should deliver, reduced when fewer than
    /// `before_count` rows precede the target.
    pub requested_entries: u32,

    pub content_count: u32,
    pub current_position: u32,

    /// Position and key the previous request settled on.
    pub last_position: u32,
    pub current_position_key: Vec<u8>,

    /// The container range is keyed by membership rather than by parent,
    /// so the range itself proves location and the parent check is skipped.
    pub using_alternate_container_key: bool,
}

impl VlvState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new request, keeping the previous position for reseeks.
    pub(crate) fn begin(&mut self, request: VlvRequest) {
        self.request = request;
        self.requested_entries = request
            .before_count
            .saturating_add(1)
            .saturating_add(request.after_count);
        self.content_count = 0;
        self.current_position = 0;
    }

    /// Position the window should start at once `target` is known. When
    /// fewer than `before_count` rows precede the target the window shrinks.
    pub(crate) fn window_start(&mut self, target: u32) -> u32 {
        let preceding = target.saturating_sub(1);
        let before = self.request.before_count;
        if preceding >= before {
            return target - before;
        }

        self.requested_entries = self.requested_entries.saturating_sub(before - preceding);
        1
    }

    /// Record the shortfall of a before-count walk that stopped early.
    pub(crate) fn shrink_window(&mut self, walked: u32) {
        let shortfall = self.request.before_count.saturating_sub(walked);
        self.requested_entries = self.requested_entries.saturating_sub(shortfall);
    }
}

///
/// VlvOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VlvOutcome {
    /// The cursor sits on the first row of the window; the next get-next
    /// returns it.
    Positioned {
        current_position: u32,
        content_count: u32,
        requested_entries: u32,
    },
    /// The container holds no rows.
    Empty,
    /// `CalcPosition` without a usable client position.
    OffsetRangeError,
    TimeLimitExceeded,
}
