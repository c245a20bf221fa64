use serde::{Deserialize, Serialize};

///
/// Direction
///
/// Traversal direction for one positioning step. A session's
/// `change_direction` flag flips the caller's request.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    #[must_use]
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Forward)
    }

    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// Apply a change-direction flag (XOR).
    #[must_use]
    pub const fn xor(self, change_direction: bool) -> Self {
        if change_direction { self.reversed() } else { self }
    }

    #[must_use]
    pub(crate) const fn step(self) -> super::store::Move {
        match self {
            Self::Forward => super::store::Move::Next,
            Self::Backward => super::store::Move::Prev,
        }
    }

    #[must_use]
    pub(crate) const fn start(self) -> super::store::Move {
        match self {
            Self::Forward => super::store::Move::First,
            Self::Backward => super::store::Move::Last,
        }
    }
}
