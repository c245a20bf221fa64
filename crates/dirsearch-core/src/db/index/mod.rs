//! Index-side positioning state: key ranges and ancestry navigation.

pub(crate) mod ancestry;
pub(crate) mod range;

pub use ancestry::{AncestorBlob, encode_chain, next_subtree_lower_bound};
pub use range::{IndexChain, IndexStrategy, KeyRange};

///
/// IndexType
///
/// Positioning strategy currently driving the walk.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IndexType {
    /// Strategy is derived from the front of the index chain on the next step.
    #[default]
    Unset,
    /// The optimizer proved the result empty.
    Invalid,
    Generic,
    AncestorsIndex,
    TupleIndex,
    TempTableOnDisk,
    TempTableMemoryArray,
    Intersection,
}

impl IndexType {
    /// Strategies that only yield rows already inside the search scope.
    #[must_use]
    pub const fn prefilters_location(self) -> bool {
        matches!(self, Self::TempTableOnDisk | Self::TempTableMemoryArray)
    }
}
