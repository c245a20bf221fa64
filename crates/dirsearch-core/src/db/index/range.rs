//! Module: index::range
//! Responsibility: key-range bookkeeping for the optimizer's chosen indexes.
//! Does not own: seeking or moving the storage cursor.
//! Boundary: the positioner consumes the chain front-to-back.

use crate::{
    db::{index::IndexType, store::TempTable},
    types::{ColumnId, IndexName},
};
use std::collections::VecDeque;

///
/// KeyRange
///
/// Lower/upper normalized keys on one index. Either bound may be open.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange {
    pub index: IndexName,
    pub lower: Option<Vec<u8>>,
    pub upper: Option<Vec<u8>>,

    /// The optimizer proved `lower` matches exactly one entry.
    pub exact_match: bool,

    /// Link/backlink index: the object lives under this index column.
    pub link_column: Option<ColumnId>,

    /// The index can reach one object through several entries.
    pub multi_valued: bool,

    /// Keys lead with the parent identifier.
    pub pdnt_leading: bool,
}

impl KeyRange {
    pub fn new(index: IndexName, lower: Option<Vec<u8>>, upper: Option<Vec<u8>>) -> Self {
        Self {
            index,
            lower,
            upper,
            exact_match: false,
            link_column: None,
            multi_valued: false,
            pdnt_leading: false,
        }
    }

    /// Range covering every key that starts with `prefix`.
    pub fn prefix(index: IndexName, prefix: &[u8]) -> Self {
        let upper = prefix_upper_bound(prefix);
        Self::new(index, Some(prefix.to_vec()), upper)
    }

    #[must_use]
    pub fn exact(index: IndexName, key: Vec<u8>) -> Self {
        Self {
            exact_match: true,
            ..Self::new(index, Some(key.clone()), Some(key))
        }
    }

    #[must_use]
    pub const fn with_link_column(mut self, column: ColumnId) -> Self {
        self.link_column = Some(column);
        self.multi_valued = true;
        self
    }

    #[must_use]
    pub const fn with_multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    #[must_use]
    pub const fn with_pdnt_leading(mut self) -> Self {
        self.pdnt_leading = true;
        self
    }

    /// Replace the lower bound, reusing the existing allocation.
    pub fn set_lower(&mut self, key: &[u8]) {
        match self.lower.as_mut() {
            Some(lower) => {
                lower.clear();
                lower.extend_from_slice(key);
            }
            None => self.lower = Some(key.to_vec()),
        }
    }

    /// Whether the bounds describe an empty envelope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let (Some(lower), Some(upper)) = (self.lower.as_ref(), self.upper.as_ref()) else {
            return false;
        };

        lower > upper
    }
}

/// Largest key that still starts with `prefix`, padded past any suffix the
/// index appends. `None` when every key qualifies.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    if prefix.is_empty() {
        return None;
    }

    let mut upper = prefix.to_vec();
    upper.extend_from_slice(&[0xff; 32]);

    Some(upper)
}

///
/// IndexStrategy
///
/// One element of the optimizer's union chain.
///

pub enum IndexStrategy {
    Generic(KeyRange),
    Ancestors(KeyRange),
    Tuple(KeyRange),
    Intersection(Box<dyn TempTable>),
}

impl IndexStrategy {
    #[must_use]
    pub const fn index_type(&self) -> IndexType {
        match self {
            Self::Generic(_) => IndexType::Generic,
            Self::Ancestors(_) => IndexType::AncestorsIndex,
            Self::Tuple(_) => IndexType::TupleIndex,
            Self::Intersection(_) => IndexType::Intersection,
        }
    }

    #[must_use]
    pub const fn key_range(&self) -> Option<&KeyRange> {
        match self {
            Self::Generic(range) | Self::Ancestors(range) | Self::Tuple(range) => Some(range),
            Self::Intersection(_) => None,
        }
    }

    /// Whether walking this element can reach one object twice.
    #[must_use]
    pub fn may_revisit(&self) -> bool {
        self.key_range().is_some_and(|range| range.multi_valued)
    }
}

///
/// IndexChain
///
/// Exclusively owned, consumed front-to-back.
///

#[derive(Default)]
pub struct IndexChain {
    ranges: VecDeque<IndexStrategy>,
}

impl IndexChain {
    #[must_use]
    pub fn new(ranges: Vec<IndexStrategy>) -> Self {
        Self {
            ranges: ranges.into(),
        }
    }

    #[must_use]
    pub fn front(&self) -> Option<&IndexStrategy> {
        self.ranges.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut IndexStrategy> {
        self.ranges.front_mut()
    }

    /// Release the exhausted front element; `true` when another remains.
    pub fn advance(&mut self) -> bool {
        self.ranges.pop_front();
        !self.ranges.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether any element may revisit an object, or several elements union.
    #[must_use]
    pub fn needs_duplicate_detection(&self) -> bool {
        self.ranges.len() > 1 || self.ranges.iter().any(IndexStrategy::may_revisit)
    }
}

///
/// TESTS
///
