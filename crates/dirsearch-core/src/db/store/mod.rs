//! Module: db::store
//! Responsibility: storage-engine contract consumed by the search core.
//! Does not own: durability, transactions, or key normalization.
//! Boundary: every physical cursor operation the walker performs goes
//! through `DirectoryCursor` or `TempTable`.

mod column;

pub(crate) use column::{read_bytes_into, read_dnt, read_flag, read_u32};

use crate::{
    error::StoreError,
    types::{ColumnId, Dnt, IndexName},
};

///
/// SeekMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekMode {
    Eq,
    Ge,
    Le,
}

///
/// SeekResult
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekResult {
    /// Landed on a key equal to the seek key.
    Exact,
    /// Landed on the nearest key satisfying the seek mode.
    Near,
    NotFound,
}

impl SeekResult {
    #[must_use]
    pub const fn is_found(self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

///
/// Move
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Move {
    First,
    Last,
    Next,
    Prev,
}

///
/// MoveResult
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MoveResult {
    Moved,
    NoCurrentRecord,
}

impl MoveResult {
    #[must_use]
    pub const fn is_moved(self) -> bool {
        matches!(self, Self::Moved)
    }
}

///
/// RangeLimit
///
/// Which end of the index range `set_index_range` installs, relative to the
/// current position.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeLimit {
    Upper { inclusive: bool },
    Lower { inclusive: bool },
}

///
/// ColumnRead
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnRead {
    Null,
    /// Number of bytes written into the caller's buffer.
    Value(usize),
    /// The buffer was too small; nothing useful was written.
    Truncated { required: usize },
}

///
/// FractionalPosition
///
/// `numerator` rows precede the current key among `denominator` index rows.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FractionalPosition {
    pub numerator: u32,
    pub denominator: u32,
}

impl FractionalPosition {
    #[must_use]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

///
/// RowColumns
///
/// Column access on the current object row.
///

pub trait RowColumns {
    fn retrieve_column(&mut self, column: ColumnId, buf: &mut [u8])
    -> Result<ColumnRead, StoreError>;
}

///
/// DirectoryCursor
///
/// Cursor over the object table with a selectable secondary index.
///
/// The cursor tracks two positions: the index entry and the object row.
/// Index movement places both; `find_object` and `goto_bookmark` place the
/// object row (and the index entry when the current index holds that row).
/// `seek`, `move_to(First | Last)`, `set_index`, `set_fractional_position`,
/// `goto_bookmark` and `find_object` discard any installed index range.
///

pub trait DirectoryCursor: RowColumns {
    fn set_index(&mut self, index: &IndexName) -> Result<(), StoreError>;

    /// Name of the current index; used for consistency checks only.
    fn current_index_name(&self) -> Option<&str>;

    fn seek(&mut self, key: &[u8], mode: SeekMode) -> Result<SeekResult, StoreError>;

    /// Restrict subsequent moves; reports `NoCurrentRecord` when the current
    /// entry already lies outside the new limit.
    fn set_index_range(&mut self, key: &[u8], limit: RangeLimit)
    -> Result<MoveResult, StoreError>;

    fn move_to(&mut self, step: Move) -> Result<MoveResult, StoreError>;

    /// Read a column carried by the current index entry itself.
    fn retrieve_index_column(
        &mut self,
        column: ColumnId,
        buf: &mut [u8],
    ) -> Result<ColumnRead, StoreError>;

    /// Normalized key of the current index entry.
    fn retrieve_key(&mut self) -> Result<Vec<u8>, StoreError>;

    fn fractional_position(&mut self) -> Result<FractionalPosition, StoreError>;

    fn set_fractional_position(
        &mut self,
        position: FractionalPosition,
    ) -> Result<MoveResult, StoreError>;

    fn bookmark(&mut self) -> Result<Vec<u8>, StoreError>;

    fn goto_bookmark(&mut self, bookmark: &[u8]) -> Result<bool, StoreError>;

    /// Place the object row on `dnt`; `false` when no row carries it.
    fn find_object(&mut self, dnt: Dnt) -> Result<bool, StoreError>;

    /// Independent cursor over the same table, positioned identically.
    fn dup_cursor(&self) -> Result<Self, StoreError>
    where
        Self: Sized;
}

///
/// TempColumn
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TempColumn {
    Dnt,
    Bookmark,
}

///
/// TempTable
///
/// Sort or intersection table materialized by the optimizer.
///

pub trait TempTable {
    fn move_to(&mut self, step: Move) -> Result<MoveResult, StoreError>;

    fn retrieve_column(&mut self, column: TempColumn) -> Result<Option<Vec<u8>>, StoreError>;

    /// Whether rows carry `column`; intersection tables must carry bookmarks.
    fn has_column(&self, column: TempColumn) -> bool;
}
