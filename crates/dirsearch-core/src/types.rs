//! Domain vocabulary shared by every search component.

use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// Dnt
///
/// Distinguished-name tag: the directory's internal row identifier.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("dnt:{_0}")]
pub struct Dnt(pub u32);

impl Dnt {
    /// Never a real row.
    pub const INVALID: Self = Self(0);

    /// Root of the directory information tree.
    pub const ROOT: Self = Self(2);

    pub const ENCODED_LEN: usize = 4;

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Column/blob encoding (native little-endian).
    #[must_use]
    pub const fn to_column_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[must_use]
    pub const fn from_column_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Decode a column value that must be exactly one identifier wide.
    #[must_use]
    pub fn from_column_slice(raw: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = raw.try_into().ok()?;
        Some(Self::from_column_bytes(raw))
    }

    /// Order-preserving index-key encoding.
    #[must_use]
    pub const fn to_key_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

///
/// InstanceType
///
/// Replication instance flags stored on every instantiated object.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct InstanceType(u32);

impl InstanceType {
    pub const NC_HEAD: u32 = 0x1;
    pub const UNINSTANT: u32 = 0x2;
    pub const WRITE: u32 = 0x4;
    pub const NC_ABOVE: u32 = 0x8;

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_nc_head(self) -> bool {
        self.0 & Self::NC_HEAD != 0
    }

    #[must_use]
    pub const fn is_uninstantiated(self) -> bool {
        self.0 & Self::UNINSTANT != 0
    }

    /// Writable (local) copy as opposed to a partial replica.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.0 & Self::WRITE != 0
    }
}

///
/// Tribool
///
/// Three-valued filter result.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tribool {
    True,
    False,
    Unknown,
}

impl Tribool {
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

///
/// ColumnId
///
/// Object-table columns the search core reads.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ColumnId {
    Dnt,
    Pdnt,
    NcDnt,
    Ancestors,
    InstanceType,
    IsDeleted,
    /// Present (non-zero) on real objects, absent on phantoms.
    ObjectFlag,
    /// Link target identifier carried by link/backlink index entries.
    LinkTarget,
    /// Any schema attribute, by attribute id.
    Attribute(u32),
}

///
/// IndexName
///

#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IndexName(String);

impl IndexName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tribool_tables_follow_kleene_logic() {
        use Tribool::{False, True, Unknown};

        assert_eq!(True.and(Unknown), Unknown);
        assert_eq!(False.and(Unknown), False);
        assert_eq!(True.or(Unknown), True);
        assert_eq!(False.or(Unknown), Unknown);
        assert_eq!(Unknown.not(), Unknown);
    }

    #[test]
    fn key_bytes_order_matches_numeric_order() {
        assert!(Dnt(0x0100).to_key_bytes() > Dnt(0x00ff).to_key_bytes());
        assert_eq!(Dnt::from_column_bytes(Dnt(77).to_column_bytes()), Dnt(77));
    }
}
