//! Contracts for the collaborators the search core calls as black boxes:
//! clock, object security, filter evaluation, schema lookup, attribute
//! syntaxes, and ASQ link-value sources.

use crate::{
    db::store::RowColumns,
    error::InternalError,
    types::{Dnt, InstanceType, Tribool},
};
use std::{sync::Arc, time::Instant};

///
/// Clock
///
/// Monotonic tick source for time-limit checks.
///

pub trait Clock {
    fn ticks(&self) -> u64;
}

///
/// SystemClock
///
/// Milliseconds since construction.
///

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

///
/// SecurityDescriptor
///
/// Either a shared reference into a global descriptor cache or a buffer
/// owned by the session. Dropping releases it the right way for each.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SecurityDescriptor {
    Shared(Arc<[u8]>),
    Owned(Vec<u8>),
}

impl SecurityDescriptor {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Shared(bytes) => bytes,
            Self::Owned(bytes) => bytes,
        }
    }

    #[must_use]
    pub const fn is_global_ref(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

///
/// ObjectSecurityInfo
///

#[derive(Clone, Debug)]
pub struct ObjectSecurityInfo {
    pub descriptor: SecurityDescriptor,
    pub class_id: u32,
    pub dn: String,
    pub instance_type: InstanceType,
}

///
/// ObjectSecurity
///

pub trait ObjectSecurity {
    /// Fetch descriptor and metadata for `dnt`; `None` when the object
    /// carries no descriptor (never visible).
    fn object_security_info(&self, dnt: Dnt) -> Result<Option<ObjectSecurityInfo>, InternalError>;

    /// Whether the caller may see an object through the search filter.
    fn evaluate_filter_security(&self, descriptor: &[u8], class_id: u32, dn: &str) -> bool;
}

///
/// FilterEvaluator
///
/// Evaluates the search filter against the current object row.
///

pub trait FilterEvaluator {
    fn evaluate(&self, row: &mut dyn RowColumns) -> Result<Tribool, InternalError>;
}

///
/// AttributeDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeDescriptor {
    pub id: u32,
    pub name: String,
    pub syntax: u32,
    pub multi_valued: bool,
}

///
/// SchemaCache
///

pub trait SchemaCache {
    fn attribute_by_id(&self, id: u32) -> Option<AttributeDescriptor>;
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Substring,
}

///
/// SyntaxHandler
///
/// Comparison and conversion capability for one attribute syntax.
///

pub trait SyntaxHandler {
    fn eval(&self, op: CompareOp, lhs: &[u8], rhs: &[u8]) -> Tribool;

    fn external_to_internal(&self, external: &[u8]) -> Result<Vec<u8>, InternalError>;
}

///
/// AsqBatch
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AsqBatch {
    pub ids: Vec<Dnt>,
    /// No link values remain past this batch.
    pub exhausted: bool,
}

///
/// AsqSource
///
/// Reads the scoped attribute's link values from storage.
///

pub trait AsqSource {
    /// Read up to `max` values starting after the first `watermark` values.
    fn fetch(&mut self, watermark: u32, max: u32) -> Result<AsqBatch, InternalError>;

    /// Read every value, ordered by the requested sort attribute.
    fn fetch_sorted(&mut self) -> Result<Vec<Dnt>, InternalError>;
}
