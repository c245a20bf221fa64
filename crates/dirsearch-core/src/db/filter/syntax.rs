use crate::{
    error::InternalError,
    traits::{CompareOp, SyntaxHandler},
    types::Tribool,
};
use std::{cmp::Ordering, collections::BTreeMap};

///
/// SyntaxRegistry
///
/// Attribute syntax id to comparison capability.
///

#[derive(Default)]
pub struct SyntaxRegistry {
    handlers: BTreeMap<u32, Box<dyn SyntaxHandler>>,
}

impl SyntaxRegistry {
    pub const OCTET_STRING: u32 = 1;
    pub const CASE_IGNORE_STRING: u32 = 2;
    pub const INTEGER: u32 = 3;

    /// Registry with the built-in octet-string, case-ignore and integer syntaxes.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.register(Self::OCTET_STRING, Box::new(OctetString));
        registry.register(Self::CASE_IGNORE_STRING, Box::new(CaseIgnoreString));
        registry.register(Self::INTEGER, Box::new(Integer));

        registry
    }

    pub fn register(&mut self, syntax: u32, handler: Box<dyn SyntaxHandler>) {
        self.handlers.insert(syntax, handler);
    }

    #[must_use]
    pub fn get(&self, syntax: u32) -> Option<&dyn SyntaxHandler> {
        self.handlers.get(&syntax).map(Box::as_ref)
    }
}

fn ordering_matches(op: CompareOp, ord: Ordering) -> Tribool {
    let matched = match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Substring => return Tribool::Unknown,
    };

    Tribool::from_bool(matched)
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

///
/// OctetString
///

struct OctetString;

impl SyntaxHandler for OctetString {
    fn eval(&self, op: CompareOp, lhs: &[u8], rhs: &[u8]) -> Tribool {
        if op == CompareOp::Substring {
            return Tribool::from_bool(contains_subslice(lhs, rhs));
        }

        ordering_matches(op, lhs.cmp(rhs))
    }

    fn external_to_internal(&self, external: &[u8]) -> Result<Vec<u8>, InternalError> {
        Ok(external.to_vec())
    }
}

///
/// CaseIgnoreString
///
/// Stored values are already folded; assertion values fold on conversion.
///

struct CaseIgnoreString;

impl SyntaxHandler for CaseIgnoreString {
    fn eval(&self, op: CompareOp, lhs: &[u8], rhs: &[u8]) -> Tribool {
        let lhs = lhs.to_ascii_lowercase();
        if op == CompareOp::Substring {
            return Tribool::from_bool(contains_subslice(&lhs, rhs));
        }

        ordering_matches(op, lhs.as_slice().cmp(rhs))
    }

    fn external_to_internal(&self, external: &[u8]) -> Result<Vec<u8>, InternalError> {
        if std::str::from_utf8(external).is_err() {
            return Err(InternalError::search_internal(
                "case-ignore assertion value is not UTF-8",
            ));
        }

        Ok(external.to_ascii_lowercase())
    }
}

///
/// Integer
///
/// Signed 64-bit little-endian values.
///

struct Integer;

impl Integer {
    fn decode(raw: &[u8]) -> Option<i64> {
        let raw: [u8; 8] = raw.try_into().ok()?;
        Some(i64::from_le_bytes(raw))
    }
}

impl SyntaxHandler for Integer {
    fn eval(&self, op: CompareOp, lhs: &[u8], rhs: &[u8]) -> Tribool {
        match (Self::decode(lhs), Self::decode(rhs)) {
            (Some(lhs), Some(rhs)) => ordering_matches(op, lhs.cmp(&rhs)),
            _ => Tribool::Unknown,
        }
    }

    fn external_to_internal(&self, external: &[u8]) -> Result<Vec<u8>, InternalError> {
        let text = std::str::from_utf8(external)
            .map_err(|_| InternalError::search_internal("integer assertion value is not UTF-8"))?;
        let value: i64 = text.trim().parse().map_err(|err| {
            InternalError::search_internal(format!("invalid integer assertion value: {err}"))
        })?;

        Ok(value.to_le_bytes().to_vec())
    }
}
