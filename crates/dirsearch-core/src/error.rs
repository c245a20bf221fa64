use std::{fmt, panic::Location};
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured fatal error with a stable internal classification.
/// Expected control-flow outcomes (range exhausted, time limit, referral
/// rows) are never carried by this type; they travel as values.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Origin-specific payload; when present it matches `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Build an error, attaching store detail for store-origin corruption.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        let message = message.into();

        let detail = match (class, origin) {
            (ErrorClass::Corruption, ErrorOrigin::Store) => {
                Some(ErrorDetail::Store(StoreError::Corrupt {
                    message: message.clone(),
                }))
            }
            _ => None,
        };

        Self {
            class,
            origin,
            message,
            detail,
        }
    }

    /// Convert an unexpected storage-engine failure into a fatal error that
    /// carries the source location of the failing call.
    #[track_caller]
    pub fn from_store(err: StoreError) -> Self {
        let at = Location::caller();
        let message = format!("{err} (at {}:{})", at.file(), at.line());
        tracing::warn!(%message, "storage engine failure");

        Self {
            class: ErrorClass::Internal,
            origin: ErrorOrigin::Store,
            message,
            detail: Some(ErrorDetail::Store(err)),
        }
    }

    pub(crate) fn search_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Search,
            message.into(),
        )
    }

    pub(crate) fn index_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Index,
            message.into(),
        )
    }

    /// Construct a vlv-origin invariant violation.
    pub(crate) fn vlv_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Vlv, message.into())
    }

    /// Construct an asq-origin unsupported error.
    pub(crate) fn asq_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Asq, message.into())
    }

    /// Construct a search-origin internal error.
    pub(crate) fn search_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Search, message.into())
    }

    /// A stored value is malformed or missing where the row must carry it.
    pub(crate) fn store_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Store, message.into())
    }

    /// Construct an allocation failure; these are never swallowed.
    pub(crate) fn out_of_memory(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ResourceExhausted, origin, message.into())
    }

    pub fn store_not_found(key: impl Into<String>) -> Self {
        let key = key.into();

        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Store,
            message: format!("object row not found: {key}"),
            detail: Some(ErrorDetail::Store(StoreError::NotFound { key })),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Store(StoreError::NotFound { .. }))
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<crate::config::ConfigError> for InternalError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Config,
            message: err.to_string(),
            detail: Some(ErrorDetail::Config(err)),
        }
    }
}

///
/// StoreResultExt
///
/// Fatal conversion for storage calls whose expected outcomes are already
/// values; keeps the caller's location in the message.
///

pub(crate) trait StoreResultExt<T> {
    fn map_store(self) -> Result<T, InternalError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    #[track_caller]
    fn map_store(self) -> Result<T, InternalError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(InternalError::from_store(err)),
        }
    }
}

///
/// ErrorDetail
///
/// Payload kept alongside an [`InternalError`] for callers that match on it.
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
    #[error("{0}")]
    Config(crate::config::ConfigError),
}

///
/// StoreError
///
/// Failure reported by the storage engine outside the expected outcome set
/// of a call. Expected outcomes (no current record, seek miss) are values on
/// the storage contract, not errors.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum StoreError {
    #[error("storage engine error {code}: {message}")]
    Engine { code: i32, message: String },

    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("store corruption: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Self::Engine {
            code,
            message: message.into(),
        }
    }
}

///
/// ErrorClass
///
/// What kind of failure ended the search.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Corruption,
    NotFound,
    Internal,
    Unsupported,
    InvariantViolation,
    ResourceExhausted,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Corruption => "corruption",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
            Self::ResourceExhausted => "resource_exhausted",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///
/// Component that detected the failure.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Store,
    Index,
    Search,
    Vlv,
    Asq,
    Security,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Store => "store",
            Self::Index => "index",
            Self::Search => "search",
            Self::Vlv => "vlv",
            Self::Asq => "asq",
            Self::Security => "security",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
