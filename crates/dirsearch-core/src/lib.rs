//! Search core of a directory database: positions a storage cursor through
//! the candidates of one search, applies scope, duplicate, security and
//! filter checks, and supports VLV windows, attribute-scoped queries, and
//! suspend/resume between pages.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod obs;
pub mod traits;
pub mod types;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Vocabulary needed to open and drive a search session.
///

pub mod prelude {
    pub use crate::{
        config::SearchConfig,
        db::{
            direction::Direction,
            scope::{SearchScope, SearchType},
            search::{AccessPlan, SearchContext, SearchOutcome, SearchSession, ShutdownSignal},
            vlv::{VlvOutcome, VlvRequest},
        },
        types::Dnt,
    };
}
