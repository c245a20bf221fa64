//! Database-side search machinery: storage contract, index ranges, the
//! candidate positioner, and the session orchestrator.

pub mod array;
pub mod asq;
pub mod dedup;
pub mod direction;
pub mod filter;
pub mod index;
pub mod scope;
pub mod search;
pub mod security;
pub mod store;
pub mod vlv;
