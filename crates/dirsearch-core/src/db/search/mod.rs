//! Module: db::search
//! Responsibility: drive one search session from access plan to results.
//! Does not own: choosing indexes (the optimizer's `AccessPlan` arrives
//! ready-made) or rendering results.
//! Boundary: expected outcomes (end of results, time limit, referral) are
//! values; `InternalError` is reserved for fatal conditions.

pub(crate) mod context;
pub(crate) mod key;
pub(crate) mod position;
pub(crate) mod restart;
pub(crate) mod session;


pub use context::{CallerKind, Deadline, SearchContext, ShutdownSignal, ShutdownState};
pub use key::{AccessPlan, SearchKey};
pub use restart::RestartState;
pub use session::SearchSession;

use crate::{db::asq::ReferralCause, types::Dnt};

///
/// Positioned
///
/// Result of one structural positioning step.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Positioned {
    Candidate(Dnt),
    NoMoreCandidates,
    TimeLimitExceeded,
    /// An ASQ target that is not a returnable object; a referral may be pending.
    NotAnObject(Dnt),
}

///
/// SearchOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchOutcome {
    Entry(Dnt),
    EndOfResults,
    TimeLimitExceeded,
    /// The result set is complete here but other servers hold more.
    Referral(ReferralCause),
    /// An ASQ member this server cannot return as an object. The caller
    /// reports it as a referral; the search itself continues.
    NotAnObject(Dnt),
}
