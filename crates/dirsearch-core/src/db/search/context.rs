use crate::{
    config::SearchConfig,
    obs::{GLOBAL_METRICS_SINK, MetricsSink},
    traits::{Clock, FilterEvaluator, ObjectSecurity},
};
use std::sync::atomic::{AtomicU8, Ordering};

///
/// ShutdownState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownState {
    Running,
    /// Client sessions are being torn down; internal tasks keep running.
    RemovingClients,
    Stopped,
}

///
/// CallerKind
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CallerKind {
    #[default]
    Client,
    DirectoryInternal,
}

///
/// ShutdownSignal
///
/// Process-wide shutdown flag, injected into every search.
///

#[derive(Debug)]
pub struct ShutdownSignal(AtomicU8);

impl ShutdownSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn set(&self, state: ShutdownState) {
        let raw = match state {
            ShutdownState::Running => 0,
            ShutdownState::RemovingClients => 1,
            ShutdownState::Stopped => 2,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    #[must_use]
    pub fn state(&self) -> ShutdownState {
        match self.0.load(Ordering::SeqCst) {
            0 => ShutdownState::Running,
            1 => ShutdownState::RemovingClients,
            _ => ShutdownState::Stopped,
        }
    }

    #[must_use]
    pub fn should_stop(&self, caller: CallerKind) -> bool {
        match self.state() {
            ShutdownState::Running => false,
            ShutdownState::RemovingClients => caller != CallerKind::DirectoryInternal,
            ShutdownState::Stopped => true,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

///
/// Deadline
///
/// `start + delta` in clock ticks; tick wrap-around is tolerated.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Deadline {
    pub start_tick: u64,
    pub delta_tick: u64,
}

impl Deadline {
    #[must_use]
    pub fn starting_now(clock: &dyn Clock, delta_tick: u64) -> Self {
        Self {
            start_tick: clock.ticks(),
            delta_tick,
        }
    }

    #[must_use]
    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.ticks().wrapping_sub(self.start_tick) > self.delta_tick
    }
}

///
/// SearchContext
///
/// Capabilities a search session runs against. Nothing in the core reaches
/// for ambient globals; everything arrives through here.
///

pub struct SearchContext<'a> {
    pub config: &'a SearchConfig,
    pub clock: &'a dyn Clock,
    pub shutdown: &'a ShutdownSignal,
    pub caller: CallerKind,
    pub metrics: &'a dyn MetricsSink,

    /// Security evaluation is requested when present.
    pub security: Option<&'a dyn ObjectSecurity>,
    pub filter: Option<&'a dyn FilterEvaluator>,
}

impl<'a> SearchContext<'a> {
    #[must_use]
    pub fn new(config: &'a SearchConfig, clock: &'a dyn Clock, shutdown: &'a ShutdownSignal) -> Self {
        Self {
            config,
            clock,
            shutdown,
            caller: CallerKind::Client,
            metrics: &GLOBAL_METRICS_SINK,
            security: None,
            filter: None,
        }
    }

    #[must_use]
    pub const fn with_caller(mut self, caller: CallerKind) -> Self {
        self.caller = caller;
        self
    }

    #[must_use]
    pub const fn with_metrics(mut self, metrics: &'a dyn MetricsSink) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub const fn with_security(mut self, security: &'a dyn ObjectSecurity) -> Self {
        self.security = Some(security);
        self
    }

    #[must_use]
    pub const fn with_filter(mut self, filter: &'a dyn FilterEvaluator) -> Self {
        self.filter = Some(filter);
        self
    }
}
