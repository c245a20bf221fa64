//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! This module does not access storage internals directly.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventReport, EventState, IndexSummary};
pub use sink::{
    GLOBAL_METRICS_SINK, GlobalMetricsSink, MetricsEvent, MetricsSink, VlvStrategy,
    metrics_report, metrics_reset_all,
};
