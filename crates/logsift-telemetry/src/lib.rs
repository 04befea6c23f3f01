//! Logsift Telemetry
//!
//! Per-operation performance monitoring. The [`PerformanceMonitor`] is an
//! explicitly constructed, cheaply cloneable registry: wrap a future to time
//! it, query aggregates afterwards. Samples also flow to the `metrics`
//! facade so an exporter can be attached by the embedding application.

pub mod monitor;

pub use monitor::{MetricSample, OperationStats, PerformanceMonitor, SampleOutcome};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::monitor::{
        MetricSample, OperationStats, PerformanceMonitor, SampleOutcome,
    };
}
