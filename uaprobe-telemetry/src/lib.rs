//! # uaprobe Telemetry
//!
//! Logging setup and detection metrics.

pub mod logging;
pub mod metrics;

pub use logging::{EventLogger, LifecycleEvent};
pub use metrics::MetricsRecorder;
pub use tracing_subscriber::util::TryInitError;
