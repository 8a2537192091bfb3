//! Structured logging with `tracing`.

use std::fmt;

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Engine lifecycle transitions worth a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Initializing,
    Ready,
    InitializationFailed,
    Disposed,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::Initializing => "initializing",
            LifecycleEvent::Ready => "ready",
            LifecycleEvent::InitializationFailed => "initialization_failed",
            LifecycleEvent::Disposed => "disposed",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber. `RUST_LOG` takes precedence over
    /// `default_level`. Fails when a global subscriber is already set.
    pub fn init(default_level: &str) -> Result<(), TryInitError> {
        subscriber_fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .finish()
            .try_init()
    }

    pub fn log_lifecycle(event: LifecycleEvent, data_set: Option<&str>) {
        let span = info_span!("engine_lifecycle", event = %event);
        let _entered = span.enter();
        match event {
            LifecycleEvent::InitializationFailed => {
                tracing::warn!(data_set = data_set.unwrap_or("-"), "Engine lifecycle event")
            }
            _ => tracing::info!(data_set = data_set.unwrap_or("-"), "Engine lifecycle event"),
        }
    }
}
