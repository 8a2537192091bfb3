//! # uaprobe Engine
//!
//! Caller-owned detection engine: load a data file once, then detect
//! User-Agents from any number of threads.
//!
//! ```no_run
//! use uaprobe_engine::{Engine, MatcherSettings};
//!
//! let mut engine = Engine::new(MatcherSettings::default());
//! engine.initialize("data/lite.uapd", &["IsMobile"])?;
//! let result = engine.detect("Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X)")?;
//! println!("{}", result.get("IsMobile")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;

pub use engine::{DetectionResult, Engine, EngineError, EngineState, PropertyError};
pub use uaprobe_core::Value;
pub use uaprobe_datafile::{DataFile, LoadOptions};
pub use uaprobe_detection::{MatcherSettings, Method};

pub mod prelude {
    pub use super::{DetectionResult, Engine, EngineError, EngineState, PropertyError, Value};
}
