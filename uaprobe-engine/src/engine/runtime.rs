//! Engine lifecycle and the detect entry point.
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, trace};

use uaprobe_config::UaprobeConfig;
use uaprobe_core::alloc::ScratchStats;
use uaprobe_datafile::{DataFile, DataFileError, LoadOptions};
use uaprobe_detection::{Matcher, MatcherSettings};
use uaprobe_telemetry::{EventLogger, LifecycleEvent, MetricsRecorder, TryInitError};

use super::error::EngineError;
use super::result::DetectionResult;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

enum State {
    Uninitialized,
    Initializing,
    Ready(Loaded),
    Disposed,
}

/// What `initialize` leaves behind for `detect`.
struct Loaded {
    data: Arc<DataFile>,
    /// Schema indices exposed on results, sorted.
    exposed: Arc<[usize]>,
}

/// A detection engine over one loaded data file.
///
/// Lifecycle methods take `&mut self` and `detect` takes `&self`, so the
/// borrow checker keeps lifecycle changes away from in-flight detections.
/// Share a ready engine across threads by reference or behind an `Arc`.
pub struct Engine {
    matcher: Matcher,
    load_options: LoadOptions,
    metrics: Option<Arc<MetricsRecorder>>,
    state: State,
}

impl Engine {
    /// Creates an uninitialized engine. The substring pass follows
    /// `settings.nearest_enabled`.
    pub fn new(settings: MatcherSettings) -> Self {
        let load_options = if settings.nearest_enabled {
            LoadOptions::default()
        } else {
            LoadOptions {
                nearest_min_token_len: None,
            }
        };
        Self {
            matcher: Matcher::new(settings),
            load_options,
            metrics: None,
            state: State::Uninitialized,
        }
    }

    /// Builds an engine from configuration, initializing it when a data file
    /// is configured.
    pub fn from_config(config: &UaprobeConfig) -> Result<Self, EngineError> {
        let matcher = &config.matcher;
        let mut engine = Self::new(MatcherSettings {
            max_tokens: matcher.max_tokens,
            max_candidates: matcher.max_candidates,
            max_difference: matcher.max_difference as f32,
            nearest_enabled: matcher.nearest_enabled,
        })
        .with_load_options(LoadOptions {
            nearest_min_token_len: matcher
                .nearest_enabled
                .then_some(matcher.min_nearest_token_len),
        });
        if config.telemetry.metrics_enabled {
            engine = engine.with_metrics(Arc::new(MetricsRecorder::new()?));
        }
        if let Some(path) = &config.engine.data_file {
            engine.initialize(path, &config.engine.required_properties)?;
        }
        Ok(engine)
    }

    /// Installs the global log subscriber at `telemetry.log_level`. Call it
    /// once at startup; it fails if a global subscriber is already set.
    pub fn init_logging(config: &UaprobeConfig) -> Result<(), TryInitError> {
        EventLogger::init(&config.telemetry.log_level)
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.metrics.as_ref()
    }

    pub fn settings(&self) -> &MatcherSettings {
        self.matcher.settings()
    }

    pub fn state(&self) -> EngineState {
        match self.state {
            State::Uninitialized => EngineState::Uninitialized,
            State::Initializing => EngineState::Initializing,
            State::Ready(_) => EngineState::Ready,
            State::Disposed => EngineState::Disposed,
        }
    }

    /// The loaded data file, while ready.
    pub fn data_file(&self) -> Option<&Arc<DataFile>> {
        match &self.state {
            State::Ready(loaded) => Some(&loaded.data),
            _ => None,
        }
    }

    /// Names of the properties exposed on results, while ready.
    pub fn exposed_properties(&self) -> Vec<&str> {
        match &self.state {
            State::Ready(loaded) => loaded
                .exposed
                .iter()
                .map(|&i| loaded.data.properties()[i].name.as_ref())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Loads the data file at `path`. An empty `required_properties` exposes
    /// every property in the file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn initialize<S: AsRef<str>>(
        &mut self,
        path: impl AsRef<Path>,
        required_properties: &[S],
    ) -> Result<(), EngineError> {
        self.begin()?;
        let options = self.load_options;
        let loaded = DataFile::from_path(path, options);
        self.finish(loaded, required_properties)
    }

    /// Like [`Engine::initialize`], for a data file already in memory.
    pub fn initialize_from_bytes<S: AsRef<str>>(
        &mut self,
        raw: impl Into<bytes::Bytes>,
        required_properties: &[S],
    ) -> Result<(), EngineError> {
        self.begin()?;
        let loaded = DataFile::from_bytes(raw.into(), self.load_options);
        self.finish(loaded, required_properties)
    }

    fn begin(&mut self) -> Result<(), EngineError> {
        match self.state {
            State::Uninitialized => {
                self.state = State::Initializing;
                EventLogger::log_lifecycle(LifecycleEvent::Initializing, None);
                Ok(())
            }
            State::Initializing | State::Ready(_) => Err(EngineError::AlreadyInitialized),
            State::Disposed => Err(EngineError::Disposed),
        }
    }

    fn finish<S: AsRef<str>>(
        &mut self,
        loaded: Result<DataFile, DataFileError>,
        required_properties: &[S],
    ) -> Result<(), EngineError> {
        let outcome = loaded
            .map_err(EngineError::Initialization)
            .and_then(|data| resolve_required(data, required_properties));
        match outcome {
            Ok(loaded) => {
                EventLogger::log_lifecycle(LifecycleEvent::Ready, Some(loaded.data.name()));
                if let Some(metrics) = &self.metrics {
                    metrics.record_initialize(loaded.data.load_duration());
                }
                debug!(exposed = loaded.exposed.len(), "Exposed properties resolved");
                self.state = State::Ready(loaded);
                Ok(())
            }
            Err(err) => {
                EventLogger::log_lifecycle(LifecycleEvent::InitializationFailed, None);
                self.state = State::Uninitialized;
                Err(err)
            }
        }
    }

    /// Detects the properties of `user_agent`.
    ///
    /// Unrecognised or malformed input is not an error: it yields the data
    /// file's default profile with [`Method::NoMatch`](uaprobe_detection::Method).
    pub fn detect(&self, user_agent: &str) -> Result<DetectionResult, EngineError> {
        let loaded = match &self.state {
            State::Ready(loaded) => loaded,
            State::Disposed => return Err(EngineError::Disposed),
            State::Uninitialized | State::Initializing => return Err(EngineError::NotReady),
        };

        let started = Instant::now();
        let outcome = self
            .matcher
            .match_user_agent(loaded.data.index(), user_agent);
        let signature = outcome.signature.and_then(|id| loaded.data.signature(id));
        let profile = signature.map_or(loaded.data.header().default_profile as usize, |s| {
            s.profile as usize
        });
        let rank = signature.map(|s| s.rank);

        trace!(
            method = %outcome.method,
            difference = outcome.difference,
            signature = ?outcome.signature,
            compared = outcome.signatures_compared,
            "Detected"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_detection(started.elapsed(), signature.is_some());
            let scratch = ScratchStats::global();
            metrics.record_scratch(scratch.reuses(), scratch.fallbacks());
        }

        Ok(DetectionResult::new(
            loaded.data.clone(),
            loaded.exposed.clone(),
            profile,
            rank,
            outcome,
        ))
    }

    /// Releases the data file. Results already handed out stay valid.
    /// Calling it again is a no-op.
    pub fn dispose(&mut self) {
        if matches!(self.state, State::Disposed) {
            return;
        }
        let name = self.data_file().map(|d| d.name().to_owned());
        self.state = State::Disposed;
        EventLogger::log_lifecycle(LifecycleEvent::Disposed, name.as_deref());
        info!("Engine disposed");
    }
}

fn resolve_required<S: AsRef<str>>(
    data: DataFile,
    required_properties: &[S],
) -> Result<Loaded, EngineError> {
    let mut exposed: Vec<usize> = if required_properties.is_empty() {
        (0..data.properties().len()).collect()
    } else {
        required_properties
            .iter()
            .map(|name| {
                let name = name.as_ref();
                data.property_index(name)
                    .ok_or_else(|| EngineError::UnknownProperty(name.to_owned()))
            })
            .collect::<Result<_, _>>()?
    };
    exposed.sort_unstable();
    exposed.dedup();
    Ok(Loaded {
        data: Arc::new(data),
        exposed: exposed.into(),
    })
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("settings", self.matcher.settings())
            .field("data_file", &self.data_file().map(|d| d.name()))
            .finish()
    }
}
