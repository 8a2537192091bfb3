use thiserror::Error;
use uaprobe_datafile::DataFileError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    Initialization(#[source] DataFileError),

    #[error("Engine is already initialized")]
    AlreadyInitialized,

    #[error("Engine is not ready")]
    NotReady,

    #[error("Engine has been disposed")]
    Disposed,

    #[error("Property '{0}' is not in the data file")]
    UnknownProperty(String),

    #[error("Metrics setup failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// Not a required property, or the matched profile has no value for it.
    #[error("Property '{0}' not found")]
    NotFound(String),
}
