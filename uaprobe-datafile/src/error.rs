//! Error types for data file loading

use thiserror::Error;
use uaprobe_core::ValueParseError;
use uaprobe_detection::IndexError;

use crate::format::{FORMAT_MAJOR, FORMAT_MINOR};

#[derive(Debug, Error)]
pub enum DataFileError {
    /// The file could not be read.
    #[error("Data file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structure, checksum or content is invalid.
    #[error("Data file is corrupt: {0}")]
    Corrupt(String),

    /// Format version this build cannot read.
    #[error(
        "Unsupported data file version {major}.{minor} (supported: {supported_major}.0 to {supported_major}.{supported_minor})",
        supported_major = FORMAT_MAJOR,
        supported_minor = FORMAT_MINOR
    )]
    IncompatibleVersion { major: u16, minor: u16 },
}

impl DataFileError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        DataFileError::Corrupt(msg.into())
    }
}

impl From<IndexError> for DataFileError {
    fn from(err: IndexError) -> Self {
        DataFileError::Corrupt(format!("signature index: {err}"))
    }
}

impl From<ValueParseError> for DataFileError {
    fn from(err: ValueParseError) -> Self {
        DataFileError::Corrupt(err.to_string())
    }
}
