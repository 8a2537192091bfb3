mod error;
mod result;
mod runtime;

pub use self::{
    error::{EngineError, PropertyError},
    result::DetectionResult,
    runtime::{Engine, EngineState},
};
