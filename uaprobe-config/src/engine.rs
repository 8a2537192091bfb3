//! Engine configuration: which data file to load and which properties to expose.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct EngineConfig {
    /// Data file loaded by `Engine::from_config`. Left unset, the engine
    /// starts uninitialized.
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Properties exposed on results; empty exposes all of them.
    #[serde(default)]
    #[validate(custom(function = validation::validate_property_names))]
    pub required_properties: Vec<String>,
}
