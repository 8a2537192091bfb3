//! The loaded, immutable data set.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{info, instrument};

use uaprobe_core::{PropertyType, Value};
use uaprobe_detection::{SignatureId, SignatureIndex};

use crate::error::DataFileError;
use crate::format::Header;
use crate::reader;
use crate::strings::{StringId, StringTable};

/// Loader options that shape the signature index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Shortest token in the substring automaton; `None` skips building it.
    pub nearest_min_token_len: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            nearest_min_token_len: Some(4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: Arc<str>,
    pub property_type: PropertyType,
    pub description: Option<Arc<str>>,
}

/// Property values shared by one or more signatures.
#[derive(Debug, Clone)]
pub struct Profile {
    pub profile_id: u32,
    /// Sorted by property index.
    values: Vec<(u32, Value)>,
}

impl Profile {
    pub(crate) fn new(profile_id: u32, values: Vec<(u32, Value)>) -> Self {
        Self { profile_id, values }
    }

    /// Value of the property at `property` (schema index), if the profile has one.
    pub fn value(&self, property: usize) -> Option<&Value> {
        let property = u32::try_from(property).ok()?;
        self.values
            .binary_search_by_key(&property, |(p, _)| *p)
            .ok()
            .map(|i| &self.values[i].1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub profile: u32,
    /// Popularity rank; lower is more common.
    pub rank: u32,
    pub pattern: StringId,
}

/// A fully loaded signature data file.
///
/// Immutable once built; engines share it behind an `Arc`.
pub struct DataFile {
    pub(crate) header: Header,
    pub(crate) name: Arc<str>,
    pub(crate) strings: StringTable,
    pub(crate) properties: Vec<Property>,
    pub(crate) property_lookup: HashMap<Arc<str>, usize>,
    pub(crate) profiles: Vec<Profile>,
    pub(crate) signatures: Vec<Signature>,
    pub(crate) index: SignatureIndex,
    pub(crate) checksum: [u8; 32],
    pub(crate) load_duration: Duration,
}

impl DataFile {
    /// Reads and loads the data file at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self, DataFileError> {
        let started = Instant::now();
        let raw = std::fs::read(path.as_ref())?;
        let data = reader::decode(&raw, options)?;
        Ok(data.loaded(started))
    }

    /// Loads a data file held in memory.
    pub fn from_bytes(raw: Bytes, options: LoadOptions) -> Result<Self, DataFileError> {
        let started = Instant::now();
        let data = reader::decode(&raw, options)?;
        Ok(data.loaded(started))
    }

    /// Stamps the load duration and logs the load once.
    fn loaded(mut self, started: Instant) -> Self {
        self.load_duration = started.elapsed();
        info!(
            name = %self.name,
            version = %format!("{}.{}", self.header.major, self.header.minor),
            properties = self.properties.len(),
            profiles = self.profiles.len(),
            signatures = self.signatures.len(),
            tokens = self.index.token_count(),
            elapsed_ms = self.load_duration.as_secs_f64() * 1000.0,
            "Data file loaded"
        );
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time spent reading and building the data set.
    pub fn load_duration(&self) -> Duration {
        self.load_duration
    }

    /// Hex form of the trailer checksum.
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Schema index of the property called `name`.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.property_lookup.get(name).copied()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Profile returned when nothing matches.
    pub fn default_profile(&self) -> &Profile {
        &self.profiles[self.header.default_profile as usize]
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn signature(&self, id: SignatureId) -> Option<&Signature> {
        self.signatures.get(id as usize)
    }

    /// Profile of a signature. Signature references are checked at load.
    pub fn signature_profile(&self, id: SignatureId) -> Option<&Profile> {
        self.signature(id)
            .map(|s| &self.profiles[s.profile as usize])
    }

    /// The User-Agent pattern a signature was built from.
    pub fn signature_pattern(&self, id: SignatureId) -> Option<&str> {
        self.signature(id).and_then(|s| self.strings.get(s.pattern))
    }

    pub fn index(&self) -> &SignatureIndex {
        &self.index
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }
}

impl std::fmt::Debug for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFile")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("properties", &self.properties.len())
            .field("profiles", &self.profiles.len())
            .field("signatures", &self.signatures.len())
            .field("index", &self.index)
            .finish()
    }
}
