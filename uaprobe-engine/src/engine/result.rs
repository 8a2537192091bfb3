use std::fmt;
use std::sync::Arc;

use uaprobe_core::Value;
use uaprobe_datafile::{DataFile, Profile};
use uaprobe_detection::{MatchOutcome, Method, SignatureId};

use super::error::PropertyError;

/// Properties detected for one User-Agent.
///
/// Holds its own handle on the data file, so it outlives the engine that
/// produced it.
#[derive(Clone)]
pub struct DetectionResult {
    data: Arc<DataFile>,
    exposed: Arc<[usize]>,
    profile: usize,
    rank: Option<u32>,
    outcome: MatchOutcome,
}

impl DetectionResult {
    pub(crate) fn new(
        data: Arc<DataFile>,
        exposed: Arc<[usize]>,
        profile: usize,
        rank: Option<u32>,
        outcome: MatchOutcome,
    ) -> Self {
        Self {
            data,
            exposed,
            profile,
            rank,
            outcome,
        }
    }

    fn profile(&self) -> &Profile {
        &self.data.profiles()[self.profile]
    }

    /// Value of a required property.
    pub fn get(&self, name: &str) -> Result<&Value, PropertyError> {
        self.data
            .property_index(name)
            .filter(|index| self.exposed.binary_search(index).is_ok())
            .and_then(|index| self.profile().value(index))
            .ok_or_else(|| PropertyError::NotFound(name.to_owned()))
    }

    /// Exposed properties that have a value, in schema order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        let profile = self.profile();
        let schema = self.data.properties();
        self.exposed
            .iter()
            .filter_map(move |&i| profile.value(i).map(|v| (schema[i].name.as_ref(), v)))
    }

    pub fn profile_id(&self) -> u32 {
        self.profile().profile_id
    }

    pub fn method(&self) -> Method {
        self.outcome.method
    }

    pub fn difference(&self) -> u32 {
        self.outcome.difference
    }

    pub fn signature(&self) -> Option<SignatureId> {
        self.outcome.signature
    }

    /// Popularity rank of the matched signature.
    pub fn rank(&self) -> Option<u32> {
        self.rank
    }

    /// The pattern of the matched signature.
    pub fn matched_pattern(&self) -> Option<&str> {
        self.outcome
            .signature
            .and_then(|id| self.data.signature_pattern(id))
    }

    pub fn is_match(&self) -> bool {
        self.outcome.signature.is_some()
    }

    pub fn signatures_compared(&self) -> u32 {
        self.outcome.signatures_compared
    }

    pub fn tokens_evaluated(&self) -> u32 {
        self.outcome.tokens_evaluated
    }
}

impl fmt::Debug for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionResult")
            .field("profile_id", &self.profile_id())
            .field("method", &self.outcome.method)
            .field("difference", &self.outcome.difference)
            .field("signature", &self.outcome.signature)
            .finish()
    }
}
