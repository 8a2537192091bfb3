//! Matcher tuning.
//!
//! Every limit here bounds per-call work; none of them change which signature
//! wins among the candidates that are examined.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Tokens of the input considered.
    #[serde(default = "default_max_tokens")]
    #[validate(range(min = 1, max = 1024))]
    pub max_tokens: usize,

    /// Candidate signatures scored per call.
    #[serde(default = "default_max_candidates")]
    #[validate(range(min = 1, max = 4096))]
    pub max_candidates: usize,

    /// Accepted difference as a fraction of the worst case.
    #[serde(default = "default_max_difference")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_difference: f64,

    /// Whether the substring fallback runs when token matching fails.
    #[serde(default = "default_true")]
    pub nearest_enabled: bool,

    /// Shortest signature token the substring fallback searches for.
    #[serde(default = "default_min_nearest_token_len")]
    #[validate(range(min = 2, max = 64))]
    pub min_nearest_token_len: usize,
}

fn default_max_tokens() -> usize {
    64
}

fn default_max_candidates() -> usize {
    64
}

fn default_max_difference() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_min_nearest_token_len() -> usize {
    4
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_candidates: default_max_candidates(),
            max_difference: default_max_difference(),
            nearest_enabled: default_true(),
            min_nearest_token_len: default_min_nearest_token_len(),
        }
    }
}
