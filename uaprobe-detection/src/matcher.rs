//! ## uaprobe-detection::matcher
//! **Closest-signature matching over a [`SignatureIndex`]**
//!
//! 1. Truncate the input to the index's maximum User-Agent length and
//!    tokenize it, keeping at most `max_tokens` tokens.
//! 2. Resolve tokens in the sorted token table and rank candidate signatures
//!    by shared tokens.
//! 3. Score candidates with a token edit distance: insert and delete cost 2,
//!    substitution costs 2, or 1 when both tokens differ only in digits.
//! 4. If nothing scores within the threshold, look for signature tokens as
//!    substrings of the raw input (the nearest pass).
//!
//! All per-call buffers come from the thread's scratch arena; the index is
//! only ever read.

use bumpalo::{collections::Vec as BumpVec, Bump};

use uaprobe_core::alloc::with_scratch;
use uaprobe_core::tokenize::{same_shape, tokenize, truncate_to_boundary};

use crate::index::{SignatureId, SignatureIndex, TokenId, MAX_SIGNATURE_TOKENS};

const INDEL_COST: u32 = 2;
const SUBSTITUTION_COST: u32 = 2;
const VERSION_SUBSTITUTION_COST: u32 = 1;

/// Postings gathered per requested candidate.
const POSTINGS_PER_CANDIDATE: usize = 32;

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Token sequence identical to a signature.
    Exact,
    /// Same token sequence except for version numbers.
    Numeric,
    /// Signature tokens found as substrings of the input.
    Nearest,
    /// Lowest edit distance within the threshold.
    Closest,
    /// Nothing close enough; the default profile applies.
    NoMatch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Exact => "exact",
            Method::Numeric => "numeric",
            Method::Nearest => "nearest",
            Method::Closest => "closest",
            Method::NoMatch => "none",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherSettings {
    /// Input tokens considered per User-Agent.
    pub max_tokens: usize,
    /// Candidate signatures scored per pass.
    pub max_candidates: usize,
    /// Accepted difference as a fraction of the worst case for the pair.
    pub max_difference: f32,
    /// Run the substring pass when the token pass finds nothing.
    pub nearest_enabled: bool,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            max_tokens: 64,
            max_candidates: 64,
            max_difference: 0.5,
            nearest_enabled: true,
        }
    }
}

/// Result of matching one User-Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// `None` when `method` is [`Method::NoMatch`].
    pub signature: Option<SignatureId>,
    pub method: Method,
    pub difference: u32,
    pub signatures_compared: u32,
    pub tokens_evaluated: u32,
}

impl MatchOutcome {
    fn no_match(tokens_evaluated: u32, signatures_compared: u32) -> Self {
        Self {
            signature: None,
            method: Method::NoMatch,
            difference: 0,
            signatures_compared,
            tokens_evaluated,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QueryToken<'a> {
    id: Option<TokenId>,
    text: &'a str,
}

#[derive(Debug, Clone, Copy)]
struct Best {
    signature: SignatureId,
    difference: u32,
}

/// Stateless matcher; cheap to copy and safe to share between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    settings: MatcherSettings,
}

impl Matcher {
    pub fn new(settings: MatcherSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Matches `user_agent` against `index`. Never fails: input that matches
    /// nothing yields [`Method::NoMatch`].
    pub fn match_user_agent(&self, index: &SignatureIndex, user_agent: &str) -> MatchOutcome {
        let ua = truncate_to_boundary(user_agent, index.max_user_agent_length());
        with_scratch(|bump| self.match_in(index, ua, bump))
    }

    fn match_in(&self, index: &SignatureIndex, ua: &str, bump: &Bump) -> MatchOutcome {
        let query = BumpVec::from_iter_in(
            tokenize(ua)
                .take(self.settings.max_tokens)
                .map(|text| QueryToken {
                    id: index.lookup(text),
                    text,
                }),
            bump,
        );
        if query.is_empty() {
            return MatchOutcome::no_match(0, 0);
        }
        let tokens_evaluated = query.len() as u32;
        let budget = self.settings.max_candidates * POSTINGS_PER_CANDIDATE;
        let mut compared = 0u32;

        let known = BumpVec::from_iter_in(query.iter().filter_map(|q| q.id), bump);
        if !known.is_empty() {
            let candidates = index.candidates(&known, self.settings.max_candidates, budget, bump);
            let mut prev = BumpVec::with_capacity_in(MAX_SIGNATURE_TOKENS + 1, bump);
            let mut cur = BumpVec::with_capacity_in(MAX_SIGNATURE_TOKENS + 1, bump);
            let mut best: Option<Best> = None;

            for candidate in candidates.iter() {
                let target = index.signature_tokens(candidate.signature);
                // The length gap alone is a lower bound on the distance.
                let gap = query.len().abs_diff(target.len()) as u32 * INDEL_COST;
                if !improves(best, gap, candidate.signature) {
                    continue;
                }
                compared += 1;
                let difference = edit_distance(index, &query, target, &mut prev, &mut cur);
                if improves(best, difference, candidate.signature) {
                    best = Some(Best {
                        signature: candidate.signature,
                        difference,
                    });
                    if difference == 0 {
                        break;
                    }
                }
            }

            if let Some(best) = best {
                let target = index.signature_tokens(best.signature);
                if self.accepts(best.difference, query.len(), target.len()) {
                    let method = if best.difference == 0 {
                        Method::Exact
                    } else if differs_only_in_versions(index, &query, target) {
                        Method::Numeric
                    } else {
                        Method::Closest
                    };
                    return MatchOutcome {
                        signature: Some(best.signature),
                        method,
                        difference: best.difference,
                        signatures_compared: compared,
                        tokens_evaluated,
                    };
                }
            }
        }

        if self.settings.nearest_enabled && index.has_nearest() {
            if let Some(outcome) =
                self.match_nearest(index, ua, bump, budget, tokens_evaluated, &mut compared)
            {
                return outcome;
            }
        }

        MatchOutcome::no_match(tokens_evaluated, compared)
    }

    /// Substring pass. Difference is `INDEL_COST` per signature token absent
    /// from the input; among equals the candidate sharing more tokens wins.
    fn match_nearest(
        &self,
        index: &SignatureIndex,
        ua: &str,
        bump: &Bump,
        budget: usize,
        tokens_evaluated: u32,
        compared: &mut u32,
    ) -> Option<MatchOutcome> {
        let found = index.substring_tokens(ua, self.settings.max_tokens, bump);
        if found.is_empty() {
            return None;
        }
        let min_len = index.nearest_min_token_len().unwrap_or(usize::MAX);
        let candidates = index.candidates(&found, self.settings.max_candidates, budget, bump);

        let mut best: Option<Best> = None;
        for candidate in candidates.iter() {
            *compared += 1;
            let target = index.signature_tokens(candidate.signature);
            let missing = target
                .iter()
                .filter(|&&token| {
                    let text = index.token_text(token);
                    if text.len() >= min_len {
                        found.binary_search(&token).is_err()
                    } else {
                        !ua.contains(text)
                    }
                })
                .count() as u32;
            let difference = missing * INDEL_COST;
            if best.map_or(true, |b| difference < b.difference) {
                best = Some(Best {
                    signature: candidate.signature,
                    difference,
                });
            }
        }

        let best = best?;
        let len = index.signature_tokens(best.signature).len();
        if !self.accepts(best.difference, len, len) {
            return None;
        }
        Some(MatchOutcome {
            signature: Some(best.signature),
            method: Method::Nearest,
            difference: best.difference,
            signatures_compared: *compared,
            tokens_evaluated,
        })
    }

    fn accepts(&self, difference: u32, query_len: usize, target_len: usize) -> bool {
        let worst = (query_len.max(target_len) as u32 * INDEL_COST) as f64;
        difference as f64 <= self.settings.max_difference as f64 * worst
    }
}

/// Lower difference wins; equal differences go to the earlier signature.
#[inline]
fn improves(best: Option<Best>, difference: u32, signature: SignatureId) -> bool {
    match best {
        None => true,
        Some(b) => (difference, signature) < (b.difference, b.signature),
    }
}

#[inline]
fn substitution_cost(index: &SignatureIndex, query: &QueryToken<'_>, target: TokenId) -> u32 {
    if query.id == Some(target) {
        0
    } else if same_shape(query.text, index.token_text(target)) {
        VERSION_SUBSTITUTION_COST
    } else {
        SUBSTITUTION_COST
    }
}

/// Two-row Levenshtein over tokens.
fn edit_distance<'b>(
    index: &SignatureIndex,
    query: &[QueryToken<'_>],
    target: &[TokenId],
    prev: &mut BumpVec<'b, u32>,
    cur: &mut BumpVec<'b, u32>,
) -> u32 {
    let m = target.len();
    prev.clear();
    prev.extend((0..=m as u32).map(|j| j * INDEL_COST));
    cur.clear();
    cur.resize(m + 1, 0);

    for (i, q) in query.iter().enumerate() {
        cur[0] = (i as u32 + 1) * INDEL_COST;
        for j in 0..m {
            let substitute = prev[j] + substitution_cost(index, q, target[j]);
            let delete = prev[j + 1] + INDEL_COST;
            let insert = cur[j] + INDEL_COST;
            cur[j + 1] = substitute.min(delete).min(insert);
        }
        std::mem::swap(prev, cur);
    }
    prev[m]
}

fn differs_only_in_versions(
    index: &SignatureIndex,
    query: &[QueryToken<'_>],
    target: &[TokenId],
) -> bool {
    query.len() == target.len()
        && query
            .iter()
            .zip(target)
            .all(|(q, &t)| q.id == Some(t) || same_shape(q.text, index.token_text(t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, IndexOptions};
    use proptest::prelude::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    fn index() -> SignatureIndex {
        let mut builder = IndexBuilder::new(IndexOptions::default(), 4);
        for pattern in [IPHONE, ANDROID, WINDOWS, GOOGLEBOT] {
            builder.push_signature(pattern).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_exact_match() {
        let index = index();
        let outcome = Matcher::default().match_user_agent(&index, ANDROID);
        assert_eq!(outcome.signature, Some(1));
        assert_eq!(outcome.method, Method::Exact);
        assert_eq!(outcome.difference, 0);
        assert_eq!(outcome.tokens_evaluated, 16);
    }

    #[test]
    fn test_version_change_is_numeric() {
        let index = index();
        let ua = ANDROID.replace("Chrome/120.0.0.0", "Chrome/119.0.6045.163");
        let outcome = Matcher::default().match_user_agent(&index, &ua);
        assert_eq!(outcome.signature, Some(1));
        assert_eq!(outcome.method, Method::Numeric);
        assert_eq!(outcome.difference, VERSION_SUBSTITUTION_COST);
    }

    #[test]
    fn test_extra_token_is_closest() {
        let index = index();
        let ua = ANDROID.replace("K)", "K; wv)");
        let outcome = Matcher::default().match_user_agent(&index, &ua);
        assert_eq!(outcome.signature, Some(1));
        assert_eq!(outcome.method, Method::Closest);
        assert_eq!(outcome.difference, INDEL_COST);
        assert!(outcome.signatures_compared >= 1);
    }

    #[test]
    fn test_glued_tokens_use_nearest() {
        let index = index();
        let ua = "Mozilla-5.0-compatible-Googlebot-2.1-+http:-www.google.com-bot.html";
        let outcome = Matcher::default().match_user_agent(&index, ua);
        assert_eq!(outcome.signature, Some(3));
        assert_eq!(outcome.method, Method::Nearest);
        assert_eq!(outcome.difference, 0);
    }

    #[test]
    fn test_nearest_disabled_falls_through() {
        let index = index();
        let matcher = Matcher::new(MatcherSettings {
            nearest_enabled: false,
            ..MatcherSettings::default()
        });
        let ua = "Mozilla-5.0-compatible-Googlebot-2.1-+http:-www.google.com-bot.html";
        assert_eq!(matcher.match_user_agent(&index, ua).method, Method::NoMatch);
    }

    #[test]
    fn test_unknown_and_empty_inputs() {
        let index = index();
        let matcher = Matcher::default();
        let outcome = matcher.match_user_agent(&index, "qqqq zzzz");
        assert_eq!(outcome.method, Method::NoMatch);
        assert_eq!(outcome.signature, None);

        let empty = matcher.match_user_agent(&index, "");
        assert_eq!(empty, MatchOutcome::no_match(0, 0));
        assert_eq!(matcher.match_user_agent(&index, " ;;() ").tokens_evaluated, 0);
    }

    #[test]
    fn test_zero_threshold_rejects_version_change() {
        let index = index();
        let matcher = Matcher::new(MatcherSettings {
            max_difference: 0.0,
            nearest_enabled: false,
            ..MatcherSettings::default()
        });
        let ua = ANDROID.replace("Chrome/120.0.0.0", "Chrome/119.0.6045.163");
        assert_eq!(matcher.match_user_agent(&index, &ua).method, Method::NoMatch);
        assert_eq!(matcher.match_user_agent(&index, ANDROID).method, Method::Exact);
    }

    #[test]
    fn test_token_cap_bounds_work() {
        let index = index();
        let matcher = Matcher::new(MatcherSettings {
            max_tokens: 8,
            ..MatcherSettings::default()
        });
        let long = format!("{ANDROID} {}", "junk ".repeat(10_000));
        let outcome = matcher.match_user_agent(&index, &long);
        assert!(outcome.tokens_evaluated <= 8);
    }

    #[test]
    fn test_edit_distance_costs() {
        let index = index();
        let bump = Bump::new();
        let mut prev = BumpVec::new_in(&bump);
        let mut cur = BumpVec::new_in(&bump);
        let target = index.signature_tokens(3);
        let query: Vec<_> = tokenize(GOOGLEBOT)
            .map(|text| QueryToken {
                id: index.lookup(text),
                text,
            })
            .collect();
        assert_eq!(edit_distance(&index, &query, target, &mut prev, &mut cur), 0);
        assert_eq!(
            edit_distance(&index, &query[1..], target, &mut prev, &mut cur),
            INDEL_COST
        );
        assert_eq!(
            edit_distance(&index, &[], target, &mut prev, &mut cur),
            target.len() as u32 * INDEL_COST
        );
    }

    proptest! {
        #[test]
        fn any_input_is_matched_deterministically(input in "\\PC{0,600}") {
            let index = index();
            let matcher = Matcher::default();
            let first = matcher.match_user_agent(&index, &input);
            let second = matcher.match_user_agent(&index, &input);
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.signature.is_none(), first.method == Method::NoMatch);
        }
    }
}
