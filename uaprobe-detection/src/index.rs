//! ## uaprobe-detection::index
//! **Sorted token table with contiguous posting lists**
//!
//! Every signature pattern is tokenized with the shared rule from
//! `uaprobe-core`. Distinct tokens live in one string heap, sorted, so a lookup
//! is a binary search. Posting lists (token → signatures) and signature token
//! sequences are flat `Vec<u32>` buffers addressed by offset tables.
//!
//! An Aho-Corasick automaton over the longer tokens backs the substring
//! ("nearest") fallback used when tokenization of the input does not line up
//! with any signature.

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use bumpalo::{collections::Vec as BumpVec, Bump};
use thiserror::Error;
use tracing::debug;

use uaprobe_core::tokenize::{tokenize, truncate_to_boundary};

pub type TokenId = u32;
pub type SignatureId = u32;

/// Tokens kept per signature pattern.
pub const MAX_SIGNATURE_TOKENS: usize = 128;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Substring automaton build failed: {0}")]
    Automaton(String),

    #[error("Index capacity exceeded: too many {0}")]
    Capacity(&'static str),
}

/// Build-time options, fixed for the lifetime of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Longest User-Agent prefix (bytes) considered, for patterns and inputs alike.
    pub max_user_agent_length: usize,
    /// Shortest token placed in the substring automaton. `None` skips
    /// building it, which disables the nearest fallback.
    pub nearest_min_token_len: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_user_agent_length: 512,
            nearest_min_token_len: Some(4),
        }
    }
}

/// A signature sharing at least one token with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub signature: SignatureId,
    /// Distinct input tokens found in the signature.
    pub shared: u32,
}

/// Accumulates signatures in declared order; `build` freezes them into a
/// [`SignatureIndex`].
pub struct IndexBuilder<'s> {
    options: IndexOptions,
    interned: HashMap<&'s str, TokenId>,
    texts: Vec<&'s str>,
    sig_offsets: Vec<u32>,
    sig_tokens: Vec<TokenId>,
}

impl<'s> IndexBuilder<'s> {
    pub fn new(options: IndexOptions, expected_signatures: usize) -> Self {
        let mut sig_offsets = Vec::with_capacity(expected_signatures + 1);
        sig_offsets.push(0);
        Self {
            options,
            interned: HashMap::with_capacity(expected_signatures * 4),
            texts: Vec::with_capacity(expected_signatures * 4),
            sig_offsets,
            sig_tokens: Vec::with_capacity(expected_signatures * 16),
        }
    }

    pub fn signature_count(&self) -> usize {
        self.sig_offsets.len() - 1
    }

    /// Tokenizes `pattern` and appends it as the next signature.
    pub fn push_signature(&mut self, pattern: &'s str) -> Result<SignatureId, IndexError> {
        let signature = SignatureId::try_from(self.signature_count())
            .map_err(|_| IndexError::Capacity("signatures"))?;
        let pattern = truncate_to_boundary(pattern, self.options.max_user_agent_length);

        for token in tokenize(pattern).take(MAX_SIGNATURE_TOKENS) {
            let next = TokenId::try_from(self.texts.len())
                .map_err(|_| IndexError::Capacity("tokens"))?;
            let id = *self.interned.entry(token).or_insert(next);
            if id == next {
                self.texts.push(token);
            }
            self.sig_tokens.push(id);
        }

        let end = u32::try_from(self.sig_tokens.len())
            .map_err(|_| IndexError::Capacity("signature tokens"))?;
        self.sig_offsets.push(end);
        Ok(signature)
    }

    /// Sorts the token table, remaps token ids and lays out posting lists.
    pub fn build(self) -> Result<SignatureIndex, IndexError> {
        let token_count = self.texts.len();
        let heap_len: usize = self.texts.iter().map(|t| t.len()).sum();
        if u32::try_from(heap_len).is_err() {
            return Err(IndexError::Capacity("token bytes"));
        }

        let mut order: Vec<TokenId> = (0..token_count as TokenId).collect();
        order.sort_unstable_by(|&a, &b| self.texts[a as usize].cmp(self.texts[b as usize]));

        let mut remap = vec![0 as TokenId; token_count];
        let mut token_heap = String::with_capacity(heap_len);
        let mut token_spans = Vec::with_capacity(token_count);
        for (new_id, &old_id) in order.iter().enumerate() {
            remap[old_id as usize] = new_id as TokenId;
            let text = self.texts[old_id as usize];
            token_spans.push((token_heap.len() as u32, text.len() as u32));
            token_heap.push_str(text);
        }

        let mut sig_tokens = self.sig_tokens;
        for token in sig_tokens.iter_mut() {
            *token = remap[*token as usize];
        }
        let sig_offsets = self.sig_offsets;
        let signature_count = sig_offsets.len() - 1;

        // Counting pass, then placement pass. A signature is listed once per
        // token even when the token repeats, and lists stay in declared order.
        let mut last_seen = vec![u32::MAX; token_count];
        let mut postings_offsets = vec![0u32; token_count + 1];
        for sig in 0..signature_count {
            let span = sig_offsets[sig] as usize..sig_offsets[sig + 1] as usize;
            for &token in &sig_tokens[span] {
                if last_seen[token as usize] != sig as u32 {
                    last_seen[token as usize] = sig as u32;
                    postings_offsets[token as usize + 1] += 1;
                }
            }
        }
        for i in 1..postings_offsets.len() {
            postings_offsets[i] += postings_offsets[i - 1];
        }

        let mut cursor = postings_offsets[..token_count].to_vec();
        let mut postings = vec![0 as SignatureId; postings_offsets[token_count] as usize];
        last_seen.fill(u32::MAX);
        for sig in 0..signature_count {
            let span = sig_offsets[sig] as usize..sig_offsets[sig + 1] as usize;
            for &token in &sig_tokens[span] {
                if last_seen[token as usize] != sig as u32 {
                    last_seen[token as usize] = sig as u32;
                    postings[cursor[token as usize] as usize] = sig as SignatureId;
                    cursor[token as usize] += 1;
                }
            }
        }

        let nearest = match self.options.nearest_min_token_len {
            Some(min_len) => NearestFinder::build(&token_heap, &token_spans, min_len)?,
            None => None,
        };

        debug!(
            signatures = signature_count,
            tokens = token_count,
            postings = postings.len(),
            nearest = nearest.is_some(),
            "Signature index built"
        );

        Ok(SignatureIndex {
            max_user_agent_length: self.options.max_user_agent_length,
            token_heap,
            token_spans,
            postings_offsets,
            postings,
            sig_offsets,
            sig_tokens,
            nearest,
        })
    }
}

/// Substring automaton over tokens of at least `min_token_len` bytes.
struct NearestFinder {
    automaton: AhoCorasick,
    token_ids: Vec<TokenId>,
    min_token_len: usize,
}

impl NearestFinder {
    fn build(
        heap: &str,
        spans: &[(u32, u32)],
        min_token_len: usize,
    ) -> Result<Option<Self>, IndexError> {
        let mut token_ids = Vec::new();
        let mut patterns = Vec::new();
        for (id, &(start, len)) in spans.iter().enumerate() {
            if len as usize >= min_token_len {
                token_ids.push(id as TokenId);
                patterns.push(&heap[start as usize..(start + len) as usize]);
            }
        }
        if patterns.is_empty() {
            return Ok(None);
        }
        let automaton = AhoCorasickBuilder::new()
            .build(patterns)
            .map_err(|e| IndexError::Automaton(e.to_string()))?;
        Ok(Some(Self {
            automaton,
            token_ids,
            min_token_len,
        }))
    }
}

/// Immutable token index over all signatures of a data file.
pub struct SignatureIndex {
    max_user_agent_length: usize,
    token_heap: String,
    token_spans: Vec<(u32, u32)>,
    postings_offsets: Vec<u32>,
    postings: Vec<SignatureId>,
    sig_offsets: Vec<u32>,
    sig_tokens: Vec<TokenId>,
    nearest: Option<NearestFinder>,
}

impl SignatureIndex {
    pub fn signature_count(&self) -> usize {
        self.sig_offsets.len() - 1
    }

    pub fn token_count(&self) -> usize {
        self.token_spans.len()
    }

    pub fn max_user_agent_length(&self) -> usize {
        self.max_user_agent_length
    }

    /// Whether the substring fallback is available.
    pub fn has_nearest(&self) -> bool {
        self.nearest.is_some()
    }

    /// Shortest token held by the substring automaton, if built.
    pub fn nearest_min_token_len(&self) -> Option<usize> {
        self.nearest.as_ref().map(|n| n.min_token_len)
    }

    #[inline]
    pub fn token_text(&self, id: TokenId) -> &str {
        let (start, len) = self.token_spans[id as usize];
        &self.token_heap[start as usize..(start + len) as usize]
    }

    /// Binary search over the sorted token table.
    pub fn lookup(&self, token: &str) -> Option<TokenId> {
        self.token_spans
            .binary_search_by(|&(start, len)| {
                self.token_heap[start as usize..(start + len) as usize].cmp(token)
            })
            .ok()
            .map(|i| i as TokenId)
    }

    /// Signatures containing `token`, in declared order.
    #[inline]
    pub fn postings(&self, token: TokenId) -> &[SignatureId] {
        let start = self.postings_offsets[token as usize] as usize;
        let end = self.postings_offsets[token as usize + 1] as usize;
        &self.postings[start..end]
    }

    /// Token sequence of a signature.
    #[inline]
    pub fn signature_tokens(&self, signature: SignatureId) -> &[TokenId] {
        let start = self.sig_offsets[signature as usize] as usize;
        let end = self.sig_offsets[signature as usize + 1] as usize;
        &self.sig_tokens[start..end]
    }

    /// Ranks signatures sharing tokens with the input.
    ///
    /// Posting lists are merged rarest token first while they fit in
    /// `budget` postings. A list that does not fit is skipped whole, like a
    /// stop word, so common tokens neither make the scan linear in the
    /// signature count nor bias it toward early signatures. Candidates are
    /// ordered by shared token count (descending), then declared order, and
    /// cut to `limit`.
    pub fn candidates<'b>(
        &self,
        tokens: &[TokenId],
        limit: usize,
        budget: usize,
        bump: &'b Bump,
    ) -> BumpVec<'b, Candidate> {
        let mut distinct = BumpVec::from_iter_in(tokens.iter().copied(), bump);
        distinct.sort_unstable();
        distinct.dedup();
        distinct.sort_unstable_by_key(|&t| (self.postings(t).len(), t));

        let mut gathered: BumpVec<'b, SignatureId> = BumpVec::new_in(bump);
        for &token in distinct.iter() {
            let list = self.postings(token);
            // Lists are in ascending length, so nothing after this one fits.
            if list.len() > budget - gathered.len() {
                break;
            }
            gathered.extend_from_slice(list);
        }
        gathered.sort_unstable();

        let mut ranked: BumpVec<'b, Candidate> = BumpVec::new_in(bump);
        let mut i = 0;
        while i < gathered.len() {
            let signature = gathered[i];
            let mut j = i + 1;
            while j < gathered.len() && gathered[j] == signature {
                j += 1;
            }
            ranked.push(Candidate {
                signature,
                shared: (j - i) as u32,
            });
            i = j;
        }
        ranked.sort_unstable_by(|a, b| {
            b.shared
                .cmp(&a.shared)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Distinct indexed tokens occurring anywhere in `haystack`, sorted by id.
    /// Empty when the substring automaton was not built.
    pub fn substring_tokens<'b>(
        &self,
        haystack: &str,
        limit: usize,
        bump: &'b Bump,
    ) -> BumpVec<'b, TokenId> {
        let mut found = BumpVec::new_in(bump);
        let Some(nearest) = &self.nearest else {
            return found;
        };
        if limit == 0 {
            return found;
        }
        // Indexed by automaton pattern, so repeated hits cost no room.
        let mut seen = BumpVec::from_iter_in(
            std::iter::repeat(false).take(nearest.token_ids.len()),
            bump,
        );
        for hit in nearest.automaton.find_overlapping_iter(haystack) {
            let pattern = hit.pattern().as_usize();
            if seen[pattern] {
                continue;
            }
            seen[pattern] = true;
            found.push(nearest.token_ids[pattern]);
            if found.len() >= limit {
                break;
            }
        }
        found.sort_unstable();
        found
    }
}

impl std::fmt::Debug for SignatureIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureIndex")
            .field("signatures", &self.signature_count())
            .field("tokens", &self.token_count())
            .field("postings", &self.postings.len())
            .field("nearest", &self.has_nearest())
            .finish()
    }
}
