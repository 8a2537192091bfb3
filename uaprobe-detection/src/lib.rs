//! # uaprobe Detection
//!
//! Signature index and matcher. The index is built once by the data file
//! loader and is read-only afterwards; the matcher resolves a User-Agent to
//! the closest signature using only shared references to it.

pub mod index;
pub mod matcher;

pub use index::{IndexBuilder, IndexError, IndexOptions, SignatureId, SignatureIndex, TokenId};
pub use matcher::{MatchOutcome, Matcher, MatcherSettings, Method};
