//! ## uaprobe-core::alloc
//! **Per-thread scratch memory for the detect path**
//!
//! ### Key Submodules:
//! - `scratch/`: thread-local `bumpalo` arena reset after every use, the
//!   replacement for a shared pool of per-request worksets
//! - `stats/`: counters describing scratch arena reuse

pub mod scratch;
pub mod stats;

pub use scratch::{with_scratch, ScratchArena};
pub use stats::ScratchStats;
