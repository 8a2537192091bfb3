//! # uaprobe Data File
//!
//! Loader for compiled signature data files, plus the encoder used to produce
//! fixtures in the same format.
//!
//! ### Layout (little-endian):
//! ```text
//! header   magic "UAPD" | major u16 | minor u16 | flags u32 | published u64
//!          | max_user_agent_length u32 | default_profile u32
//! strings  count u32 | count x (offset u32, len u32) | heap_len u32 | heap
//! name     string u32
//! props    count u32 | count x (name u32, type u8, description u32)
//! profiles count u32 | count x (id u32, n u16, n x (property u32, value u32))
//! sigs     count u32 | count x (profile u32, rank u32, pattern u32)
//! trailer  blake3 of everything before it
//! ```

mod dataset;
mod error;
pub mod format;
mod reader;
mod strings;
mod writer;

pub use dataset::{DataFile, LoadOptions, Profile, Property, Signature};
pub use error::DataFileError;
pub use format::Header;
pub use strings::{StringId, StringTable};
pub use writer::{DataFileBuilder, ProfileHandle, PropertyHandle};
