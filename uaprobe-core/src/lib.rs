//! # uaprobe-core
//!
//! Foundation layer shared by the loader, the matcher and the engine.
//!
//! ### Key Submodules:
//! - `alloc`: per-thread scratch arena using `bumpalo`
//! - `tokenize`: the single tokenization rule used at load and detect time
//! - `value`: typed property values and their declared types

pub mod alloc;
pub mod tokenize;
pub mod value;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::tokenize::*;
    pub use crate::value::*;
}

pub use value::{PropertyType, Value, ValueParseError};
