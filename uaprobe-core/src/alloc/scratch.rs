//! ## uaprobe-core::alloc::scratch
//! **Arena allocators using `bumpalo`**
//!
//! Every detection needs a handful of short-lived buffers (query tokens,
//! candidate tallies, edit-distance rows). They are carved from a bump arena
//! owned by the calling thread and released in one reset when the call ends,
//! so concurrent detections never contend on an allocator or a pool lock.

use std::cell::RefCell;

use bumpalo::Bump;

use super::stats::ScratchStats;

/// Arenas grown beyond this are dropped instead of reset so one adversarial
/// input cannot pin a large allocation to a thread for good.
const MAX_RETAINED_BYTES: usize = 1 << 20;

/// An arena allocator based on `bumpalo::Bump`.
pub struct ScratchArena {
    bump: Bump,
}

impl ScratchArena {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        ScratchArena { bump: Bump::new() }
    }

    /// Creates an arena with `bytes` preallocated.
    pub fn with_capacity(bytes: usize) -> Self {
        ScratchArena {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// The underlying bump allocator.
    #[inline]
    pub fn bump(&self) -> &Bump {
        &self.bump
    }

    /// Bytes currently held by the arena's chunks.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Deallocates everything allocated in the arena at once.
    pub fn reset(&mut self) {
        if self.bump.allocated_bytes() > MAX_RETAINED_BYTES {
            self.bump = Bump::new();
        } else {
            self.bump.reset();
        }
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static SCRATCH: RefCell<ScratchArena> = RefCell::new(ScratchArena::with_capacity(16 * 1024));
}

/// Runs `f` with this thread's scratch arena and resets the arena afterwards.
///
/// Nested calls on the same thread get a private temporary arena.
pub fn with_scratch<R>(f: impl FnOnce(&Bump) -> R) -> R {
    SCRATCH.with(|cell| match cell.try_borrow_mut() {
        Ok(mut arena) => {
            ScratchStats::global().record_reuse();
            let out = f(arena.bump());
            arena.reset();
            out
        }
        Err(_) => {
            ScratchStats::global().record_fallback();
            let arena = ScratchArena::new();
            f(arena.bump())
        }
    })
}
