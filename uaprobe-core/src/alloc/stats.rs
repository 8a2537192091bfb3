//! ## uaprobe-core::alloc::stats
//! **Scratch arena usage tracking**

use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide scratch arena statistics.
///
/// Atomic counters only; they never influence detection.
pub struct ScratchStats {
    reuses: AtomicUsize,
    fallbacks: AtomicUsize,
}

static GLOBAL: ScratchStats = ScratchStats::new();

impl ScratchStats {
    pub const fn new() -> Self {
        ScratchStats {
            reuses: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
        }
    }

    pub fn global() -> &'static ScratchStats {
        &GLOBAL
    }

    #[inline]
    pub fn record_reuse(&self) {
        self.reuses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Calls served by a thread's resident arena.
    pub fn reuses(&self) -> usize {
        self.reuses.load(Ordering::Relaxed)
    }

    /// Nested calls that needed a temporary arena.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

impl Default for ScratchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_increment_and_read() {
        let stats = ScratchStats::new();
        assert_eq!(stats.reuses(), 0);

        for _ in 0..100 {
            stats.record_reuse();
        }
        stats.record_fallback();

        assert_eq!(stats.reuses(), 100);
        assert_eq!(stats.fallbacks(), 1);
    }
}
