// pinyin-staged/src/cancel.rs
//
// Cooperative cancellation by generation counter: every new query takes the
// next generation, and a token is stale as soon as the shared counter has
// moved past it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handed to one query; checked at stage boundaries and before sub-tasks.
#[derive(Debug, Clone)]
pub struct CancelToken {
    latest: Arc<AtomicU64>,
    generation: u64,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A standalone token, live until `cancel` is called.
    pub fn new() -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            generation: 0,
        }
    }

    /// Cancel this token. Newer tokens from the same source are unaffected.
    pub fn cancel(&self) {
        let _ = self.latest.compare_exchange(
            self.generation,
            self.generation + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Issues tokens where each new one supersedes all earlier ones.
#[derive(Debug, Default)]
pub struct CancelSource {
    latest: Arc<AtomicU64>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> CancelToken {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        CancelToken {
            latest: Arc::clone(&self.latest),
            generation,
        }
    }

    /// Cancel whatever is in flight without issuing a new token.
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}
