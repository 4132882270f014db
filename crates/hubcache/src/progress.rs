use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Key under which the engine publishes instantaneous bytes/second.
pub const THROUGHPUT_KEY: &str = "throughput";

/// Shared download progress observer.
///
/// Cloning is cheap and every clone observes the same state, so a caller can
/// hand one end to the engine and poll the other. `completed` only moves
/// forward.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    total: AtomicU64,
    completed: AtomicU64,
    user_info: Mutex<HashMap<String, f64>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::Relaxed)
    }

    pub fn set_total(&self, total: u64) {
        self.inner.total.store(total, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Monotonic: a value below the current one is ignored.
    pub fn set_completed(&self, completed: u64) {
        self.inner.completed.fetch_max(completed, Ordering::Relaxed);
    }

    pub fn add_completed(&self, delta: u64) {
        self.inner.completed.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.completed() as f64 / total as f64
    }

    pub fn is_finished(&self) -> bool {
        let total = self.total();
        total > 0 && self.completed() >= total
    }

    pub fn set_user_info(&self, key: &str, value: f64) {
        self.inner
            .user_info
            .lock()
            .expect("progress user_info lock poisoned")
            .insert(key.to_string(), value);
    }

    pub fn user_info(&self, key: &str) -> Option<f64> {
        self.inner
            .user_info
            .lock()
            .expect("progress user_info lock poisoned")
            .get(key)
            .copied()
    }

    pub fn set_throughput(&self, bytes_per_second: f64) {
        self.set_user_info(THROUGHPUT_KEY, bytes_per_second);
    }

    pub fn throughput(&self) -> Option<f64> {
        self.user_info(THROUGHPUT_KEY)
    }
}
