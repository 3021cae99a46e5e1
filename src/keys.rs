//! Rotating pool of provider API keys.
//!
//! Shared by every job that talks to the same provider. Rotation is a single
//! atomic update so concurrent callers never observe a torn index.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug)]
pub struct KeyPool {
    name: &'static str,
    keys: Vec<String>,
    index: AtomicUsize,
}

impl KeyPool {
    /// Blank keys are dropped; an empty pool means the provider is unconfigured.
    pub fn new(name: &'static str, keys: impl IntoIterator<Item = String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            name,
            keys,
            index: AtomicUsize::new(0),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// The key currently in use, or `None` for an empty pool.
    pub fn current(&self) -> Option<&str> {
        self.keys
            .get(self.current_index())
            .map(String::as_str)
    }

    /// Advance to the next key, wrapping around. No-op on an empty pool.
    pub fn rotate(&self) {
        let len = self.keys.len();
        if len == 0 {
            return;
        }
        let previous = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        info!(
            pool = self.name,
            key_index = (previous + 1) % len,
            "Rotated API key"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pool(keys: &[&str]) -> KeyPool {
        KeyPool::new("test", keys.iter().map(|k| k.to_string()))
    }

    #[test]
    fn rotation_wraps_around() {
        let keys = pool(&["a", "b", "c"]);
        assert_eq!(keys.current(), Some("a"));
        keys.rotate();
        assert_eq!(keys.current(), Some("b"));
        keys.rotate();
        keys.rotate();
        assert_eq!(keys.current(), Some("a"));
    }

    #[test]
    fn empty_pool_is_unconfigured_and_never_panics() {
        let keys = pool(&["", "  "]);
        assert!(!keys.is_configured());
        assert_eq!(keys.current(), None);
        keys.rotate();
        assert_eq!(keys.current(), None);
    }

    #[test]
    fn concurrent_rotation_keeps_index_in_range() {
        let keys = Arc::new(pool(&["a", "b", "c"]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let keys = Arc::clone(&keys);
                std::thread::spawn(move || {
                    for _ in 0..300 {
                        keys.rotate();
                        assert!(keys.current().is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 2400 rotations is a multiple of 3
        assert_eq!(keys.current(), Some("a"));
    }
}
