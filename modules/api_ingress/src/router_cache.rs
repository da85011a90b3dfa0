//! Lock-free holder for the assembled router.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Read-mostly slot: the router is built once at startup and read per connection.
pub struct RouterCache<T> {
    inner: ArcSwap<T>,
}

impl<T> RouterCache<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_replaces_and_old_handles_survive() {
        let cache = RouterCache::new(vec![1]);
        let before = cache.load();
        cache.store(vec![1, 2]);
        assert_eq!(*before, vec![1]);
        assert_eq!(*cache.load(), vec![1, 2]);
    }

    #[test]
    fn concurrent_readers_see_a_whole_value() {
        let cache = Arc::new(RouterCache::new(String::from("a")));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let v = cache.load();
                        assert!(v.as_str() == "a" || v.as_str() == "b");
                    }
                })
            })
            .collect();
        cache.store(String::from("b"));
        for r in readers {
            r.join().unwrap();
        }
    }
}
