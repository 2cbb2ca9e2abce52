//! Filter-keyed cache of built lexical indexes.
//!
//! The lock is held across a rebuild, so concurrent misses on the same key
//! build once and everyone else waits for the result.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use signaldb_core::error::Result;

use crate::builder::CachedLexicalIndex;

struct Slot<V> {
	value: Arc<V>,
	inserted: Instant,
}

pub struct LexicalCache<V = CachedLexicalIndex> {
	entries: Mutex<LruCache<String, Slot<V>>>,
	ttl: Option<Duration>,
	builds: AtomicUsize,
}

impl<V> LexicalCache<V> {
	/// `capacity` of 1 keeps only the most recent filter.
	pub fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
		Self { entries: Mutex::new(LruCache::new(capacity)), ttl, builds: AtomicUsize::new(0) }
	}

	pub fn single_slot() -> Self { Self::new(NonZeroUsize::MIN, None) }

	fn lock(&self) -> MutexGuard<'_, LruCache<String, Slot<V>>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Cached value for `key`, or the result of `build` stored under it.
	/// Failed builds are not cached.
	pub fn get_or_try_insert_with<F>(&self, key: &str, build: F) -> Result<Arc<V>>
	where
		F: FnOnce() -> Result<V>,
	{
		let mut entries = self.lock();
		if let Some(slot) = entries.get(key) {
			let fresh = self.ttl.map_or(true, |ttl| slot.inserted.elapsed() < ttl);
			if fresh {
				debug!(key, "lexical cache hit");
				return Ok(Arc::clone(&slot.value));
			}
			debug!(key, "lexical cache entry expired");
			entries.pop(key);
		}
		let value = Arc::new(build()?);
		self.builds.fetch_add(1, Ordering::Relaxed);
		entries.put(key.to_string(), Slot { value: Arc::clone(&value), inserted: Instant::now() });
		Ok(value)
	}

	/// Drop every cached index; the next request rebuilds.
	pub fn invalidate(&self) {
		self.lock().clear();
	}

	/// Number of successful builds since creation.
	pub fn builds(&self) -> usize { self.builds.load(Ordering::Relaxed) }

	pub fn len(&self) -> usize { self.lock().len() }

	pub fn is_empty(&self) -> bool { self.lock().is_empty() }

	pub fn contains(&self, key: &str) -> bool { self.lock().contains(key) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use signaldb_core::Error;

	#[test]
	fn single_slot_evicts_previous_key() {
		let cache: LexicalCache<u32> = LexicalCache::single_slot();
		assert_eq!(*cache.get_or_try_insert_with("a", || Ok(1)).expect("a"), 1);
		assert_eq!(*cache.get_or_try_insert_with("a", || Ok(2)).expect("a again"), 1);
		assert_eq!(*cache.get_or_try_insert_with("b", || Ok(3)).expect("b"), 3);
		assert!(!cache.contains("a"));
		assert_eq!(cache.builds(), 2);
	}

	#[test]
	fn concurrent_misses_on_one_key_build_once() {
		let cache: LexicalCache<u32> = LexicalCache::single_slot();
		let attempts = AtomicUsize::new(0);
		let values: Vec<Arc<u32>> = std::thread::scope(|s| {
			let handles: Vec<_> = (0..8)
				.map(|_| {
					s.spawn(|| {
						cache
							.get_or_try_insert_with("sentiment=\"bullish\"", || {
								attempts.fetch_add(1, Ordering::SeqCst);
								std::thread::sleep(Duration::from_millis(20));
								Ok(7)
							})
							.expect("build")
					})
				})
				.collect();
			handles.into_iter().map(|h| h.join().expect("thread")).collect()
		});
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
		assert_eq!(cache.builds(), 1);
		assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
	}

	#[test]
	fn failed_builds_are_not_cached() {
		let cache: LexicalCache<u32> = LexicalCache::single_slot();
		let err = cache.get_or_try_insert_with("a", || Err(Error::IndexUnavailable("empty".into())));
		assert!(err.is_err());
		assert!(cache.is_empty());
		assert_eq!(cache.builds(), 0);
	}

	#[test]
	fn ttl_expiry_and_invalidate_force_rebuild() {
		let cache: LexicalCache<u32> = LexicalCache::new(NonZeroUsize::MIN, Some(Duration::from_millis(1)));
		cache.get_or_try_insert_with("a", || Ok(1)).expect("a");
		std::thread::sleep(Duration::from_millis(5));
		assert_eq!(*cache.get_or_try_insert_with("a", || Ok(2)).expect("a"), 2);

		let plain: LexicalCache<u32> = LexicalCache::single_slot();
		plain.get_or_try_insert_with("a", || Ok(1)).expect("a");
		plain.invalidate();
		assert_eq!(*plain.get_or_try_insert_with("a", || Ok(5)).expect("a"), 5);
		assert_eq!(plain.builds(), 2);
	}
}
