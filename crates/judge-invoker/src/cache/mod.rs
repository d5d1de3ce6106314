//! Invoker resource cache.
//!
//! [`LruSizeCache`] is the generic engine: a size-bounded, thread-safe LRU
//! cache that loads values on demand through a [`CacheLoader`] and runs at
//! most one load per key. [`CacheKey`] identifies a storage artifact as of a
//! given epoch, and [`CacheEntry`] is what the invoker keeps for it on disk.

mod key;
mod lru;

pub use key::{CacheEntry, CacheKey};
pub use lru::{CacheLoader, CacheStats, Loaded, LruSizeCache};
