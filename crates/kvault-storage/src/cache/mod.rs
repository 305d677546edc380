//! TTL caching.
//!
//! [`CacheStorage`] wraps any [`Storage`](crate::Storage) and answers repeat
//! reads from memory. The expiring maps it is built on ([`Cache`] and
//! [`NamespaceCache`]) are exported for reuse.

mod expiring;
mod storage;

pub use expiring::{Cache, CacheEntry, NamespaceCache};
pub use storage::{CacheStats, CacheStorage};
