//! Kvault Storage - namespaced JSON document storage.
//!
//! Everything in this crate speaks one contract, [`Storage`]: documents are
//! JSON objects addressed by a namespace and a key, both of which must be
//! slugs (see [`slug`]).
//!
//! # Backends
//!
//! - [`MemoryStorage`]: process memory, for tests and ephemeral data
//! - [`FileSystemStorage`]: one file per document (feature **`fs`**)
//! - [`SingleFileStorage`]: one file for everything (feature **`fs`**)
//!
//! # Adapters
//!
//! Adapters wrap `Arc<dyn Storage>` and are themselves [`Storage`], so they
//! stack freely (a cache in front of a fan-out over three backends, say):
//!
//! - [`MultiStorage`]: fan reads and writes out over several stores
//! - [`CacheStorage`]: TTL read-through cache with write invalidation
//! - [`EventStorage`]: pre/post mutation events with veto
//! - [`ValidatorStorage`]: per-namespace document validation
//!
//! [`ScopedStorage`] binds a namespace once and adds typed access.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kvault_storage::{CacheStorage, MemoryStorage, Storage};
//!
//! let store = CacheStorage::new(Arc::new(MemoryStorage::new()), Some(Duration::from_secs(30)));
//! store.set("items", "1", serde_json::json!({"status": 0}).as_object().cloned().unwrap()).await?;
//! let item = store.get("items", "1").await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cache;
pub mod clock;
pub mod error;
pub mod events;
pub mod memory;
pub mod multi;
pub mod scoped;
pub mod slug;
pub mod storage;
pub mod validator;

#[cfg(feature = "fs")]
pub mod fs;
#[cfg(feature = "fs")]
pub mod single_file;

pub use cache::{CacheStats, CacheStorage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StorageError, StorageResult};
pub use events::{
    EventStorage, ListenerId, ListenerVerdict, StorageEvent, StorageEventReceiver,
    StorageEventType, StorageListener,
};
pub use memory::MemoryStorage;
pub use multi::MultiStorage;
pub use scoped::ScopedStorage;
pub use slug::is_valid_slug;
pub use storage::{
    Document, Entry, EntryStream, KeyStream, Storage, StorageExt, ValueStream, merge,
};
pub use validator::{DocumentValidator, ValidatorStorage};

#[cfg(feature = "fs")]
pub use fs::FileSystemStorage;
#[cfg(feature = "fs")]
pub use single_file::SingleFileStorage;
