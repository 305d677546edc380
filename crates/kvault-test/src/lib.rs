//! Kvault Test - shared test utilities for the kvault crates.
//!
//! Mock stores, document fixtures and harness helpers, meant to be pulled in
//! as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! kvault-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvault_storage::{CacheStorage, MemoryStorage, Storage};
//! use kvault_test::{CountingStorage, doc};
//!
//! #[tokio::test]
//! async fn test_cache_hit() {
//!     let backend = CountingStorage::new(Arc::new(MemoryStorage::new()));
//!     let cache = CacheStorage::new(Arc::new(backend.clone()), None);
//!     cache.set("items", "1", doc(serde_json::json!({"v": 1}))).await.unwrap();
//!     cache.get("items", "1").await.unwrap();
//!     assert_eq!(backend.counts().get, 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
