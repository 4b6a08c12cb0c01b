//! In-memory storage engine.
//!
//! Implements [`onetable_core::storage::StorageEngine`] over a `BTreeMap`
//! wrapped in `Arc<RwLock<_>>`, with full condition, update, transaction and
//! index query semantics. Used by the tests and by `onetable smoke`.
//!
//! # Example
//!
//! ```rust,ignore
//! use onetable::storage::inmemory::InMemoryEngine;
//!
//! let engine = InMemoryEngine::new().with_page_size(10);
//! ```

mod engine;

pub use engine::InMemoryEngine;
