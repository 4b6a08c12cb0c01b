//! Imperative shell of the onetable access layer.
//!
//! Everything that touches a storage engine lives here: the engines
//! themselves, the retry decorator, the [`Table`] handle, one repository per
//! entity type, the cross-entity [`coordinator`] and the paged streams that
//! walk query results. Pure types come from `onetable_core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use onetable::coordinator::Coordinator;
//! use onetable::storage::InMemoryEngine;
//! use onetable::Table;
//!
//! let coordinator = Coordinator::new(Table::new(InMemoryEngine::new()));
//! let flag = coordinator.flag_item(&ItemRef::post("p1"), "u1").await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod ops;
pub mod pagination;
pub mod repositories;
pub mod schema;
pub mod storage;
pub mod table;

pub use config::Config;
pub use table::Table;
