//! Functional core of the onetable access layer.
//!
//! Pure types and functions only: the flat item model, the key schema, typed
//! expressions, fractional ranks, entity definitions and the storage engine
//! contract. Engines, repositories and the coordinator live in the `onetable`
//! crate.

pub mod entities;
pub mod expression;
pub mod item;
pub mod keys;
pub mod rank;
pub mod storage;
pub mod timestamp;
