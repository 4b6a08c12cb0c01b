//! Typed condition, update and key-condition expressions.

pub mod compile;
mod condition;
mod key_condition;
mod update;

pub use compile::{
    compile_condition, compile_key_condition, compile_projection, compile_update,
    ExpressionAttributes,
};
pub use condition::{Comparator, Condition};
pub use key_condition::{KeyCondition, SortKeyCondition};
pub use update::{Update, UpdateAction, UpdateError};
