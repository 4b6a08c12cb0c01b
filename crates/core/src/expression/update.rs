//! Typed update expressions: SET, SET-if-not-exists, REMOVE and numeric ADD.

use std::collections::HashSet;

use thiserror::Error;

use crate::item::{add_numbers, AttributeValue, Item};
use crate::keys::{IndexKey, IndexSlot, PARTITION_KEY, SORT_KEY};

/// Errors applying an update to an item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("key attribute {0} cannot be updated")]
    KeyAttribute(String),
    #[error("attribute {0} appears in more than one update action")]
    DuplicateAttribute(String),
    #[error("attribute {0} is not a number")]
    NotANumber(String),
    #[error("numeric overflow on attribute {0}")]
    Overflow(String),
    #[error("update has no actions")]
    Empty,
}

/// One update action.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(String, AttributeValue),
    SetIfNotExists(String, AttributeValue),
    Remove(String),
    /// Atomic numeric add. A missing attribute counts as zero.
    Add(String, AttributeValue),
}

impl UpdateAction {
    pub fn attribute(&self) -> &str {
        match self {
            UpdateAction::Set(name, _)
            | UpdateAction::SetIfNotExists(name, _)
            | UpdateAction::Remove(name)
            | UpdateAction::Add(name, _) => name,
        }
    }
}

/// An ordered list of update actions applied as one atomic write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    actions: Vec<UpdateAction>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.actions.push(UpdateAction::Set(attribute.into(), value.into()));
        self
    }

    pub fn set_if_not_exists(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.actions
            .push(UpdateAction::SetIfNotExists(attribute.into(), value.into()));
        self
    }

    pub fn remove(mut self, attribute: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove(attribute.into()));
        self
    }

    pub fn add(mut self, attribute: impl Into<String>, by: i64) -> Self {
        self.actions
            .push(UpdateAction::Add(attribute.into(), AttributeValue::number(by)));
        self
    }

    /// Sets both attributes of an index slot.
    pub fn set_index(self, index: &IndexKey) -> Self {
        self.set(index.slot.partition_key_attr(), index.partition_key.clone())
            .set(index.slot.sort_key_attr(), index.sort_key.clone())
    }

    /// Removes an index slot, dropping the item from that index.
    pub fn remove_index(self, slot: IndexSlot) -> Self {
        self.remove(slot.partition_key_attr())
            .remove(slot.sort_key_attr())
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Checks the update can be sent as a single expression.
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.actions.is_empty() {
            return Err(UpdateError::Empty);
        }
        let mut seen = HashSet::new();
        for action in &self.actions {
            let attribute = action.attribute();
            if attribute == PARTITION_KEY || attribute == SORT_KEY {
                return Err(UpdateError::KeyAttribute(attribute.to_string()));
            }
            if !seen.insert(attribute) {
                return Err(UpdateError::DuplicateAttribute(attribute.to_string()));
            }
            if let UpdateAction::Add(_, value) = action {
                if value.as_n().is_none() {
                    return Err(UpdateError::NotANumber(attribute.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Applies the actions to an item in place.
    pub fn apply(&self, item: &mut Item) -> Result<(), UpdateError> {
        self.validate()?;
        for action in &self.actions {
            match action {
                UpdateAction::Set(name, value) => {
                    item.insert(name.clone(), value.clone());
                }
                UpdateAction::SetIfNotExists(name, value) => {
                    item.entry(name.clone()).or_insert_with(|| value.clone());
                }
                UpdateAction::Remove(name) => {
                    item.remove(name);
                }
                UpdateAction::Add(name, by) => {
                    let by = by.as_n().ok_or_else(|| UpdateError::NotANumber(name.clone()))?;
                    let current = match item.get(name) {
                        None => "0",
                        Some(value) => value
                            .as_n()
                            .ok_or_else(|| UpdateError::NotANumber(name.clone()))?,
                    };
                    let sum = add_numbers(current, by).ok_or_else(|| UpdateError::Overflow(name.clone()))?;
                    item.insert(name.clone(), AttributeValue::N(sum));
                }
            }
        }
        Ok(())
    }
}
