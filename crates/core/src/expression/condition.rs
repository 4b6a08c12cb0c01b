//! Typed condition expressions.
//!
//! Conditions are plain data. Engines either evaluate them against the stored
//! item ([`Condition::evaluate`]) or compile them into an expression string
//! (see [`super::compile`]).

use std::cmp::Ordering;

use crate::item::{AttributeValue, Item};
use crate::keys::PARTITION_KEY;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    fn holds(&self, left: &AttributeValue, right: &AttributeValue) -> bool {
        match self {
            Comparator::Eq => left.same_as(right),
            Comparator::Ne => !left.same_as(right),
            Comparator::Lt => left.compare(right) == Some(Ordering::Less),
            Comparator::Le => matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal)),
            Comparator::Gt => left.compare(right) == Some(Ordering::Greater),
            Comparator::Ge => matches!(
                left.compare(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// A predicate over the attributes of the currently stored item.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Compare {
        attribute: String,
        op: Comparator,
        value: AttributeValue,
    },
    BeginsWith {
        attribute: String,
        prefix: String,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// The item exists.
    pub fn item_exists() -> Self {
        Self::exists(PARTITION_KEY)
    }

    /// No item is stored under the key.
    pub fn item_not_exists() -> Self {
        Self::not_exists(PARTITION_KEY)
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeExists(attribute.into())
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeNotExists(attribute.into())
    }

    pub fn compare(attribute: impl Into<String>, op: Comparator, value: impl Into<AttributeValue>) -> Self {
        Condition::Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, Comparator::Eq, value)
    }

    pub fn ne(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, Comparator::Ne, value)
    }

    pub fn lt(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, Comparator::Lt, value)
    }

    pub fn le(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, Comparator::Le, value)
    }

    pub fn gt(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, Comparator::Gt, value)
    }

    pub fn ge(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, Comparator::Ge, value)
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Condition::BeginsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        }
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::And(mut left), Condition::And(right)) => {
                left.extend(right);
                Condition::And(left)
            }
            (Condition::And(mut left), right) => {
                left.push(right);
                Condition::And(left)
            }
            (left, right) => Condition::And(vec![left, right]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::Or(mut left), Condition::Or(right)) => {
                left.extend(right);
                Condition::Or(left)
            }
            (left, right) => Condition::Or(vec![left, right]),
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Evaluates the condition against the stored item (`None` when absent).
    ///
    /// Comparisons against a missing attribute are false, except `<>` which
    /// is true.
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        let lookup = |attribute: &str| item.and_then(|item| item.get(attribute));

        match self {
            Condition::AttributeExists(attribute) => lookup(attribute).is_some(),
            Condition::AttributeNotExists(attribute) => lookup(attribute).is_none(),
            Condition::Compare {
                attribute,
                op,
                value,
            } => match lookup(attribute) {
                Some(current) => op.holds(current, value),
                None => *op == Comparator::Ne,
            },
            Condition::BeginsWith { attribute, prefix } => lookup(attribute)
                .and_then(AttributeValue::as_s)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Condition::And(conditions) => conditions.iter().all(|c| c.evaluate(item)),
            Condition::Or(conditions) => conditions.iter().any(|c| c.evaluate(item)),
            Condition::Not(condition) => !condition.evaluate(item),
        }
    }
}
