//! Key conditions for table and index queries.

use std::cmp::Ordering;

use crate::item::AttributeValue;

/// Condition on the sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKeyCondition {
    Eq(AttributeValue),
    Lt(AttributeValue),
    Le(AttributeValue),
    Gt(AttributeValue),
    Ge(AttributeValue),
    /// Inclusive on both ends.
    Between(AttributeValue, AttributeValue),
    BeginsWith(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort_key: &AttributeValue) -> bool {
        let cmp = |bound: &AttributeValue| sort_key.compare(bound);
        match self {
            SortKeyCondition::Eq(v) => cmp(v) == Some(Ordering::Equal),
            SortKeyCondition::Lt(v) => cmp(v) == Some(Ordering::Less),
            SortKeyCondition::Le(v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
            SortKeyCondition::Gt(v) => cmp(v) == Some(Ordering::Greater),
            SortKeyCondition::Ge(v) => matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal)),
            SortKeyCondition::Between(low, high) => {
                matches!(cmp(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(cmp(high), Some(Ordering::Less | Ordering::Equal))
            }
            SortKeyCondition::BeginsWith(prefix) => sort_key
                .as_s()
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        }
    }
}

/// Partition equality plus an optional sort key condition.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub partition_key: String,
    pub sort_key: Option<SortKeyCondition>,
}

impl KeyCondition {
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    pub fn sort_key(mut self, condition: SortKeyCondition) -> Self {
        self.sort_key = Some(condition);
        self
    }

    pub fn begins_with(self, prefix: impl Into<String>) -> Self {
        self.sort_key(SortKeyCondition::BeginsWith(prefix.into()))
    }

    pub fn between(self, low: impl Into<AttributeValue>, high: impl Into<AttributeValue>) -> Self {
        self.sort_key(SortKeyCondition::Between(low.into(), high.into()))
    }

    pub fn gt(self, value: impl Into<AttributeValue>) -> Self {
        self.sort_key(SortKeyCondition::Gt(value.into()))
    }

    pub fn ge(self, value: impl Into<AttributeValue>) -> Self {
        self.sort_key(SortKeyCondition::Ge(value.into()))
    }

    pub fn lt(self, value: impl Into<AttributeValue>) -> Self {
        self.sort_key(SortKeyCondition::Lt(value.into()))
    }

    pub fn le(self, value: impl Into<AttributeValue>) -> Self {
        self.sort_key(SortKeyCondition::Le(value.into()))
    }

    /// Whether an item with these key values is selected.
    pub fn matches(&self, partition_key: &str, sort_key: Option<&AttributeValue>) -> bool {
        if partition_key != self.partition_key {
            return false;
        }
        match (&self.sort_key, sort_key) {
            (None, _) => true,
            (Some(condition), Some(value)) => condition.matches(value),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_only() {
        let condition = KeyCondition::partition("chat/c1");
        assert!(condition.matches("chat/c1", Some(&AttributeValue::from("member/u1"))));
        assert!(!condition.matches("chat/c2", Some(&AttributeValue::from("member/u1"))));
    }

    #[test]
    fn test_begins_with() {
        let condition = KeyCondition::partition("chat/c1").begins_with("member/");
        assert!(condition.matches("chat/c1", Some(&AttributeValue::from("member/u1"))));
        assert!(!condition.matches("chat/c1", Some(&AttributeValue::from("-"))));
        assert!(!condition.matches("chat/c1", None));
    }

    #[test]
    fn test_between_is_inclusive() {
        let condition = KeyCondition::partition("post/trending").between(
            AttributeValue::number(10),
            AttributeValue::number(20),
        );
        assert!(condition.matches("post/trending", Some(&AttributeValue::number(10))));
        assert!(condition.matches("post/trending", Some(&AttributeValue::number(20))));
        assert!(!condition.matches("post/trending", Some(&AttributeValue::number(21))));
    }

    #[test]
    fn test_numeric_range() {
        let condition = KeyCondition::partition("post/trending").ge(AttributeValue::float(1.5));
        assert!(condition.matches("post/trending", Some(&AttributeValue::number(2))));
        assert!(!condition.matches("post/trending", Some(&AttributeValue::number(1))));
    }
}
