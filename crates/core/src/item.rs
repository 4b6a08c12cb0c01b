//! Flat item model.
//!
//! Every persisted item is a string-keyed map of attribute values mirroring the
//! DynamoDB wire shape. Entities convert to and from items through
//! `serde_json::Value`, so entity structs only need serde derives.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers are kept as decimal strings, like the DynamoDB wire format.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
}

/// A persisted item.
pub type Item = HashMap<String, AttributeValue>;

/// Errors converting between entities and items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("entity did not serialize to a map")]
    NotAMap,
    #[error("attribute {0} holds a number that cannot be represented")]
    InvalidNumber(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl AttributeValue {
    /// Builds a number attribute from an integer.
    pub fn number(value: i64) -> Self {
        AttributeValue::N(value.to_string())
    }

    /// Builds a number attribute from a float.
    pub fn float(value: f64) -> Self {
        AttributeValue::N(value.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Compares two scalar values the way the store orders them.
    ///
    /// Strings compare by bytes, numbers numerically. Values of different
    /// types (or non-scalar values) are not comparable.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (AttributeValue::N(a), AttributeValue::N(b)) => compare_numbers(a, b),
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) if a == b => Some(Ordering::Equal),
            (AttributeValue::Null(_), AttributeValue::Null(_)) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Equality with numeric normalization (`"2"` equals `"2.0"`).
    pub fn same_as(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::N(_), AttributeValue::N(_)) => {
                self.compare(other) == Some(Ordering::Equal)
            }
            _ => self == other,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    if let (Ok(a), Ok(b)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return Some(a.cmp(&b));
    }
    let a: f64 = a.parse().ok()?;
    let b: f64 = b.parse().ok()?;
    a.partial_cmp(&b)
}

/// Adds two decimal number strings.
///
/// Integer addition is exact; anything else falls back to `f64`.
pub fn add_numbers(a: &str, b: &str) -> Option<String> {
    if let (Ok(a), Ok(b)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return a.checked_add(b).map(|sum| sum.to_string());
    }
    let a: f64 = a.parse().ok()?;
    let b: f64 = b.parse().ok()?;
    let sum = a + b;
    sum.is_finite().then(|| sum.to_string())
}

/// Serializes an entity into an item.
///
/// Top-level `null` fields are dropped so an unset optional field is absent
/// from the item rather than stored as `NULL`.
pub fn to_item<T: Serialize>(value: &T) -> Result<Item, ItemError> {
    let value = serde_json::to_value(value).map_err(|e| ItemError::Serialization(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ItemError::NotAMap);
    };

    Ok(map
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, json_to_attribute(v)))
        .collect())
}

/// Deserializes an entity from an item. Unknown attributes are ignored.
pub fn from_item<T: DeserializeOwned>(item: &Item) -> Result<T, ItemError> {
    let mut map = Map::with_capacity(item.len());
    for (name, value) in item {
        map.insert(name.clone(), attribute_to_json(name, value)?);
    }
    serde_json::from_value(Value::Object(map)).map_err(|e| ItemError::Serialization(e.to_string()))
}

fn json_to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.into_iter()
                .map(|(k, v)| (k, json_to_attribute(v)))
                .collect(),
        ),
    }
}

fn attribute_to_json(name: &str, value: &AttributeValue) -> Result<Value, ItemError> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(parse_number(n).ok_or_else(|| ItemError::InvalidNumber(name.to_string()))?),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(|v| attribute_to_json(name, v))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), attribute_to_json(name, v)?);
            }
            Value::Object(out)
        }
    })
}

fn parse_number(n: &str) -> Option<Number> {
    if let Ok(i) = n.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Some(Number::from(u));
    }
    n.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Reduces an item to the given attribute names.
pub fn project(item: &Item, attributes: &[String]) -> Item {
    attributes
        .iter()
        .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        sample_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        like_count: Option<i64>,
        note: Option<String>,
        score: f64,
    }

    #[test]
    fn test_to_item_drops_null_fields() {
        let sample = Sample {
            sample_id: "s1".to_string(),
            like_count: None,
            note: None,
            score: 1.5,
        };

        let item = to_item(&sample).unwrap();

        assert_eq!(item.get("sampleId"), Some(&AttributeValue::from("s1")));
        assert!(!item.contains_key("likeCount"));
        assert!(!item.contains_key("note"));
        assert_eq!(item.get("score"), Some(&AttributeValue::N("1.5".to_string())));
    }

    #[test]
    fn test_from_item_ignores_unknown_attributes() {
        let mut item = Item::new();
        item.insert("partitionKey".to_string(), AttributeValue::from("sample/s1"));
        item.insert("sampleId".to_string(), AttributeValue::from("s1"));
        item.insert("likeCount".to_string(), AttributeValue::number(3));
        item.insert("score".to_string(), AttributeValue::N("2".to_string()));

        let sample: Sample = from_item(&item).unwrap();

        assert_eq!(sample.like_count, Some(3));
        assert_eq!(sample.score, 2.0);
        assert_eq!(sample.note, None);
    }

    #[test]
    fn test_from_item_rejects_garbage_numbers() {
        let mut item = Item::new();
        item.insert("sampleId".to_string(), AttributeValue::from("s1"));
        item.insert("score".to_string(), AttributeValue::N("not-a-number".to_string()));

        let result: Result<Sample, _> = from_item(&item);
        assert_eq!(result, Err(ItemError::InvalidNumber("score".to_string())));
    }

    #[test]
    fn test_compare_numbers_numerically() {
        let nine = AttributeValue::number(9);
        let ten = AttributeValue::number(10);
        assert_eq!(nine.compare(&ten), Some(Ordering::Less));
        assert_eq!(
            AttributeValue::from("9").compare(&AttributeValue::from("10")),
            Some(Ordering::Greater)
        );
        assert_eq!(nine.compare(&AttributeValue::from("9")), None);
    }

    #[test]
    fn test_same_as_normalizes_numbers() {
        assert!(AttributeValue::N("2".to_string()).same_as(&AttributeValue::N("2.0".to_string())));
        assert!(!AttributeValue::N("2".to_string()).same_as(&AttributeValue::from("2")));
    }

    #[test]
    fn test_add_numbers() {
        assert_eq!(add_numbers("2", "-3"), Some("-1".to_string()));
        assert_eq!(add_numbers("1.5", "1"), Some("2.5".to_string()));
        assert_eq!(add_numbers(&i64::MAX.to_string(), "1"), None);
        assert_eq!(add_numbers("x", "1"), None);
    }

    #[test]
    fn test_project_keeps_requested_attributes() {
        let mut item = Item::new();
        item.insert("a".to_string(), AttributeValue::from("1"));
        item.insert("b".to_string(), AttributeValue::from("2"));

        let projected = project(&item, &["a".to_string(), "missing".to_string()]);

        assert_eq!(projected.len(), 1);
        assert!(projected.contains_key("a"));
    }
}
