//! Conversions between the core item model and the SDK's `AttributeValue`.
//!
//! Pure functions, testable without DynamoDB access.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue as SdkValue;
use onetable_core::expression::ExpressionAttributes;
use onetable_core::item::{AttributeValue, Item};
use onetable_core::keys::Key;
use onetable_core::storage::{StorageError, StorageResult};

pub type SdkItem = HashMap<String, SdkValue>;

/// Convert a core attribute value to the SDK representation.
pub fn to_sdk_value(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::Bool(b) => SdkValue::Bool(*b),
        AttributeValue::Null(b) => SdkValue::Null(*b),
        AttributeValue::L(list) => SdkValue::L(list.iter().map(to_sdk_value).collect()),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
    }
}

/// Convert an SDK attribute value to the core representation.
///
/// Binary and set types are never written by this crate and are rejected.
pub fn from_sdk_value(value: &SdkValue) -> StorageResult<AttributeValue> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s.clone()),
        SdkValue::N(n) => AttributeValue::N(n.clone()),
        SdkValue::Bool(b) => AttributeValue::Bool(*b),
        SdkValue::Null(b) => AttributeValue::Null(*b),
        SdkValue::L(list) => AttributeValue::L(
            list.iter()
                .map(from_sdk_value)
                .collect::<StorageResult<Vec<_>>>()?,
        ),
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        other => {
            return Err(StorageError::InvalidData(format!(
                "unsupported attribute type: {other:?}"
            )))
        }
    })
}

pub fn to_sdk_item(item: &Item) -> SdkItem {
    item.iter()
        .map(|(name, value)| (name.clone(), to_sdk_value(value)))
        .collect()
}

pub fn from_sdk_item(item: &SdkItem) -> StorageResult<Item> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_sdk_value(value)?)))
        .collect()
}

/// The primary key attributes of `key`.
pub fn key_to_sdk(key: &Key) -> SdkItem {
    to_sdk_item(&key.to_item())
}

/// Placeholder names for a request, `None` when no name was used.
pub fn sdk_names(attrs: &ExpressionAttributes) -> Option<HashMap<String, String>> {
    non_empty(attrs.names())
        .map(|names| names.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Placeholder values for a request, `None` when no value was used.
pub fn sdk_values(attrs: &ExpressionAttributes) -> Option<SdkItem> {
    non_empty(attrs.values()).map(|values| {
        values
            .iter()
            .map(|(k, v)| (k.clone(), to_sdk_value(v)))
            .collect()
    })
}

fn non_empty<V>(map: &BTreeMap<String, V>) -> Option<&BTreeMap<String, V>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_values_convert_both_ways() {
        let mut inner = Item::new();
        inner.insert("count".to_string(), AttributeValue::number(3));
        let value = AttributeValue::L(vec![
            AttributeValue::S("a".to_string()),
            AttributeValue::Bool(true),
            AttributeValue::M(inner),
        ]);

        let sdk = to_sdk_value(&value);
        assert_eq!(from_sdk_value(&sdk).unwrap(), value);
    }

    #[test]
    fn test_string_sets_are_rejected() {
        let result = from_sdk_value(&SdkValue::Ss(vec!["a".to_string()]));
        assert!(matches!(result, Err(StorageError::InvalidData(_))));
    }

    #[test]
    fn test_key_to_sdk() {
        let sdk = key_to_sdk(&Key::new("post/p1", "-"));
        assert_eq!(sdk.len(), 2);
        assert_eq!(sdk.get("partitionKey"), Some(&SdkValue::S("post/p1".to_string())));
        assert_eq!(sdk.get("sortKey"), Some(&SdkValue::S("-".to_string())));
    }

    #[test]
    fn test_empty_placeholders_are_omitted() {
        let attrs = ExpressionAttributes::new();
        assert!(sdk_names(&attrs).is_none());
        assert!(sdk_values(&attrs).is_none());
    }
}
