//! Pure compiler from typed expressions to placeholder-based expression
//! strings (`#n0 = :v0`).
//!
//! Attribute names always go through `#n` placeholders and values through
//! `:v` placeholders, so no caller-provided text ends up in the expression.

use std::collections::{BTreeMap, HashMap};

use super::{Condition, KeyCondition, SortKeyCondition, Update, UpdateAction};
use crate::item::AttributeValue;

/// Placeholder maps shared by all expressions of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionAttributes {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, AttributeValue>,
    name_lookup: HashMap<String, String>,
}

impl ExpressionAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for an attribute name. Repeated names share a placeholder.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.name_lookup.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        self.name_lookup.insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    /// Placeholder for a value.
    pub fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    pub fn values(&self) -> &BTreeMap<String, AttributeValue> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }
}

/// Compiles a condition expression.
pub fn compile_condition(condition: &Condition, attrs: &mut ExpressionAttributes) -> String {
    match condition {
        Condition::AttributeExists(attribute) => {
            format!("attribute_exists({})", attrs.name(attribute))
        }
        Condition::AttributeNotExists(attribute) => {
            format!("attribute_not_exists({})", attrs.name(attribute))
        }
        Condition::Compare {
            attribute,
            op,
            value,
        } => {
            let name = attrs.name(attribute);
            format!("{name} {} {}", op.as_str(), attrs.value(value))
        }
        Condition::BeginsWith { attribute, prefix } => {
            let name = attrs.name(attribute);
            let value = attrs.value(&AttributeValue::S(prefix.clone()));
            format!("begins_with({name}, {value})")
        }
        Condition::And(conditions) => join_conditions(conditions, " AND ", attrs),
        Condition::Or(conditions) => join_conditions(conditions, " OR ", attrs),
        Condition::Not(condition) => format!("NOT ({})", compile_condition(condition, attrs)),
    }
}

fn join_conditions(conditions: &[Condition], separator: &str, attrs: &mut ExpressionAttributes) -> String {
    conditions
        .iter()
        .map(|c| format!("({})", compile_condition(c, attrs)))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Compiles an update expression, grouping actions by clause.
pub fn compile_update(update: &Update, attrs: &mut ExpressionAttributes) -> String {
    let mut set = Vec::new();
    let mut remove = Vec::new();
    let mut add = Vec::new();

    for action in update.actions() {
        match action {
            UpdateAction::Set(attribute, value) => {
                let name = attrs.name(attribute);
                set.push(format!("{name} = {}", attrs.value(value)));
            }
            UpdateAction::SetIfNotExists(attribute, value) => {
                let name = attrs.name(attribute);
                set.push(format!("{name} = if_not_exists({name}, {})", attrs.value(value)));
            }
            UpdateAction::Remove(attribute) => remove.push(attrs.name(attribute)),
            UpdateAction::Add(attribute, value) => {
                let name = attrs.name(attribute);
                add.push(format!("{name} {}", attrs.value(value)));
            }
        }
    }

    let mut clauses = Vec::new();
    if !set.is_empty() {
        clauses.push(format!("SET {}", set.join(", ")));
    }
    if !remove.is_empty() {
        clauses.push(format!("REMOVE {}", remove.join(", ")));
    }
    if !add.is_empty() {
        clauses.push(format!("ADD {}", add.join(", ")));
    }
    clauses.join(" ")
}

/// Compiles a key condition expression over the given key attribute names.
pub fn compile_key_condition(
    condition: &KeyCondition,
    partition_key_attr: &str,
    sort_key_attr: &str,
    attrs: &mut ExpressionAttributes,
) -> String {
    let pk_name = attrs.name(partition_key_attr);
    let pk_value = attrs.value(&AttributeValue::S(condition.partition_key.clone()));
    let mut expression = format!("{pk_name} = {pk_value}");

    if let Some(sort_key) = &condition.sort_key {
        let sk = attrs.name(sort_key_attr);
        let clause = match sort_key {
            SortKeyCondition::Eq(v) => format!("{sk} = {}", attrs.value(v)),
            SortKeyCondition::Lt(v) => format!("{sk} < {}", attrs.value(v)),
            SortKeyCondition::Le(v) => format!("{sk} <= {}", attrs.value(v)),
            SortKeyCondition::Gt(v) => format!("{sk} > {}", attrs.value(v)),
            SortKeyCondition::Ge(v) => format!("{sk} >= {}", attrs.value(v)),
            SortKeyCondition::Between(low, high) => {
                let low = attrs.value(low);
                let high = attrs.value(high);
                format!("{sk} BETWEEN {low} AND {high}")
            }
            SortKeyCondition::BeginsWith(prefix) => {
                format!(
                    "begins_with({sk}, {})",
                    attrs.value(&AttributeValue::S(prefix.clone()))
                )
            }
        };
        expression.push_str(" AND ");
        expression.push_str(&clause);
    }

    expression
}

/// Compiles a projection expression.
pub fn compile_projection(attributes: &[String], attrs: &mut ExpressionAttributes) -> String {
    attributes
        .iter()
        .map(|attribute| attrs.name(attribute))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_condition_uses_placeholders() {
        let mut attrs = ExpressionAttributes::new();
        let condition = Condition::item_exists().and(Condition::ge("likeCount", 1));

        let expression = compile_condition(&condition, &mut attrs);

        assert_eq!(expression, "(attribute_exists(#n0)) AND (#n1 >= :v0)");
        assert_eq!(attrs.names().get("#n0").map(String::as_str), Some("partitionKey"));
        assert_eq!(attrs.names().get("#n1").map(String::as_str), Some("likeCount"));
        assert_eq!(attrs.values().get(":v0"), Some(&AttributeValue::number(1)));
    }

    #[test]
    fn test_repeated_names_share_placeholder() {
        let mut attrs = ExpressionAttributes::new();
        let condition = Condition::ge("count", 1).and(Condition::lt("count", 10));

        let expression = compile_condition(&condition, &mut attrs);

        assert_eq!(expression, "(#n0 >= :v0) AND (#n0 < :v1)");
        assert_eq!(attrs.names().len(), 1);
    }

    #[test]
    fn test_compile_update_groups_clauses() {
        let mut attrs = ExpressionAttributes::new();
        let update = Update::new()
            .set("status", "COMPLETED")
            .add("viewCount", 1)
            .remove("gsiA1PartitionKey")
            .set_if_not_exists("firstViewedAt", "2024-01-01T00:00:00.000Z");

        let expression = compile_update(&update, &mut attrs);

        assert_eq!(
            expression,
            "SET #n0 = :v0, #n3 = if_not_exists(#n3, :v2) REMOVE #n2 ADD #n1 :v1"
        );
        assert_eq!(attrs.values().len(), 3);
    }

    #[test]
    fn test_compile_key_condition() {
        let mut attrs = ExpressionAttributes::new();
        let condition = KeyCondition::partition("chat/c1").begins_with("member/");

        let expression = compile_key_condition(&condition, "partitionKey", "sortKey", &mut attrs);

        assert_eq!(expression, "#n0 = :v0 AND begins_with(#n1, :v1)");
        assert_eq!(attrs.values().get(":v1"), Some(&AttributeValue::from("member/")));
    }

    #[test]
    fn test_compile_between() {
        let mut attrs = ExpressionAttributes::new();
        let condition = KeyCondition::partition("post/trending")
            .between(AttributeValue::number(1), AttributeValue::number(5));

        let expression = compile_key_condition(&condition, "gsiK3PartitionKey", "gsiK3SortKey", &mut attrs);

        assert_eq!(expression, "#n0 = :v0 AND #n1 BETWEEN :v1 AND :v2");
    }

    #[test]
    fn test_compile_projection() {
        let mut attrs = ExpressionAttributes::new();
        let projection = compile_projection(&["partitionKey".to_string(), "sortKey".to_string()], &mut attrs);
        assert_eq!(projection, "#n0, #n1");
    }
}
