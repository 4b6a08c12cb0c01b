//! Table definition (pure data).
//!
//! Describes the physical layout every engine relies on: the primary key
//! attributes and one global secondary index per [`IndexSlot`]. Printed by
//! `onetable schema` and used by the DynamoDB engine to create the table.

use std::fmt;

use serde::Serialize;

use onetable_core::keys::{IndexSlot, PARTITION_KEY, SORT_KEY};

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
        }
    }
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAttribute {
    pub name: &'static str,
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    fn string(name: &'static str) -> Self {
        Self {
            name,
            attribute_type: AttributeType::String,
        }
    }
}

/// Global secondary index definition. Indexes always project all attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub slot: &'static str,
    pub name: &'static str,
    pub partition_key: KeyAttribute,
    pub sort_key: KeyAttribute,
}

/// Table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: KeyAttribute,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    /// Every attribute that appears in a key, without duplicates.
    pub fn key_attributes(&self) -> Vec<&KeyAttribute> {
        let mut attributes = vec![&self.partition_key, &self.sort_key];
        for index in &self.indexes {
            for attribute in [&index.partition_key, &index.sort_key] {
                if !attributes.iter().any(|a| a.name == attribute.name) {
                    attributes.push(attribute);
                }
            }
        }
        attributes
    }
}

/// Returns the canonical table definition.
pub fn table_definition(table_name: &str) -> TableDefinition {
    TableDefinition {
        table_name: table_name.to_string(),
        partition_key: KeyAttribute::string(PARTITION_KEY),
        sort_key: KeyAttribute::string(SORT_KEY),
        indexes: IndexSlot::ALL
            .iter()
            .map(|slot| IndexDefinition {
                slot: slot.as_str(),
                name: slot.index_name(),
                partition_key: KeyAttribute::string(slot.partition_key_attr()),
                sort_key: KeyAttribute {
                    name: slot.sort_key_attr(),
                    attribute_type: if slot.numeric_sort_key() {
                        AttributeType::Number
                    } else {
                        AttributeType::String
                    },
                },
            })
            .collect(),
    }
}

impl fmt::Display for TableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table: {}", self.table_name)?;
        writeln!(
            f,
            "  key: {} ({}) / {} ({})",
            self.partition_key.name,
            self.partition_key.attribute_type.as_str(),
            self.sort_key.name,
            self.sort_key.attribute_type.as_str()
        )?;
        for index in &self.indexes {
            writeln!(
                f,
                "  {:<6} {} ({}) / {} ({})",
                index.name,
                index.partition_key.name,
                index.partition_key.attribute_type.as_str(),
                index.sort_key.name,
                index.sort_key.attribute_type.as_str()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_has_seven_indexes() {
        let definition = table_definition("onetable");
        assert_eq!(definition.indexes.len(), 7);
        assert_eq!(definition.indexes[0].name, "GSI-A1");
        assert_eq!(definition.indexes[0].partition_key.name, "gsiA1PartitionKey");
    }

    #[test]
    fn test_k3_sort_key_is_numeric() {
        let definition = table_definition("onetable");
        let k3 = definition
            .indexes
            .iter()
            .find(|index| index.slot == "K3")
            .unwrap();
        assert_eq!(k3.sort_key.attribute_type, AttributeType::Number);
    }

    #[test]
    fn test_key_attributes_are_unique() {
        let definition = table_definition("onetable");
        // Primary key plus two attributes per index slot.
        assert_eq!(definition.key_attributes().len(), 2 + 7 * 2);
    }

    #[test]
    fn test_json_uses_scalar_type_codes() {
        let json = serde_json::to_value(table_definition("t")).unwrap();
        assert_eq!(json["tableName"], "t");
        assert_eq!(json["partitionKey"]["attributeType"], "S");
    }
}
