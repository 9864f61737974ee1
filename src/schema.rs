//! Structured model of a schema file.
//!
//! These types are the output of [`crate::parser::parse`] and the input of
//! [`crate::graph::build`]. They serialize with camelCase keys (`rawType`, `isRelation`, ...)
//! since the JSON form is what a UI layer renders.

use serde::{Deserialize, Serialize};

/// A single field line inside a `model` block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    /// Declared type with the `?`, `[` and `]` modifiers stripped.
    pub raw_type: String,
    /// True iff `raw_type` names a model that was already complete when this field was read.
    pub is_relation: bool,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Model {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_relation)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

impl Enum {
    pub fn new(name: impl Into<String>) -> Self {
        Enum {
            name: name.into(),
            values: Vec::new(),
        }
    }
}

/// Complete output of one parse pass. Both sequences keep source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSchema {
    pub models: Vec<Model>,
    pub enums: Vec<Enum>,
}

impl ParsedSchema {
    /// Looks up a model by name. Duplicate names are not rejected by the parser; the
    /// last declaration wins here.
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().rev().find(|m| m.name == name)
    }

    /// Looks up an enum by name, last declaration wins.
    pub fn enum_def(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().rev().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.enums.is_empty()
    }

    pub fn relation_count(&self) -> usize {
        self.models.iter().map(|m| m.relations().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn serializes_with_camel_case_keys() {
        let field = Field {
            name: "id".to_string(),
            raw_type: "Int".to_string(),
            is_relation: false,
            is_nullable: false,
            is_primary_key: true,
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["rawType"], "Int");
        assert_eq!(json["isPrimaryKey"], true);
        assert_eq!(json["isRelation"], false);
        assert_eq!(json["isNullable"], false);
    }

    #[test]
    fn duplicate_names_resolve_to_last_declaration() {
        let mut first = Model::new("User");
        first.fields.push(Field {
            name: "a".to_string(),
            raw_type: "Int".to_string(),
            is_relation: false,
            is_nullable: false,
            is_primary_key: false,
        });
        let second = Model::new("User");
        let schema = ParsedSchema {
            models: vec![first, second],
            enums: vec![],
        };
        assert!(schema.model("User").unwrap().fields.is_empty());
        assert!(schema.model("Post").is_none());
    }
}
