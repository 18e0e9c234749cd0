use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{generate_id, Id};

/// An item schema shared across samples: a named set of field definitions.
/// Schemas are project-scoped and referenced by id from items, never embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: Id,
    pub name: String,
    /// Field definitions keyed by field id.
    #[serde(default)]
    pub fields: BTreeMap<Id, SchemaField>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&SchemaField> {
        self.fields.get(field_id)
    }

    /// Find a field definition by its logical name
    pub fn field_by_name(&self, name: &str) -> Option<(&Id, &SchemaField)> {
        self.fields.iter().find(|(_, field)| field.name == name)
    }

    pub fn add_field(&mut self, field: SchemaField) -> Id {
        let id = generate_id();
        self.fields.insert(id.clone(), field);
        id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String, // Logical name used in extracted items (e.g., "title", "price")
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Items missing a required field are dropped at extraction time.
    #[serde(default)]
    pub required: bool,
    /// Whether the field may differ between items on the same page.
    #[serde(default)]
    pub vary: bool,
}

impl SchemaField {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Text,
            required: false,
            vary: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Price,
    Image,
    Url,
    Date,
    /// Unprocessed markup, kept verbatim.
    Raw,
}
