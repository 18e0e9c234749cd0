use serde::{Deserialize, Serialize};

use crate::model::{generate_id, FieldType, Id};

/// A post-processing step applied to annotated text before it lands in an
/// item field. Extractors are project-scoped and shared by id, like schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extractor {
    pub id: Id,
    #[serde(flatten)]
    pub kind: ExtractorKind,
}

impl Extractor {
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            kind: ExtractorKind::Regex {
                pattern: pattern.into(),
            },
        }
    }

    pub fn typed(field_type: FieldType) -> Self {
        Self {
            id: generate_id(),
            kind: ExtractorKind::Typed { field_type },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Keep the first group matched by a regular expression.
    Regex { pattern: String },
    /// Coerce the matched text into a builtin field type.
    Typed { field_type: FieldType },
}
