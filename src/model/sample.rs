use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{generate_id, Id, Project};

/// One annotated page of a spider. The spider listing only carries sample
/// ids, so a `Sample` value starts life as a stub (`items: None`) and is
/// materialized from its body file on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Id,
    /// Owning spider. A sample has no identity of its own: its persisted
    /// path is derived from this id, which is why it cannot be re-parented.
    pub spider: Id,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
}

impl Sample {
    pub fn new(spider: impl Into<Id>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            spider: spider.into(),
            name: name.into(),
            url: url.into(),
            items: Some(Vec::new()),
        }
    }

    /// Stub form used in listings: identity only, no body loaded.
    pub fn stub(spider: impl Into<Id>, id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            spider: spider.into(),
            name: String::new(),
            url: String::new(),
            items: None,
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.items.is_some()
    }

    /// Resolve the full item/annotation tree for this sample. A materialized
    /// sample is returned as-is; a stub is re-read from the project.
    pub fn with_snapshots(self, project: &Project) -> Result<Sample> {
        if self.is_materialized() {
            return Ok(self);
        }
        project.sample(&self.spider, &self.id)
    }

    pub fn items(&self) -> &[Item] {
        self.items.as_deref().unwrap_or(&[])
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.get_or_insert_with(Vec::new).push(item);
    }
}

/// One extracted record within a sample, bound to a schema by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    /// Schema reference. Schemas are shared project-wide, never embedded.
    pub schema: Id,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Item {
    pub fn new(schema: impl Into<Id>) -> Self {
        Self {
            id: generate_id(),
            schema: schema.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Binds a page selector to a schema field, optionally post-processed by
/// shared extractors (referenced by id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Id,
    /// Logical field name this annotation fills.
    pub attribute: String,
    /// CSS selector matched on the page.
    pub selector: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extractors: Vec<Id>,
}

impl Annotation {
    pub fn new(attribute: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            attribute: attribute.into(),
            selector: selector.into(),
            extractors: Vec::new(),
        }
    }

    pub fn with_extractor(mut self, extractor_id: impl Into<Id>) -> Self {
        self.extractors.push(extractor_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_is_not_materialized() {
        let stub = Sample::stub("spider-1", "sample-1");
        assert!(!stub.is_materialized());
        assert!(stub.items().is_empty());
    }

    #[test]
    fn stub_omits_items_when_serialized() {
        let stub = Sample::stub("spider-1", "sample-1");
        let json = serde_json::to_value(&stub).unwrap();
        assert!(json.get("items").is_none());

        let mut sample = Sample::new("spider-1", "home", "http://example.com");
        sample.add_item(Item::new("schema-1"));
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
    }
}
