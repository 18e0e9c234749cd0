use serde::{Deserialize, Serialize};

use crate::model::Id;

/// A spider definition. Persisted as its own file under the project tree;
/// the sample bodies live in separate files keyed by the ids listed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spider {
    pub id: Id,
    #[serde(default)]
    pub start_urls: Vec<String>,
    /// Crawl stays inside these domains. Empty means unrestricted.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Render pages with a JS engine before extraction.
    #[serde(default)]
    pub js_enabled: bool,
    /// Sample ids in insertion order. The order is part of the persisted
    /// state and survives copies.
    #[serde(default)]
    pub samples: Vec<Id>,
}

impl Spider {
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            start_urls: Vec::new(),
            allowed_domains: Vec::new(),
            js_enabled: false,
            samples: Vec::new(),
        }
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_urls.push(url.into());
        self
    }

    pub fn with_allowed_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains.push(domain.into());
        self
    }

    /// Record a sample id, keeping insertion order. Re-adding an id that is
    /// already listed is a no-op.
    pub fn add_sample(&mut self, sample_id: impl Into<Id>) -> bool {
        let sample_id = sample_id.into();
        if self.samples.contains(&sample_id) {
            return false;
        }
        self.samples.push(sample_id);
        true
    }
}
