use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{CommitId, Id};
use crate::store::{FileTree, Snapshot, StorageBackend, VersionControl};

/// Backend with no history: one latest tree per project. Branch and parent
/// arguments are accepted and ignored, so the same calling code drives both
/// this store and the versioned one.
pub struct MemoryStore {
    projects: RwLock<BTreeMap<Id, FileTree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStore {
    fn version_control(&self) -> bool {
        false
    }

    async fn projects(&self) -> Result<Vec<Id>> {
        Ok(self.projects.read().keys().cloned().collect())
    }

    async fn project_exists(&self, project: &str) -> Result<bool> {
        Ok(self.projects.read().contains_key(project))
    }

    async fn checkout(
        &self,
        project: &str,
        _branch: &str,
        version: Option<&CommitId>,
    ) -> Result<Snapshot> {
        if version.is_some() {
            return Err(Error::FeatureNotAvailable);
        }
        let tree = self
            .projects
            .read()
            .get(project)
            .cloned()
            .unwrap_or_default();
        Ok(Snapshot { commit: None, tree })
    }

    async fn commit(
        &self,
        project: &str,
        _branch: &str,
        _parent: Option<&CommitId>,
        _author: &str,
        _message: &str,
        tree: &FileTree,
    ) -> Result<Option<CommitId>> {
        self.projects
            .write()
            .insert(project.to_string(), tree.clone());
        Ok(None)
    }

    fn repo(&self, _project: &str) -> Result<Arc<dyn VersionControl>> {
        Err(Error::FeatureNotAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_tree_wins() {
        let store = MemoryStore::new();
        let mut tree = FileTree::new();
        tree.insert("a.json".to_string(), b"1".to_vec());
        store
            .commit("shop", "alice", None, "alice", "first", &tree)
            .await
            .unwrap();

        tree.insert("a.json".to_string(), b"2".to_vec());
        store
            .commit("shop", "alice", None, "alice", "second", &tree)
            .await
            .unwrap();

        let snapshot = store.checkout("shop", "alice", None).await.unwrap();
        assert_eq!(snapshot.commit, None);
        assert_eq!(snapshot.tree.get("a.json"), Some(&b"2".to_vec()));
    }

    #[tokio::test]
    async fn repo_access_is_not_available() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.repo("shop").unwrap_err(),
            Error::FeatureNotAvailable
        ));
    }

    #[tokio::test]
    async fn pinned_checkout_is_not_available() {
        let store = MemoryStore::new();
        let err = store
            .checkout("shop", "alice", Some(&"abc".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FeatureNotAvailable));
    }
}
