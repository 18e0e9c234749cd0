use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{CommitId, Id};
use crate::store::{ChangedFile, FileTree, StorageBackend, VersionControl};

/// A project checkout bound to one author. Opening the handle resolves a
/// tree once (explicit version, else the author's branch, else master);
/// after that every read is served from memory and every write is staged
/// until [`ProjectStorage::commit`] flushes the lot in one commit.
///
/// The branch name doubles as the author identity: each author edits on a
/// branch named after them, and commits made through this handle advance
/// that branch only.
pub struct ProjectStorage {
    backend: Arc<dyn StorageBackend>,
    project: Id,
    author: String,
    branch: String,
    state: Mutex<TreeState>,
}

struct TreeState {
    /// Commit the tree was checked out at. None on non-versioned backends
    /// and for projects with no commits yet.
    commit: Option<CommitId>,
    /// Tree as checked out, untouched by staging.
    tree: FileTree,
    /// Tree with staged writes applied. Reads go here.
    working: FileTree,
}

impl ProjectStorage {
    /// Open a checkout on the author's own branch.
    pub async fn open(
        backend: Arc<dyn StorageBackend>,
        project: impl Into<Id>,
        author: &str,
        version: Option<&CommitId>,
    ) -> Result<Self> {
        let branch = author.to_string();
        Self::open_at(backend, project, author, &branch, version).await
    }

    /// Open a checkout on an explicit branch. Used for master views and for
    /// the initial commit of a fresh project.
    pub async fn open_at(
        backend: Arc<dyn StorageBackend>,
        project: impl Into<Id>,
        author: &str,
        branch: &str,
        version: Option<&CommitId>,
    ) -> Result<Self> {
        let project = project.into();
        let snapshot = backend.checkout(&project, branch, version).await?;
        log::debug!(
            "opened project '{}' on branch '{}' at {:?}",
            project,
            branch,
            snapshot.commit
        );
        Ok(Self {
            backend,
            project,
            author: author.to_string(),
            branch: branch.to_string(),
            state: Mutex::new(TreeState {
                commit: snapshot.commit,
                working: snapshot.tree.clone(),
                tree: snapshot.tree,
            }),
        })
    }

    pub fn project(&self) -> &Id {
        &self.project
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.backend)
    }

    pub fn version_control(&self) -> bool {
        self.backend.version_control()
    }

    /// Version-control surface for this project.
    pub fn repo(&self) -> Result<Arc<dyn VersionControl>> {
        self.backend.repo(&self.project)
    }

    /// Commit the checkout was opened at, advanced by each commit made
    /// through this handle.
    pub fn current_commit_id(&self) -> Option<CommitId> {
        self.state.lock().commit.clone()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().working.contains_key(path)
    }

    /// Immediate children of a directory as (subdirectories, files), both
    /// sorted. The tree is flat, so directories only exist implicitly.
    pub fn list_dir(&self, dir: &str) -> (Vec<String>, Vec<String>) {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir.trim_end_matches('/'))
        };
        let state = self.state.lock();
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for path in state.working.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    if dirs.last().map(String::as_str) != Some(child) {
                        dirs.push(child.to_string());
                    }
                }
                None => files.push(rest.to_string()),
            }
        }
        // BTreeMap iteration is sorted, so dirs and files already are.
        dirs.dedup();
        (dirs, files)
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.state.lock();
        state.working.get(path).cloned().ok_or_else(|| {
            Error::NotFound(format!(
                "file \"{}\" not found in project \"{}\"",
                path, self.project
            ))
        })
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Stage bytes at a path. Visible to reads on this handle immediately;
    /// persisted only on commit.
    pub fn stage(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.state.lock().working.insert(path.into(), bytes);
    }

    pub fn stage_json<T: Serialize>(&self, path: impl Into<String>, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.stage(path, bytes);
        Ok(())
    }

    /// Stage a deletion. Returns false when the path was not present.
    pub fn delete(&self, path: &str) -> bool {
        self.state.lock().working.remove(path).is_some()
    }

    /// True when staged state differs from the checked-out tree.
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state.working != state.tree
    }

    /// Drop every staged write, restoring the checked-out tree.
    pub fn discard(&self) {
        let mut state = self.state.lock();
        state.working = state.tree.clone();
    }

    /// Flush all staged writes as one commit on this handle's branch.
    /// Returns None without touching the backend when nothing is staged;
    /// also None on backends that keep no history (the tree is still
    /// persisted there).
    pub async fn commit(&self, message: &str) -> Result<Option<CommitId>> {
        let (parent, tree) = {
            let state = self.state.lock();
            if state.working == state.tree {
                log::debug!(
                    "commit skipped for project '{}': working tree unchanged",
                    self.project
                );
                return Ok(None);
            }
            (state.commit.clone(), state.working.clone())
        };

        let committed = self
            .backend
            .commit(
                &self.project,
                &self.branch,
                parent.as_ref(),
                &self.author,
                message,
                &tree,
            )
            .await?;

        let mut state = self.state.lock();
        state.tree = tree;
        if let Some(id) = &committed {
            log::info!(
                "committed project '{}' on branch '{}': {}",
                self.project,
                self.branch,
                id
            );
            state.commit = Some(id.clone());
        }
        Ok(committed)
    }

    /// Committed diff of this branch against master. Staged-but-uncommitted
    /// edits are not part of the answer.
    pub async fn changed_files(&self) -> Result<Vec<ChangedFile>> {
        let repo = self.repo()?;
        repo.changed_entries(&self.branch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn open_blank() -> ProjectStorage {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStore::new());
        ProjectStorage::open(backend, "shop", "alice", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn staged_writes_are_read_back_before_commit() {
        let storage = open_blank().await;
        assert!(!storage.exists("project.json"));

        storage.stage("project.json", b"{}".to_vec());
        assert!(storage.exists("project.json"));
        assert_eq!(storage.read("project.json").unwrap(), b"{}".to_vec());
        assert!(storage.is_dirty());
    }

    #[tokio::test]
    async fn commit_with_clean_tree_is_a_no_op() {
        let storage = open_blank().await;
        storage.stage("a.json", b"1".to_vec());
        storage.commit("add a").await.unwrap();
        assert!(!storage.is_dirty());

        // Same bytes staged again: nothing to flush.
        storage.stage("a.json", b"1".to_vec());
        let second = storage.commit("noop").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn list_dir_splits_subdirectories_from_files() {
        let storage = open_blank().await;
        storage.stage("spiders/shop.json", b"{}".to_vec());
        storage.stage("spiders/shop/sample-1.json", b"{}".to_vec());
        storage.stage("spiders/shop/sample-2.json", b"{}".to_vec());
        storage.stage("project.json", b"{}".to_vec());

        let (dirs, files) = storage.list_dir("spiders");
        assert_eq!(dirs, vec!["shop".to_string()]);
        assert_eq!(files, vec!["shop.json".to_string()]);

        let (_, samples) = storage.list_dir("spiders/shop");
        assert_eq!(
            samples,
            vec!["sample-1.json".to_string(), "sample-2.json".to_string()]
        );
    }

    #[tokio::test]
    async fn read_of_missing_path_is_not_found() {
        let storage = open_blank().await;
        let err = storage.read("nope.json").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_unstages_a_path() {
        let storage = open_blank().await;
        storage.stage("a.json", b"1".to_vec());
        assert!(storage.delete("a.json"));
        assert!(!storage.exists("a.json"));
        assert!(!storage.delete("a.json"));
    }

    #[tokio::test]
    async fn discard_restores_the_checked_out_tree() {
        let storage = open_blank().await;
        storage.stage("a.json", b"1".to_vec());
        storage.commit("add a").await.unwrap();

        storage.stage("a.json", b"2".to_vec());
        storage.stage("b.json", b"3".to_vec());
        storage.discard();
        assert!(!storage.is_dirty());
        assert_eq!(storage.read("a.json").unwrap(), b"1".to_vec());
        assert!(!storage.exists("b.json"));
    }
}
