use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{CommitId, Id};

/// Branch every publish lands on.
pub const MASTER_BRANCH: &str = "master";

/// Full ref name for a branch, git style.
pub fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

/// Flat snapshot tree: relative path -> file bytes. BTreeMap so diffs and
/// serialized trees are deterministic.
pub type FileTree = BTreeMap<String, Vec<u8>>;

/// What a checkout hands back: the tree plus the commit it came from
/// (None on backends without version control, or for an empty project).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub commit: Option<CommitId>,
    pub tree: FileTree,
}

/// One entry of a branch-vs-master diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub kind: ChangeKind,
    pub path: String,
    /// Previous path, set only for renames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
}

impl ChangedFile {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path: None,
        }
    }

    pub fn renamed(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path: new_path.into(),
            old_path: Some(old_path.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Renamed,
}

/// Commit metadata as reported by history walks. The snapshot payload
/// stays inside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    pub author: String,
    pub message: String,
    pub created_at: String, // ISO 8601 string
}

/// Project names double as directory names in the persisted tree, so they
/// follow filesystem rules: non-empty, no surrounding whitespace, and only
/// word characters, dash, dot or space.
pub fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() || name != name.trim() {
        return false;
    }
    name.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
}

/// Storage backend surface: snapshot checkouts and whole-tree commits.
/// Everything above this trait works on in-memory trees; the backend is the
/// only place bytes are persisted.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether this backend keeps history. Non-versioned backends still
    /// support checkout/commit but only ever hold the latest tree.
    fn version_control(&self) -> bool;

    fn is_valid_filename(&self, name: &str) -> bool {
        is_valid_filename(name)
    }

    async fn projects(&self) -> Result<Vec<Id>>;

    async fn project_exists(&self, project: &str) -> Result<bool>;

    /// Check out a project tree. `version` pins an exact commit; otherwise
    /// the branch head is used, falling back to master when the branch has
    /// no ref yet. An unknown project yields an empty snapshot, which is
    /// what project creation builds on.
    async fn checkout(
        &self,
        project: &str,
        branch: &str,
        version: Option<&CommitId>,
    ) -> Result<Snapshot>;

    /// Persist a whole tree as the new head of `branch`. Returns the new
    /// commit id, or None on backends without version control.
    async fn commit(
        &self,
        project: &str,
        branch: &str,
        parent: Option<&CommitId>,
        author: &str,
        message: &str,
        tree: &FileTree,
    ) -> Result<Option<CommitId>>;

    /// Version-control surface for one project. Fails with
    /// `Error::FeatureNotAvailable` on backends that keep no history.
    fn repo(&self, project: &str) -> Result<Arc<dyn VersionControl>>;
}

/// Branch-level operations over one project's history. Obtained from
/// [`StorageBackend::repo`]; all refs use their full `refs/heads/...` name.
#[async_trait::async_trait]
pub trait VersionControl: Send + Sync {
    async fn refs(&self) -> Result<BTreeMap<String, CommitId>>;

    async fn get_ref(&self, name: &str) -> Result<Option<CommitId>>;

    /// Point a ref at an existing commit, creating the ref if needed.
    /// The commit must exist in this project's history.
    async fn set_ref(&self, name: &str, commit: CommitId) -> Result<()>;

    async fn has_branch(&self, branch: &str) -> Result<bool>;

    /// Move master to the branch head. Returns true when master was
    /// fast-forwarded (or already there); false when the histories have
    /// diverged and `force` was not set, in which case no ref moves.
    /// With `force`, master is overwritten and the result is true.
    async fn publish_branch(&self, branch: &str, force: bool) -> Result<bool>;

    /// Drop a branch ref. Deleting a branch that does not exist is an
    /// error, not a no-op.
    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Diff of the branch head against master, ordered by path. Master
    /// itself, or a branch with no ref yet, reports no changes.
    async fn changed_entries(&self, branch: &str) -> Result<Vec<ChangedFile>>;

    /// Commit chain from the branch head to the root, newest first.
    async fn history(&self, branch: &str) -> Result<Vec<CommitInfo>>;
}

impl std::fmt::Debug for dyn VersionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionControl").finish_non_exhaustive()
    }
}
