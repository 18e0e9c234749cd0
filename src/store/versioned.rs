use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{CommitId, Id};
use crate::store::{
    branch_ref, ChangeKind, ChangedFile, CommitInfo, FileTree, Snapshot, StorageBackend,
    VersionControl, MASTER_BRANCH,
};

/// An immutable snapshot of a project tree. Content-addressed: the id is a
/// SHA-256 over the metadata and the serialized tree, so identical states
/// hash identically regardless of when they were committed.
#[derive(Debug, Clone)]
struct StoredCommit {
    id: CommitId,
    project: Id,
    parent: Option<CommitId>,
    author: String,
    message: String,
    created_at: String, // ISO 8601 string
    /// Compressed binary data containing the full file tree
    data: Vec<u8>,
    /// Uncompressed size for monitoring
    data_size: i64,
}

impl StoredCommit {
    fn new(
        project: &str,
        parent: Option<&CommitId>,
        author: &str,
        message: &str,
        tree: &FileTree,
    ) -> Result<Self> {
        let serialized = serde_json::to_string(tree)?;
        let data = compress_data(serialized.as_bytes())?;
        let id = calculate_hash(
            project,
            parent.map(String::as_str),
            author,
            message,
            &serialized,
        );
        Ok(Self {
            id,
            project: project.to_string(),
            parent: parent.cloned(),
            author: author.to_string(),
            message: message.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            data_size: serialized.len() as i64,
            data,
        })
    }

    /// Decompress and deserialize the committed tree.
    fn tree(&self) -> Result<FileTree> {
        let decompressed = decompress_data(&self.data)?;
        Ok(serde_json::from_slice(&decompressed)?)
    }

    fn info(&self) -> CommitInfo {
        CommitInfo {
            id: self.id.clone(),
            parent: self.parent.clone(),
            author: self.author.clone(),
            message: self.message.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Calculate the SHA-256 commit id. The creation timestamp is deliberately
/// left out so the id is a pure function of content and lineage.
fn calculate_hash(
    project: &str,
    parent: Option<&str>,
    author: &str,
    message: &str,
    data: &str,
) -> CommitId {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(format!("project:{}\n", project));
    if let Some(parent) = parent {
        hasher.update(format!("parent:{}\n", parent));
    }
    hasher.update(format!("author:{}\n", author));
    hasher.update(format!("message:{}\n", message));
    hasher.update(format!("data:{}\n", data));

    hex::encode(hasher.finalize())
}

/// Compress data using gzip
fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress data from gzip
fn decompress_data(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    // Gzip magic bytes (1f 8b): uncompressed payloads pass through as-is
    if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    } else {
        Ok(data.to_vec())
    }
}

struct Inner {
    /// All commits across projects, keyed by hash.
    commits: BTreeMap<CommitId, StoredCommit>,
    /// Per project: full ref name -> commit id.
    refs: BTreeMap<Id, BTreeMap<String, CommitId>>,
}

/// In-memory backend with full history: every commit is kept, branches are
/// refs into the commit graph, and publishing is a ref move guarded by an
/// ancestry check.
pub struct VersionedStore {
    inner: Arc<RwLock<Inner>>,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                commits: BTreeMap::new(),
                refs: BTreeMap::new(),
            })),
        }
    }
}

impl Default for VersionedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for VersionedStore {
    fn version_control(&self) -> bool {
        true
    }

    async fn projects(&self) -> Result<Vec<Id>> {
        Ok(self.inner.read().refs.keys().cloned().collect())
    }

    async fn project_exists(&self, project: &str) -> Result<bool> {
        Ok(self.inner.read().refs.contains_key(project))
    }

    async fn checkout(
        &self,
        project: &str,
        branch: &str,
        version: Option<&CommitId>,
    ) -> Result<Snapshot> {
        let inner = self.inner.read();

        if let Some(version) = version {
            let commit = inner
                .commits
                .get(version)
                .filter(|c| c.project == project)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "commit \"{}\" not found in project \"{}\"",
                        version, project
                    ))
                })?;
            return Ok(Snapshot {
                commit: Some(commit.id.clone()),
                tree: commit.tree()?,
            });
        }

        let Some(project_refs) = inner.refs.get(project) else {
            return Ok(Snapshot::default());
        };
        let head = project_refs
            .get(&branch_ref(branch))
            .or_else(|| project_refs.get(&branch_ref(MASTER_BRANCH)));
        match head {
            Some(id) => {
                let commit = lookup_commit(&inner.commits, project, id)?;
                Ok(Snapshot {
                    commit: Some(commit.id.clone()),
                    tree: commit.tree()?,
                })
            }
            None => Ok(Snapshot::default()),
        }
    }

    async fn commit(
        &self,
        project: &str,
        branch: &str,
        parent: Option<&CommitId>,
        author: &str,
        message: &str,
        tree: &FileTree,
    ) -> Result<Option<CommitId>> {
        let commit = StoredCommit::new(project, parent, author, message, tree)?;
        let id = commit.id.clone();
        log::debug!(
            "storing commit {} on '{}:{}' ({} bytes uncompressed)",
            id,
            project,
            branch,
            commit.data_size
        );

        let mut inner = self.inner.write();
        inner.commits.insert(id.clone(), commit);
        inner
            .refs
            .entry(project.to_string())
            .or_default()
            .insert(branch_ref(branch), id.clone());
        Ok(Some(id))
    }

    fn repo(&self, project: &str) -> Result<Arc<dyn VersionControl>> {
        Ok(Arc::new(VersionedRepo {
            inner: Arc::clone(&self.inner),
            project: project.to_string(),
        }))
    }
}

/// [`VersionControl`] view of a [`VersionedStore`], bound to one project.
struct VersionedRepo {
    inner: Arc<RwLock<Inner>>,
    project: Id,
}

impl VersionedRepo {
    fn missing_branch(&self, branch: &str) -> Error {
        Error::NotFound(format!(
            "branch \"{}\" not found in project \"{}\"",
            branch, self.project
        ))
    }
}

#[async_trait::async_trait]
impl VersionControl for VersionedRepo {
    async fn refs(&self) -> Result<BTreeMap<String, CommitId>> {
        Ok(self
            .inner
            .read()
            .refs
            .get(&self.project)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_ref(&self, name: &str) -> Result<Option<CommitId>> {
        Ok(self
            .inner
            .read()
            .refs
            .get(&self.project)
            .and_then(|refs| refs.get(name))
            .cloned())
    }

    async fn set_ref(&self, name: &str, commit: CommitId) -> Result<()> {
        let mut inner = self.inner.write();
        let known = inner
            .commits
            .get(&commit)
            .is_some_and(|c| c.project == self.project);
        if !known {
            return Err(Error::NotFound(format!(
                "commit \"{}\" not found in project \"{}\"",
                commit, self.project
            )));
        }
        inner
            .refs
            .entry(self.project.clone())
            .or_default()
            .insert(name.to_string(), commit);
        Ok(())
    }

    async fn has_branch(&self, branch: &str) -> Result<bool> {
        self.get_ref(&branch_ref(branch)).await.map(|r| r.is_some())
    }

    async fn publish_branch(&self, branch: &str, force: bool) -> Result<bool> {
        let master_ref = branch_ref(MASTER_BRANCH);
        let mut inner = self.inner.write();

        let project_refs = inner.refs.get(&self.project);
        let head = project_refs
            .and_then(|refs| refs.get(&branch_ref(branch)))
            .cloned()
            .ok_or_else(|| self.missing_branch(branch))?;
        let master = project_refs.and_then(|refs| refs.get(&master_ref)).cloned();

        let fast_forward = match &master {
            None => true,
            Some(m) if *m == head => true,
            Some(m) => is_ancestor(&inner.commits, m, &head),
        };
        if !fast_forward && !force {
            log::debug!(
                "publish of '{}:{}' rejected: master has diverged",
                self.project,
                branch
            );
            return Ok(false);
        }
        if !fast_forward {
            log::warn!(
                "force-publishing '{}:{}': overwriting diverged master",
                self.project,
                branch
            );
        }

        inner
            .refs
            .entry(self.project.clone())
            .or_default()
            .insert(master_ref, head.clone());
        log::info!(
            "published '{}:{}': master now at {}",
            self.project,
            branch,
            head
        );
        Ok(true)
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let removed = inner
            .refs
            .get_mut(&self.project)
            .and_then(|refs| refs.remove(&branch_ref(branch)));
        if removed.is_none() {
            return Err(self.missing_branch(branch));
        }
        log::debug!("deleted branch '{}' in project '{}'", branch, self.project);
        Ok(())
    }

    async fn changed_entries(&self, branch: &str) -> Result<Vec<ChangedFile>> {
        if branch == MASTER_BRANCH {
            return Ok(Vec::new());
        }
        let inner = self.inner.read();
        let Some(project_refs) = inner.refs.get(&self.project) else {
            return Ok(Vec::new());
        };
        let Some(head) = project_refs.get(&branch_ref(branch)) else {
            // No ref yet: the author has not committed anything.
            return Ok(Vec::new());
        };

        let branch_tree = lookup_commit(&inner.commits, &self.project, head)?.tree()?;
        let master_tree = match project_refs.get(&branch_ref(MASTER_BRANCH)) {
            Some(id) => lookup_commit(&inner.commits, &self.project, id)?.tree()?,
            None => FileTree::new(),
        };

        Ok(diff_trees(&master_tree, &branch_tree))
    }

    async fn history(&self, branch: &str) -> Result<Vec<CommitInfo>> {
        let inner = self.inner.read();
        let head = inner
            .refs
            .get(&self.project)
            .and_then(|refs| refs.get(&branch_ref(branch)))
            .cloned()
            .ok_or_else(|| self.missing_branch(branch))?;

        let mut history = Vec::new();
        let mut current = Some(head);
        while let Some(id) = current {
            let commit = lookup_commit(&inner.commits, &self.project, &id)?;
            history.push(commit.info());
            current = commit.parent.clone();
        }
        Ok(history)
    }
}

fn lookup_commit<'a>(
    commits: &'a BTreeMap<CommitId, StoredCommit>,
    project: &str,
    id: &CommitId,
) -> Result<&'a StoredCommit> {
    commits
        .get(id)
        .filter(|c| c.project == project)
        .ok_or_else(|| {
            Error::Storage(format!(
                "ref in project \"{}\" points at missing commit \"{}\"",
                project, id
            ))
        })
}

/// Whether `ancestor` is reachable from `descendant` by following parents.
/// A commit counts as its own ancestor.
fn is_ancestor(
    commits: &BTreeMap<CommitId, StoredCommit>,
    ancestor: &CommitId,
    descendant: &CommitId,
) -> bool {
    let mut current = Some(descendant.clone());
    while let Some(id) = current {
        if &id == ancestor {
            return true;
        }
        current = commits.get(&id).and_then(|c| c.parent.clone());
    }
    false
}

/// Diff `current` against `base`, pairing up renames: a removed path and an
/// added path with identical bytes are reported as one rename. Entries come
/// back ordered by path.
fn diff_trees(base: &FileTree, current: &FileTree) -> Vec<ChangedFile> {
    let mut entries: Vec<ChangedFile> = Vec::new();

    let added: Vec<&String> = current
        .keys()
        .filter(|path| !base.contains_key(*path))
        .collect();
    let removed: Vec<&String> = base
        .keys()
        .filter(|path| !current.contains_key(*path))
        .collect();

    for (path, bytes) in current {
        if let Some(old_bytes) = base.get(path) {
            if old_bytes != bytes {
                entries.push(ChangedFile::new(ChangeKind::Modified, path.clone()));
            }
        }
    }

    // Both lists iterate in path order, so rename pairing is deterministic:
    // each removed path takes the first unclaimed added path with the same
    // content.
    let mut claimed = vec![false; added.len()];
    for old_path in removed {
        let pair = added.iter().enumerate().find(|(i, new_path)| {
            !claimed[*i] && current.get(**new_path) == base.get(old_path)
        });
        match pair {
            Some((i, new_path)) => {
                claimed[i] = true;
                entries.push(ChangedFile::renamed(old_path.clone(), (*new_path).clone()));
            }
            None => entries.push(ChangedFile::new(ChangeKind::Removed, old_path.clone())),
        }
    }
    for (i, new_path) in added.iter().enumerate() {
        if !claimed[i] {
            entries.push(ChangedFile::new(ChangeKind::Added, (*new_path).clone()));
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
