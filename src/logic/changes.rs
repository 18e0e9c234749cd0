use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CommitId, Id, Project};
use crate::store::ChangedFile;

/// Pending-changes view of one project checkout: what the author's branch
/// would publish if merged into master right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project: Id,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitId>,
    pub changes: Vec<ChangedFile>,
}

impl ProjectStatus {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Committed diff of the project's branch against master, normalized to
/// one entry per path in path order. Staged-but-uncommitted edits do not
/// appear here.
pub async fn changed_files(project: &Project) -> Result<Vec<ChangedFile>> {
    let entries = project.storage().changed_files().await?;
    Ok(normalize(entries))
}

pub async fn has_changes(project: &Project) -> Result<bool> {
    Ok(!changed_files(project).await?.is_empty())
}

pub async fn project_status(project: &Project) -> Result<ProjectStatus> {
    let changes = changed_files(project).await?;
    Ok(ProjectStatus {
        project: project.id().clone(),
        branch: project.storage().branch().to_string(),
        commit: project.storage().current_commit_id(),
        changes,
    })
}

/// Adapters are trusted to diff correctly but not to order: whatever comes
/// back is deduplicated by path and sorted.
fn normalize(entries: Vec<ChangedFile>) -> Vec<ChangedFile> {
    entries
        .into_iter()
        .unique_by(|entry| entry.path.clone())
        .sorted_by(|a, b| a.path.cmp(&b.path))
        .collect()
}
