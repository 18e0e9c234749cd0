use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{CommitId, Id, Project};
use crate::store::{ProjectStorage, StorageBackend, MASTER_BRANCH};

/// External job runner. Gets the resolved project version so the crawl
/// uses a pinned snapshot, not whatever master looks like later.
#[async_trait::async_trait]
pub trait JobScheduler: Send + Sync {
    /// Queue a crawl; returns the runner's job id.
    async fn schedule(
        &self,
        project: &Id,
        spider: &Id,
        version: Option<&CommitId>,
    ) -> anyhow::Result<Id>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: Id,
    pub project: Id,
    pub spider: Id,
    /// Branch the spider definition was taken from.
    pub branch: String,
    /// Commit the job is pinned to. None on backends without history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<CommitId>,
}

/// Schedule a crawl for one spider.
///
/// Which state of the project runs: an explicitly requested branch wins;
/// otherwise the author's own branch when they have unpublished work;
/// otherwise master. `version` pins the checkout to an exact commit on top
/// of that. The spider must exist in the resolved state.
pub async fn schedule_spider(
    backend: Arc<dyn StorageBackend>,
    project_id: &str,
    spider_id: &str,
    author: &str,
    branch: Option<&str>,
    version: Option<&CommitId>,
    scheduler: &dyn JobScheduler,
) -> Result<ScheduledJob> {
    if !backend.project_exists(project_id).await? {
        return Err(Error::NotFound(format!(
            "project \"{}\" not found",
            project_id
        )));
    }

    let resolved = match branch {
        Some(branch) => branch.to_string(),
        None if backend.version_control() => {
            let repo = backend.repo(project_id)?;
            if repo.has_branch(author).await? {
                author.to_string()
            } else {
                MASTER_BRANCH.to_string()
            }
        }
        None => MASTER_BRANCH.to_string(),
    };

    let storage =
        ProjectStorage::open_at(backend, project_id, author, &resolved, version).await?;
    let project = Project::from_storage(storage)?;
    project.spider(spider_id)?;

    let version = project.storage().current_commit_id();
    let job_id = scheduler
        .schedule(project.id(), &spider_id.to_string(), version.as_ref())
        .await
        .map_err(|err| Error::Scheduler(err.to_string()))?;
    log::info!(
        "scheduled spider '{}' of project '{}' as job '{}' (branch '{}', version {:?})",
        spider_id,
        project_id,
        job_id,
        resolved,
        version
    );

    Ok(ScheduledJob {
        job_id,
        project: project.id().clone(),
        spider: spider_id.to_string(),
        branch: resolved,
        version,
    })
}
