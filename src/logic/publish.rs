use crate::error::{Error, Result};
use crate::logic::changes;
use crate::model::Project;
use crate::store::{branch_ref, MASTER_BRANCH};

/// Hands a freshly published project to whatever runs the crawls.
/// Called after master has moved but before the working branch is deleted,
/// so a failed deploy leaves the branch in place for a retry.
#[async_trait::async_trait]
pub trait DeployTrigger: Send + Sync {
    async fn deploy(&self, project: &Project) -> anyhow::Result<()>;
}

/// Placeholder trigger for setups without a crawler runtime attached.
pub struct NoopDeployTrigger;

#[async_trait::async_trait]
impl DeployTrigger for NoopDeployTrigger {
    async fn deploy(&self, project: &Project) -> anyhow::Result<()> {
        log::debug!("deploy skipped for project '{}': no trigger", project.id());
        Ok(())
    }
}

/// Merge the author's branch into master and retire it.
///
/// Order matters: the merge is attempted first (a divergence comes back as
/// [`Error::Conflict`] and moves nothing), the deploy trigger runs second,
/// and only a successful deploy deletes the branch. Returns the project
/// re-opened on a fresh handle, now reading master; the handle passed in
/// keeps its stale pre-publish checkout.
pub async fn publish(
    project: &Project,
    force: bool,
    deploy: &dyn DeployTrigger,
) -> Result<Project> {
    let storage = project.storage();
    let branch = storage.branch().to_string();
    let repo = storage.repo()?;

    let changes = changes::changed_files(project).await?;
    if changes.is_empty() {
        return Err(Error::Validation(
            "you have no changes to publish".to_string(),
        ));
    }
    log::info!(
        "publishing project '{}' from branch '{}' ({} changed files, force={})",
        project.id(),
        branch,
        changes.len(),
        force
    );

    let published = repo.publish_branch(&branch, force).await?;
    if !published {
        log::warn!(
            "publish of project '{}' from branch '{}' rejected: master has diverged",
            project.id(),
            branch
        );
        return Err(Error::Conflict(
            "a conflict occurred when publishing your changes; resolve the conflict before the project can be published"
                .to_string(),
        ));
    }

    if let Err(err) = deploy.deploy(project).await {
        log::warn!(
            "deploy of project '{}' failed; branch '{}' kept for retry: {}",
            project.id(),
            branch,
            err
        );
        return Err(Error::Deploy(err.to_string()));
    }

    repo.delete_branch(&branch).await?;
    log::info!(
        "published project '{}': branch '{}' merged and deleted",
        project.id(),
        branch
    );

    refreshed(project).await
}

/// Throw away the author's pending work by pointing their branch back at
/// master. Works whether or not the branch exists yet. Returns the project
/// re-opened on a fresh handle at the reset state.
pub async fn reset(project: &Project) -> Result<Project> {
    let storage = project.storage();
    let branch = storage.branch().to_string();
    let repo = storage.repo()?;

    let master = repo
        .get_ref(&branch_ref(MASTER_BRANCH))
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "project \"{}\" has no master branch",
                project.id()
            ))
        })?;
    repo.set_ref(&branch_ref(&branch), master).await?;
    log::info!(
        "reset branch '{}' of project '{}' to master",
        branch,
        project.id()
    );

    refreshed(project).await
}

/// Re-open the project for the same author on a fresh handle.
async fn refreshed(project: &Project) -> Result<Project> {
    Project::open(
        project.storage().backend(),
        project.id(),
        project.storage().author(),
        None,
    )
    .await
}
