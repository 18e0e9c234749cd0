//! Versioned storage and workflows for visual scraping projects.
//!
//! A project is a tree of files (manifest, spiders, sample pages, shared
//! schema and extractor registries) checked out through a
//! [`store::ProjectStorage`] handle. Each author edits on a branch named
//! after them; publishing merges that branch into master and retires it,
//! resetting throws the branch's changes away. On top of the versioned tree
//! sit the change reporter, the publish and reset workflows, the
//! cross-project copy engine and the spider scheduling glue, all under
//! [`logic`].
//!
//! Two backends ship with the crate: [`store::VersionedStore`] with full
//! commit history and [`store::MemoryStore`], which keeps only the latest
//! tree and answers version-control operations with
//! [`Error::FeatureNotAvailable`].

pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use config::{AppConfig, BackendKind};
pub use error::{Error, Result};

// Export logic types
pub use logic::{
    changed_files, copy_from, has_changes, project_status, publish, reset, schedule_spider,
    CopyEntity, CopyOutcome, CopySelection, DeployTrigger, EntitySerializer, JobScheduler,
    JsonApiSerializer, NoopDeployTrigger, ProjectStatus, ScheduledJob,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{
    branch_ref, ChangeKind, ChangedFile, CommitInfo, FileTree, MemoryStore, ProjectStorage,
    Snapshot, StorageBackend, VersionControl, VersionedStore, MASTER_BRANCH,
};
