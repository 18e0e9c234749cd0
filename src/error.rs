//! Crate-wide error and result types.

use thiserror::Error;

use crate::model::Id;

/// Result type alias for spindle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for spindle
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid caller input (bad project name, malformed selector, ...).
    #[error("{0}")]
    Validation(String),

    /// A referenced project, branch or entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Aggregate form of [`Error::NotFound`] used by the copy selector:
    /// every unresolvable id is reported in one shot.
    #[error("could not find the following ids \"{}\" in the project", .ids.join("\", \""))]
    MissingIds { ids: Vec<Id> },

    /// The operation needs version control and the backing storage has none.
    #[error("this feature is not available for your project")]
    FeatureNotAvailable,

    /// Branch histories diverged and the operation refused to overwrite.
    #[error("{0}")]
    Conflict(String),

    /// The deploy trigger rejected a published project.
    #[error("deploy failed: {0}")]
    Deploy(String),

    /// The job scheduler rejected a spider run.
    #[error("scheduling failed: {0}")]
    Scheduler(String),

    /// Storage backend failure that is not a plain missing entity.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for errors a caller can fix by changing the request,
    /// as opposed to storage faults.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::NotFound(_)
                | Error::MissingIds { .. }
                | Error::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_message_lists_every_id() {
        let err = Error::MissingIds {
            ids: vec!["s1".to_string(), "s2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "could not find the following ids \"s1\", \"s2\" in the project"
        );
    }

    #[test]
    fn feature_not_available_has_fixed_message() {
        assert_eq!(
            Error::FeatureNotAvailable.to_string(),
            "this feature is not available for your project"
        );
    }

    #[test]
    fn caller_errors_are_distinguished_from_faults() {
        assert!(Error::Conflict("diverged".into()).is_caller_error());
        assert!(!Error::Storage("backend down".into()).is_caller_error());
    }
}
