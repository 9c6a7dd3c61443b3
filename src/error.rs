//! Error types for the upload pipeline.
//!
//! [`RemoteError`] is what a [`RemoteRepositoryClient`](crate::remote::RemoteRepositoryClient)
//! returns; [`SyncError`] is what a whole [`SyncEngine`](crate::sync::SyncEngine) run
//! returns when it cannot finish. Per-file upload failures are *not* errors:
//! they are collected into [`SyncResult::failures`](crate::sync::SyncResult).

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a remote repository client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Repository name collides with an existing one or is rejected by the host
    #[error("Repository '{name}' already exists or name is invalid: {message}")]
    AlreadyExists { name: String, message: String },

    /// Referenced repository, branch or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network, authorization, rate-limit or any other remote failure
    #[error("{0}")]
    Transport(String),
}

/// Failures that abort a synchronization run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to scan {}: {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository '{name}' already exists or name is invalid. Choose a different name.")]
    AlreadyExists { name: String },

    #[error("Failed to set up repository '{name}': {source}")]
    Repository {
        name: String,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to prepare branch '{branch}': {message}")]
    Branch { branch: String, message: String },

    #[error("Upload cancelled after {uploaded} of {total} files")]
    Cancelled { uploaded: usize, total: usize },
}

impl SyncError {
    pub(crate) fn branch(branch: &str, message: impl Into<String>) -> Self {
        SyncError::Branch {
            branch: branch.to_string(),
            message: message.into(),
        }
    }

    /// Whether the caller can fix this by picking another repository name
    pub fn is_name_collision(&self) -> bool {
        matches!(self, SyncError::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_messages_are_verbatim() {
        let err = RemoteError::Transport("Bad credentials".to_string());
        assert_eq!(err.to_string(), "Bad credentials");
    }

    #[test]
    fn test_branch_error_keeps_remote_message() {
        let err = SyncError::branch("feature-x", "Reference already exists");
        assert_eq!(
            err.to_string(),
            "Failed to prepare branch 'feature-x': Reference already exists"
        );
        assert!(!err.is_name_collision());
    }

    #[test]
    fn test_name_collision_is_distinct() {
        let err = SyncError::AlreadyExists {
            name: "demo".to_string(),
        };
        assert!(err.is_name_collision());
        assert!(err.to_string().contains("demo"));
    }
}
