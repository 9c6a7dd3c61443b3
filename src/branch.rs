//! Branch bootstrapping
//!
//! The contents API has no way to create an empty repository with a default
//! branch: a branch is born from its first commit. Any branch other than the
//! base therefore has to be forked from a base that already has a commit,
//! and in a brand-new repository that commit is a placeholder file.

use tracing::{debug, info};

use crate::error::SyncError;
use crate::remote::{BranchRef, RemoteRepositoryClient};

/// Content of the file written to materialize an empty base branch
pub const PLACEHOLDER_CONTENT: &[u8] = b"init";

/// Commit message used for the placeholder file
pub const PLACEHOLDER_MESSAGE: &str = "Initial commit";

/// What [`BranchBootstrapper::ensure_branch`] had to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSetup {
    /// Target is the base branch; the first upload creates it
    Default,
    /// Target branch already existed
    Existing,
    /// Target branch was forked from the base head
    Created { from_sha: String, bootstrapped: bool },
}

/// Ensures a target branch exists before uploads start
#[derive(Debug, Clone)]
pub struct BranchBootstrapper {
    base_branch: String,
    placeholder_path: String,
}

impl BranchBootstrapper {
    pub fn new(base_branch: impl Into<String>, placeholder_path: impl Into<String>) -> Self {
        Self {
            base_branch: base_branch.into(),
            placeholder_path: placeholder_path.into(),
        }
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub async fn ensure_branch(
        &self,
        client: &dyn RemoteRepositoryClient,
        owner: &str,
        repo: &str,
        target: &str,
    ) -> Result<BranchSetup, SyncError> {
        if target == self.base_branch {
            debug!("Target branch '{}' is the base branch, nothing to create", target);
            return Ok(BranchSetup::Default);
        }

        let existing = client
            .get_branch(owner, repo, target)
            .await
            .map_err(|e| SyncError::branch(target, e.to_string()))?;
        if existing.is_some() {
            info!("Branch '{}' already exists in {}/{}", target, owner, repo);
            return Ok(BranchSetup::Existing);
        }

        let mut bootstrapped = false;
        let base = match self.fetch_base(client, owner, repo, target).await? {
            Some(base) => base,
            None => {
                info!(
                    "Base branch '{}' missing in {}/{}, writing {}",
                    self.base_branch, owner, repo, self.placeholder_path
                );
                client
                    .put_file(
                        owner,
                        repo,
                        &self.placeholder_path,
                        PLACEHOLDER_MESSAGE,
                        PLACEHOLDER_CONTENT,
                        &self.base_branch,
                    )
                    .await
                    .map_err(|e| {
                        SyncError::branch(
                            target,
                            format!("failed to initialize '{}': {}", self.base_branch, e),
                        )
                    })?;
                bootstrapped = true;

                self.fetch_base(client, owner, repo, target).await?.ok_or_else(|| {
                    SyncError::branch(
                        target,
                        format!("base branch '{}' still missing after initial commit", self.base_branch),
                    )
                })?
            }
        };

        client
            .create_branch(owner, repo, target, &base)
            .await
            .map_err(|e| SyncError::branch(target, e.to_string()))?;

        info!(
            "Created branch '{}' from '{}' at {}",
            target, base.name, base.head_commit_sha
        );

        Ok(BranchSetup::Created {
            from_sha: base.head_commit_sha,
            bootstrapped,
        })
    }

    async fn fetch_base(
        &self,
        client: &dyn RemoteRepositoryClient,
        owner: &str,
        repo: &str,
        target: &str,
    ) -> Result<Option<BranchRef>, SyncError> {
        client
            .get_branch(owner, repo, &self.base_branch)
            .await
            .map_err(|e| SyncError::branch(target, e.to_string()))
    }
}

impl Default for BranchBootstrapper {
    fn default() -> Self {
        Self::new("main", ".placeholder")
    }
}
