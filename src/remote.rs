//! Remote repository abstraction layer
//!
//! The engine only needs four primitives from a hosting provider: create a
//! repository, read a branch, fork a branch and write one file. They are
//! expressed as the [`RemoteRepositoryClient`] trait so the engine can run
//! against GitHub ([`GitHubClient`](crate::github::GitHubClient)) or against
//! [`InMemoryRemote`] in tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::error::RemoteError;

/// A repository as reported by the host after creation or lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub name: String,
    pub owner: String,
    /// Canonical browser URL
    pub html_url: String,
    pub default_branch: Option<String>,
}

/// A branch and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub head_commit_sha: String,
}

/// Capability interface over a remote source-control host
#[async_trait]
pub trait RemoteRepositoryClient: Send + Sync {
    /// Create a repository owned by the authenticated user
    async fn create_repository(&self, name: &str, private: bool) -> Result<RepositoryInfo, RemoteError>;

    /// Look up a repository owned by the authenticated user
    async fn find_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, RemoteError>;

    /// Read a branch; a missing branch is `Ok(None)`
    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<Option<BranchRef>, RemoteError>;

    /// Create `new_branch` pointing at the head of `base`
    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        new_branch: &str,
        base: &BranchRef,
    ) -> Result<(), RemoteError>;

    /// Create or overwrite one file on `branch` as a single commit
    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &[u8],
        branch: &str,
    ) -> Result<(), RemoteError>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// A call made against [`InMemoryRemote`], recorded in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateRepository { name: String, private: bool },
    FindRepository { name: String },
    GetBranch { repo: String, branch: String },
    CreateBranch { repo: String, branch: String, from_sha: String },
    PutFile { repo: String, path: String, branch: String, message: String },
}

#[derive(Debug, Default)]
struct MemoryRepo {
    info: Option<RepositoryInfo>,
    private: bool,
    branches: HashMap<String, MemoryBranch>,
}

#[derive(Debug, Clone, Default)]
struct MemoryBranch {
    head: String,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    repos: HashMap<String, MemoryRepo>,
    commits: u64,
    put_calls: usize,
    calls: Vec<RemoteCall>,
    fail_put_calls: HashSet<usize>,
    fail_paths: HashSet<String>,
    create_failure: Option<RemoteError>,
}

/// Remote host kept entirely in memory
///
/// Models the behavior the engine depends on: a new repository has no
/// branches until its first write, every write is one commit, writes
/// overwrite, and forking a branch requires an existing base. Failures can
/// be injected per `put_file` call number (1-based) or per path.
#[derive(Debug)]
pub struct InMemoryRemote {
    owner: String,
    state: Mutex<MemoryState>,
}

impl InMemoryRemote {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Pre-create a repository as if another run had made it
    pub fn with_repository(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            let info = self.info_for(name);
            state.repos.insert(
                name.to_string(),
                MemoryRepo {
                    info: Some(info),
                    ..Default::default()
                },
            );
        }
        self
    }

    /// Fail the `n`th `put_file` call (1-based) with a transport error
    pub fn fail_put_call(self, n: usize) -> Self {
        self.lock().fail_put_calls.insert(n);
        self
    }

    /// Fail every `put_file` for `path`
    pub fn fail_path(self, path: &str) -> Self {
        self.lock().fail_paths.insert(path.to_string());
        self
    }

    /// Fail the next `create_repository` with `error`
    pub fn fail_create(self, error: RemoteError) -> Self {
        self.lock().create_failure = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of `put_file` calls received, failed ones included
    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    /// Paths on `branch`, sorted
    pub fn files(&self, repo: &str, branch: &str) -> Vec<String> {
        self.lock()
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch))
            .map(|b| b.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn file_content(&self, repo: &str, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch))
            .and_then(|b| b.files.get(path).cloned())
    }

    pub fn branch_head(&self, repo: &str, branch: &str) -> Option<String> {
        self.lock()
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch))
            .map(|b| b.head.clone())
    }

    pub fn is_private(&self, repo: &str) -> Option<bool> {
        self.lock().repos.get(repo).map(|r| r.private)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn info_for(&self, name: &str) -> RepositoryInfo {
        RepositoryInfo {
            name: name.to_string(),
            owner: self.owner.clone(),
            html_url: format!("https://github.com/{}/{}", self.owner, name),
            default_branch: Some("main".to_string()),
        }
    }

    fn check_owner(&self, owner: &str) -> Result<(), RemoteError> {
        if owner == self.owner {
            Ok(())
        } else {
            Err(RemoteError::NotFound(format!("owner {}", owner)))
        }
    }
}

fn next_sha(state: &mut MemoryState) -> String {
    state.commits += 1;
    format!("{:040x}", state.commits)
}

#[async_trait]
impl RemoteRepositoryClient for InMemoryRemote {
    async fn create_repository(&self, name: &str, private: bool) -> Result<RepositoryInfo, RemoteError> {
        let info = self.info_for(name);
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateRepository {
            name: name.to_string(),
            private,
        });

        if let Some(error) = state.create_failure.take() {
            return Err(error);
        }
        if state.repos.contains_key(name) {
            return Err(RemoteError::AlreadyExists {
                name: name.to_string(),
                message: "name already exists on this account".to_string(),
            });
        }

        state.repos.insert(
            name.to_string(),
            MemoryRepo {
                info: Some(info.clone()),
                private,
                branches: HashMap::new(),
            },
        );
        Ok(info)
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FindRepository {
            name: name.to_string(),
        });
        Ok(state.repos.get(name).and_then(|r| r.info.clone()))
    }

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<Option<BranchRef>, RemoteError> {
        self.check_owner(owner)?;
        let mut state = self.lock();
        state.calls.push(RemoteCall::GetBranch {
            repo: repo.to_string(),
            branch: branch.to_string(),
        });

        let repository = state
            .repos
            .get(repo)
            .ok_or_else(|| RemoteError::NotFound(format!("repository {}", repo)))?;
        Ok(repository.branches.get(branch).map(|b| BranchRef {
            name: branch.to_string(),
            head_commit_sha: b.head.clone(),
        }))
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        new_branch: &str,
        base: &BranchRef,
    ) -> Result<(), RemoteError> {
        self.check_owner(owner)?;
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateBranch {
            repo: repo.to_string(),
            branch: new_branch.to_string(),
            from_sha: base.head_commit_sha.clone(),
        });

        let repository = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| RemoteError::NotFound(format!("repository {}", repo)))?;

        if repository.branches.contains_key(new_branch) {
            return Err(RemoteError::Transport("Reference already exists".to_string()));
        }
        let base_branch = repository
            .branches
            .get(&base.name)
            .filter(|b| b.head == base.head_commit_sha)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("branch {}", base.name)))?;

        repository.branches.insert(new_branch.to_string(), base_branch);
        Ok(())
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &[u8],
        branch: &str,
    ) -> Result<(), RemoteError> {
        self.check_owner(owner)?;
        let mut state = self.lock();
        state.put_calls += 1;
        let call_number = state.put_calls;
        state.calls.push(RemoteCall::PutFile {
            repo: repo.to_string(),
            path: path.to_string(),
            branch: branch.to_string(),
            message: message.to_string(),
        });

        if state.fail_put_calls.contains(&call_number) || state.fail_paths.contains(path) {
            return Err(RemoteError::Transport(format!(
                "injected failure writing {}",
                path
            )));
        }

        let sha = next_sha(&mut state);
        let repository = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| RemoteError::NotFound(format!("repository {}", repo)))?;

        // A branch is born from the first commit of an empty repository only.
        if !repository.branches.contains_key(branch) && !repository.branches.is_empty() {
            return Err(RemoteError::NotFound(format!("branch {}", branch)));
        }
        let target = repository.branches.entry(branch.to_string()).or_default();

        target.files.insert(path.to_string(), content.to_vec());
        target.head = sha;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_first_write_creates_branch() {
        let remote = InMemoryRemote::new("octocat");
        remote.create_repository("demo", false).await.unwrap();

        assert_eq!(remote.get_branch("octocat", "demo", "main").await.unwrap(), None);

        remote
            .put_file("octocat", "demo", "a.txt", "Initial commit", b"a", "main")
            .await
            .unwrap();

        let main = remote.get_branch("octocat", "demo", "main").await.unwrap().unwrap();
        assert_eq!(main.name, "main");
        assert_eq!(remote.files("demo", "main"), vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_write_to_missing_branch_after_first_commit_fails() {
        let remote = InMemoryRemote::new("octocat");
        remote.create_repository("demo", false).await.unwrap();
        remote
            .put_file("octocat", "demo", "a.txt", "m", b"a", "main")
            .await
            .unwrap();

        let result = remote.put_file("octocat", "demo", "b.txt", "m", b"b", "dev").await;
        assert_matches!(result, Err(RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_put_overwrites_and_advances_head() {
        let remote = InMemoryRemote::new("octocat");
        remote.create_repository("demo", false).await.unwrap();
        remote.put_file("octocat", "demo", "a.txt", "m", b"v1", "main").await.unwrap();
        let first = remote.branch_head("demo", "main").unwrap();
        remote.put_file("octocat", "demo", "a.txt", "m", b"v2", "main").await.unwrap();

        assert_ne!(remote.branch_head("demo", "main").unwrap(), first);
        assert_eq!(remote.file_content("demo", "main", "a.txt"), Some(b"v2".to_vec()));
        assert_eq!(remote.files("demo", "main").len(), 1);
    }

    #[tokio::test]
    async fn test_create_branch_requires_base() {
        let remote = InMemoryRemote::new("octocat");
        remote.create_repository("demo", true).await.unwrap();
        assert_eq!(remote.is_private("demo"), Some(true));

        let missing = BranchRef {
            name: "main".to_string(),
            head_commit_sha: "0".repeat(40),
        };
        let result = remote.create_branch("octocat", "demo", "feature", &missing).await;
        assert_matches!(result, Err(RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_repository_is_already_exists() {
        let remote = InMemoryRemote::new("octocat").with_repository("demo");
        let result = remote.create_repository("demo", false).await;
        assert_matches!(result, Err(RemoteError::AlreadyExists { .. }));

        let found = remote.find_repository("demo").await.unwrap().unwrap();
        assert_eq!(found.html_url, "https://github.com/octocat/demo");
    }

    #[tokio::test]
    async fn test_injected_put_failure() {
        let remote = InMemoryRemote::new("octocat").fail_put_call(2);
        remote.create_repository("demo", false).await.unwrap();

        assert!(remote.put_file("octocat", "demo", "a", "m", b"", "main").await.is_ok());
        assert_matches!(
            remote.put_file("octocat", "demo", "b", "m", b"", "main").await,
            Err(RemoteError::Transport(_))
        );
        assert!(remote.put_file("octocat", "demo", "c", "m", b"", "main").await.is_ok());
        assert_eq!(remote.put_calls(), 3);
        assert_eq!(remote.files("demo", "main"), vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_put_records_commit_message() {
        let remote = InMemoryRemote::new("octocat");
        remote.create_repository("demo", false).await.unwrap();
        remote
            .put_file("octocat", "demo", "a.txt", "Import project", b"a", "main")
            .await
            .unwrap();

        assert_eq!(
            remote.calls().last(),
            Some(&RemoteCall::PutFile {
                repo: "demo".to_string(),
                path: "a.txt".to_string(),
                branch: "main".to_string(),
                message: "Import project".to_string(),
            })
        );
    }
}
