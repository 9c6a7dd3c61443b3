//! Sync Engine - Orchestrates uploading a directory into a remote repository
//!
//! A run is phase separated: the tree is enumerated first so the total is
//! known, then the repository and branch are set up, then every file is
//! written with its own commit. Setup failures abort the run; a failed file
//! is recorded and the loop moves on.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::branch::{BranchBootstrapper, BranchSetup};
use crate::config::UploadConfig;
use crate::error::{RemoteError, SyncError};
use crate::plan::{self, FileEntry, UploadPlan};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::remote::{RemoteRepositoryClient, RepositoryInfo};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Initial commit";

/// What to upload and where
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Extracted project directory
    pub root: PathBuf,
    pub repo_name: String,
    pub private: bool,
    pub branch: String,
    pub commit_message: String,
    /// Upload into the repository if it already exists instead of failing
    pub use_existing: bool,
}

impl SyncRequest {
    pub fn new(root: impl Into<PathBuf>, repo_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            repo_name: repo_name.into(),
            private: false,
            branch: DEFAULT_BRANCH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            use_existing: false,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn use_existing(mut self, use_existing: bool) -> Self {
        self.use_existing = use_existing;
        self
    }
}

/// Result of uploading one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Failed(String),
}

/// A file that could not be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Aggregate outcome of a completed run
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub uploaded_count: usize,
    pub total_count: usize,
    pub failures: Vec<FileFailure>,
    pub repository_url: String,
    pub branch: String,
    pub duration: Duration,
}

impl SyncResult {
    /// Completed, but some files failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Engine tunables, normally taken from [`UploadConfig`]
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub base_branch: String,
    pub ignore_file: String,
    pub placeholder_path: String,
    /// Uploads in flight at once; 1 keeps the run strictly sequential
    pub max_parallel: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            base_branch: DEFAULT_BRANCH.to_string(),
            ignore_file: ".gitignore".to_string(),
            placeholder_path: ".placeholder".to_string(),
            max_parallel: 1,
        }
    }
}

impl From<&UploadConfig> for EngineOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            base_branch: config.base_branch.clone(),
            ignore_file: config.ignore_file.clone(),
            placeholder_path: config.placeholder_path.clone(),
            max_parallel: config.max_parallel.max(1),
        }
    }
}

/// The main engine that uploads a directory into a remote repository
#[derive(Clone)]
pub struct SyncEngine {
    client: Arc<dyn RemoteRepositoryClient>,
    options: EngineOptions,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn RemoteRepositoryClient>, options: EngineOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run a complete upload and emit exactly one terminal event to `sink`
    ///
    /// A cancelled run emits no terminal event since nobody is listening.
    pub async fn run(&self, request: &SyncRequest, sink: &dyn ProgressSink) -> Result<SyncResult, SyncError> {
        match self.execute(request, sink).await {
            Ok(result) => {
                sink.emit(ProgressEvent::success(&result));
                Ok(result)
            }
            Err(e @ SyncError::Cancelled { .. }) => {
                warn!("{}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Upload of '{}' failed: {}", request.repo_name, e);
                sink.emit(ProgressEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Build the upload plan without touching the remote
    pub fn plan(&self, request: &SyncRequest) -> Result<UploadPlan, SyncError> {
        plan::enumerate(&request.root, &self.options.ignore_file)
    }

    async fn execute(&self, request: &SyncRequest, sink: &dyn ProgressSink) -> Result<SyncResult, SyncError> {
        let start_time = Instant::now();

        let repo_name = sanitize_repo_name(&request.repo_name);
        if repo_name.is_empty() {
            return Err(SyncError::Validation("Repository name is required.".to_string()));
        }
        let branch = request.branch.trim();
        if branch.is_empty() {
            return Err(SyncError::Validation("Branch name is required.".to_string()));
        }
        let commit_message = match request.commit_message.trim() {
            "" => DEFAULT_COMMIT_MESSAGE,
            message => message,
        };

        sink.emit(ProgressEvent::progress("Scanning project files..."));
        let plan = self.plan(request)?;
        sink.emit(ProgressEvent::progress(format!("Found {} files to upload", plan.total())));

        sink.emit(ProgressEvent::progress(format!("Creating repository '{}'...", repo_name)));
        let repository = self.create_repository(&repo_name, request).await?;

        if branch != self.options.base_branch {
            sink.emit(ProgressEvent::progress(format!("Creating branch '{}'...", branch)));
        }
        let bootstrapper = BranchBootstrapper::new(&self.options.base_branch, &self.options.placeholder_path);
        let setup = bootstrapper
            .ensure_branch(self.client.as_ref(), &repository.owner, &repository.name, branch)
            .await?;
        debug!("Branch setup for '{}': {:?}", branch, setup);
        if setup == BranchSetup::Existing {
            sink.emit(ProgressEvent::progress(format!("Using existing branch '{}'", branch)));
        }

        sink.emit(ProgressEvent::progress("Starting file upload..."));
        let (uploaded_count, failures) = self
            .upload_all(&plan, &repository, branch, commit_message, sink)
            .await?;

        let duration = start_time.elapsed();
        info!(
            "Upload completed in {:.2}s: {} of {} files, {} failed",
            duration.as_secs_f64(),
            uploaded_count,
            plan.total(),
            failures.len()
        );

        Ok(SyncResult {
            uploaded_count,
            total_count: plan.total(),
            failures,
            repository_url: repository.html_url,
            branch: branch.to_string(),
            duration,
        })
    }

    async fn create_repository(&self, name: &str, request: &SyncRequest) -> Result<RepositoryInfo, SyncError> {
        match self.client.create_repository(name, request.private).await {
            Ok(info) => {
                info!("Created repository {}/{} on {}", info.owner, info.name, self.client.provider_name());
                Ok(info)
            }
            Err(RemoteError::AlreadyExists { message, .. }) if request.use_existing => {
                debug!("Repository '{}' not created ({}), looking it up", name, message);
                match self.client.find_repository(name).await {
                    Ok(Some(info)) => {
                        info!("Uploading into existing repository {}/{}", info.owner, info.name);
                        Ok(info)
                    }
                    Ok(None) => Err(SyncError::AlreadyExists { name: name.to_string() }),
                    Err(source) => Err(SyncError::Repository {
                        name: name.to_string(),
                        source,
                    }),
                }
            }
            Err(RemoteError::AlreadyExists { .. }) => Err(SyncError::AlreadyExists { name: name.to_string() }),
            Err(source) => Err(SyncError::Repository {
                name: name.to_string(),
                source,
            }),
        }
    }

    async fn upload_all(
        &self,
        plan: &UploadPlan,
        repository: &RepositoryInfo,
        branch: &str,
        commit_message: &str,
        sink: &dyn ProgressSink,
    ) -> Result<(usize, Vec<FileFailure>), SyncError> {
        let total = plan.total();
        if total == 0 {
            sink.emit(ProgressEvent::progress_at("No files to upload", 100));
            return Ok((0, Vec::new()));
        }

        let client = self.client.as_ref();
        // `buffered` yields in plan order, so this loop is the only place
        // counters change and percentages stay monotonic.
        let mut uploads = stream::iter(plan.entries())
            .map(|entry| async move {
                let outcome = upload_file(client, repository, entry, commit_message, branch).await;
                (entry, outcome)
            })
            .buffered(self.options.max_parallel.max(1));

        let mut completed = 0usize;
        let mut uploaded_count = 0usize;
        let mut failures = Vec::new();

        loop {
            // Once every file was attempted the run is complete, listener or not.
            if completed < total && sink.is_closed() {
                return Err(SyncError::Cancelled {
                    uploaded: uploaded_count,
                    total,
                });
            }
            let Some((entry, outcome)) = uploads.next().await else {
                break;
            };

            completed += 1;
            let percent = progress_percent(completed, total);
            match outcome {
                UploadOutcome::Uploaded => {
                    uploaded_count += 1;
                    debug!("Uploaded {}", entry.relative_path);
                    sink.emit(ProgressEvent::progress_at(
                        format!("Uploaded: {}", entry.relative_path),
                        percent,
                    ));
                }
                UploadOutcome::Failed(reason) => {
                    warn!("Error uploading {}: {}", entry.relative_path, reason);
                    sink.emit(ProgressEvent::ItemError {
                        path: entry.relative_path.clone(),
                        reason: reason.clone(),
                        percent,
                    });
                    failures.push(FileFailure {
                        path: entry.relative_path.clone(),
                        reason,
                    });
                }
            }
        }

        Ok((uploaded_count, failures))
    }
}

async fn upload_file(
    client: &dyn RemoteRepositoryClient,
    repository: &RepositoryInfo,
    entry: &FileEntry,
    commit_message: &str,
    branch: &str,
) -> UploadOutcome {
    let content = match tokio::fs::read(&entry.absolute_path).await {
        Ok(content) => content,
        Err(e) => return UploadOutcome::Failed(format!("failed to read file: {}", e)),
    };

    match client
        .put_file(
            &repository.owner,
            &repository.name,
            &entry.relative_path,
            commit_message,
            &content,
            branch,
        )
        .await
    {
        Ok(()) => UploadOutcome::Uploaded,
        Err(e) => UploadOutcome::Failed(e.to_string()),
    }
}

/// Percent of `total` attempted after `completed` attempts
///
/// Rounded to the nearest integer but held below 100 until the last file,
/// so 100 always means "every file attempted". An empty plan is complete.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 || completed >= total {
        return 100;
    }
    let percent = (completed as f64 / total as f64 * 100.0).round() as u8;
    percent.min(99)
}

/// Make a user-supplied name acceptable as a repository name
///
/// Characters other than ASCII letters, digits, `-`, `_` and `.` become
/// `-`, runs of `-` collapse to one, and leading/trailing `-` are dropped.
pub fn sanitize_repo_name(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    replaced
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
