//! repodrop - Publish a local project directory as a new GitHub repository
//!
//! repodrop walks a directory (or an extracted zip archive), honors the
//! project's ignore file, creates a repository and uploads every remaining
//! file through the contents API, reporting progress as it goes.
//!
//! ## Core Features
//!
//! - **Ignore Rules**: gitignore dialect, read from the project root
//! - **Branch Bootstrapping**: uploads to any branch, even in an empty repository
//! - **Partial Failure**: one bad file never aborts the batch
//! - **Progress Events**: monotonic percentages and exactly one terminal event
//!
//! ## Modules
//!
//! - [`sync`]: The upload engine
//! - [`remote`]: The hosting seam and an in-memory implementation
//! - [`github`]: GitHub API integration and authentication
//! - [`config`]: Configuration management and parsing

pub mod branch;
pub mod config;
pub mod error;
pub mod github;
pub mod health;
pub mod ignore_rules;
pub mod plan;
pub mod progress;
pub mod remote;
pub mod source;
pub mod sync;

pub use branch::{BranchBootstrapper, BranchSetup};
pub use config::Config;
pub use error::{RemoteError, SyncError};
pub use github::GitHubClient;
pub use health::HealthCheck;
pub use ignore_rules::IgnoreMatcher;
pub use plan::{FileEntry, UploadPlan};
pub use progress::{ChannelSink, ConsoleSink, ProgressEvent, ProgressSink, RecordingSink};
pub use remote::{BranchRef, InMemoryRemote, RemoteRepositoryClient, RepositoryInfo};
pub use sync::{EngineOptions, SyncEngine, SyncRequest, SyncResult};
