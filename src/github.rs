use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use octocrab::models::Repository;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;
use crate::error::RemoteError;
use crate::remote::{BranchRef, RemoteRepositoryClient, RepositoryInfo};

/// Upper bound for a single API request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// GitHub client backed by the REST contents API
pub struct GitHubClient {
    client: Octocrab,
    username: String,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

/// Repository summary, with `owner` filling in fields the API left out
fn repository_info(repo: Repository, owner: &str) -> RepositoryInfo {
    let owner = repo.owner.map(|author| author.login).unwrap_or_else(|| owner.to_string());
    let html_url = repo
        .html_url
        .map(|url| url.to_string())
        .unwrap_or_else(|| format!("https://github.com/{}/{}", owner, repo.name));
    RepositoryInfo {
        name: repo.name,
        owner,
        html_url,
        default_branch: repo.default_branch,
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    commit: CommitResponse,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
}

#[derive(Serialize)]
struct CreateRepositoryBody<'a> {
    name: &'a str,
    private: bool,
}

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

#[derive(Serialize)]
struct PutContentBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

impl GitHubClient {
    /// Resolve a token per `config` and connect
    pub async fn from_config(config: &GitHubConfig) -> Result<Self> {
        let (auth_strategy, token) = resolve_token(config)?;

        info!("Using authentication strategy: {:?}", auth_strategy);

        Self::connect(token, config.api_url.as_deref()).await
    }

    /// Connect with an explicit token, optionally to a GitHub Enterprise API URL
    pub async fn connect(token: String, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(api_url) = api_url {
            builder = builder
                .base_uri(api_url)
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }
        let client = builder.build().context("Failed to create GitHub client")?;

        let user = client
            .current()
            .user()
            .await
            .context("Failed to get current user information. Check your authentication.")?;

        info!("Authenticated as GitHub user: {}", user.login);

        Ok(Self {
            client,
            username: user.login,
        })
    }

    /// Get the authenticated username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Look up the blob sha of an existing file, `None` if absent
    async fn file_sha(&self, owner: &str, repo: &str, path: &str, branch: &str) -> Result<Option<String>, RemoteError> {
        let route = format!("/repos/{}/{}/contents/{}", owner, repo, encode_path(path));
        let params = [("ref", branch)];
        let response: Result<ContentResponse, RequestError> = bounded(self.client.get(route, Some(&params))).await;
        match response {
            Ok(content) => Ok(Some(content.sha)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(transport(e)),
        }
    }
}

#[async_trait]
impl RemoteRepositoryClient for GitHubClient {
    async fn create_repository(&self, name: &str, private: bool) -> Result<RepositoryInfo, RemoteError> {
        debug!("Creating repository {} (private: {})", name, private);

        let body = CreateRepositoryBody { name, private };
        let response: Result<Repository, RequestError> = bounded(self.client.post("/user/repos", Some(&body))).await;
        match response {
            Ok(repo) => Ok(repository_info(repo, &self.username)),
            Err(e) if status_of(&e) == Some(422) => Err(RemoteError::AlreadyExists {
                name: name.to_string(),
                message: message_of(&e),
            }),
            Err(e) => Err(transport(e)),
        }
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, RemoteError> {
        let response = bounded(self.client.repos(&self.username, name).get()).await;
        match response {
            Ok(repo) => Ok(Some(repository_info(repo, &self.username))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(transport(e)),
        }
    }

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<Option<BranchRef>, RemoteError> {
        let route = format!("/repos/{}/{}/branches/{}", owner, repo, urlencoding::encode(branch));
        let response: Result<BranchResponse, RequestError> = bounded(self.client.get(route, None::<&()>)).await;
        match response {
            Ok(found) => Ok(Some(BranchRef {
                name: found.name,
                head_commit_sha: found.commit.sha,
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(transport(e)),
        }
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        new_branch: &str,
        base: &BranchRef,
    ) -> Result<(), RemoteError> {
        let route = format!("/repos/{}/{}/git/refs", owner, repo);
        let body = CreateRefBody {
            reference: format!("refs/heads/{}", new_branch),
            sha: &base.head_commit_sha,
        };
        let response: Result<serde_json::Value, RequestError> = bounded(self.client.post(route, Some(&body))).await;
        response
            .map(|_| ())
            .map_err(|e| {
                if is_not_found(&e) {
                    RemoteError::NotFound(format!("{}/{}: {}", owner, repo, message_of(&e)))
                } else {
                    transport(e)
                }
            })
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
        // Overwriting requires the current blob sha.
        let sha = self.file_sha(owner, repo, path, branch).await?;
        if sha.is_some() {
            debug!("Overwriting existing file {}", path);
        }

        let route = format!("/repos/{}/{}/contents/{}", owner, repo, encode_path(path));
        let body = PutContentBody {
            message,
            content: BASE64.encode(content),
            branch,
            sha,
        };
        let response: Result<serde_json::Value, RequestError> = bounded(self.client.put(route, Some(&body))).await;
        response
            .map(|_| ())
            .map_err(transport)
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

/// Run one request with an upper time bound
async fn bounded<T>(request: impl Future<Output = octocrab::Result<T>>) -> Result<T, RequestError> {
    match tokio::time::timeout(REQUEST_TIMEOUT, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(RequestError::Api(e)),
        Err(_) => Err(RequestError::TimedOut),
    }
}

#[derive(Debug)]
enum RequestError {
    Api(octocrab::Error),
    TimedOut,
}

fn status_of(error: &RequestError) -> Option<u16> {
    match error {
        RequestError::Api(octocrab::Error::GitHub { source, .. }) => Some(source.status_code.as_u16()),
        _ => None,
    }
}

fn is_not_found(error: &RequestError) -> bool {
    status_of(error) == Some(404)
}

fn message_of(error: &RequestError) -> String {
    match error {
        RequestError::Api(octocrab::Error::GitHub { source, .. }) => source.message.clone(),
        RequestError::Api(other) => other.to_string(),
        RequestError::TimedOut => format!("request timed out after {}s", REQUEST_TIMEOUT.as_secs()),
    }
}

fn transport(error: RequestError) -> RemoteError {
    RemoteError::Transport(message_of(&error))
}

/// Percent-encode each segment of a repository path
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Detect and obtain a GitHub token
pub fn resolve_token(config: &GitHubConfig) -> Result<(AuthStrategy, String)> {
    match config.auth_method.as_str() {
        "auto" => {
            // Try GitHub CLI first, then environment token
            if let Ok(token) = try_github_cli() {
                Ok((AuthStrategy::GitHubCLI, token))
            } else if let Ok(token) = try_environment_token() {
                Ok((AuthStrategy::EnvironmentToken, token))
            } else {
                Err(anyhow!(
                    "No GitHub authentication found. Please either:\n\
                     1. Install and authenticate GitHub CLI: gh auth login\n\
                     2. Set GITHUB_TOKEN environment variable\n\
                     3. Run: repodrop auth setup"
                ))
            }
        }
        "gh_cli" => {
            let token = try_github_cli().context("GitHub CLI authentication failed. Run: gh auth login")?;
            Ok((AuthStrategy::GitHubCLI, token))
        }
        "token" => {
            let token = try_environment_token()
                .context("GITHUB_TOKEN environment variable not found or invalid")?;
            Ok((AuthStrategy::EnvironmentToken, token))
        }
        other => Err(anyhow!("Unknown auth method: {}", other)),
    }
}

/// Try to get token from GitHub CLI
fn try_github_cli() -> Result<String> {
    debug!("Attempting GitHub CLI authentication");

    if !is_command_available("gh") {
        return Err(anyhow!("GitHub CLI (gh) is not installed"));
    }

    let token_output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to get GitHub CLI token")?;

    if !token_output.status.success() {
        return Err(anyhow!(
            "GitHub CLI is not authenticated: {}",
            String::from_utf8_lossy(&token_output.stderr).trim()
        ));
    }

    let token = String::from_utf8(token_output.stdout)
        .context("GitHub CLI token is not valid UTF-8")?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(anyhow!("GitHub CLI returned empty token"));
    }

    debug!("Successfully obtained token from GitHub CLI");
    Ok(token)
}

/// Try to get token from environment variable
fn try_environment_token() -> Result<String> {
    debug!("Attempting environment variable authentication");

    let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;
    let token = token.trim().to_string();

    if token.is_empty() {
        return Err(anyhow!("GITHUB_TOKEN is empty"));
    }

    if !["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"]
        .iter()
        .any(|prefix| token.starts_with(prefix))
    {
        warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected ghp_, gho_, ghs_, ghu_ or github_pat_ prefix)");
    }

    Ok(token)
}

/// Check if a command is available in PATH
pub fn is_command_available(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Utility functions for GitHub authentication setup
pub mod auth_setup {
    use super::*;

    /// Print how to make a token available
    pub fn setup_authentication() {
        println!("🔧 repodrop Authentication Setup");
        println!();

        if is_command_available("gh") {
            println!("✅ GitHub CLI (gh) is installed");
            if Command::new("gh")
                .args(["auth", "status"])
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false)
            {
                println!("✅ GitHub CLI is already authenticated");
            } else {
                println!("🔄 GitHub CLI needs authentication");
                println!("Run: gh auth login --scopes repo");
            }
            return;
        }

        println!("❌ GitHub CLI (gh) is not installed");
        println!();
        println!("Either install the GitHub CLI and run:");
        println!("   gh auth login --scopes repo");
        println!();
        println!("Or create a token with the 'repo' scope and export it:");
        println!("   export GITHUB_TOKEN=your_token_here");
    }

    /// Connect and report who we are authenticated as
    pub async fn test_authentication(config: &GitHubConfig) -> Result<()> {
        println!("🔍 Testing GitHub authentication...");

        match GitHubClient::from_config(config).await {
            Ok(client) => {
                println!("✅ Authentication successful");
                println!("   Username: {}", client.username());
            }
            Err(e) => {
                println!("❌ Authentication failed: {:#}", e);
                println!();
                println!("To fix this, run: repodrop auth setup");
            }
        }

        Ok(())
    }
}
