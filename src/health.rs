//! Preflight checks behind `repodrop doctor`

use crate::config::Config;
use crate::github::{is_command_available, GitHubClient};
use std::path::Path;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// GitHub authentication status
    pub github_auth: CheckResult,
    /// Configuration file status
    pub config_file: CheckResult,
    /// `unzip` availability (warning only, directories still work)
    pub unzip: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks against the configuration loaded from `config_path`
    pub async fn run(config: &Config, config_path: &Path) -> Self {
        Self {
            github_auth: Self::check_github_auth(config).await,
            config_file: Self::check_config_file(config_path),
            unzip: Self::check_unzip(),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.github_auth.passed && self.config_file.passed
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        [&self.github_auth, &self.config_file, &self.unzip]
            .into_iter()
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        [&self.github_auth, &self.config_file, &self.unzip]
            .into_iter()
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check GitHub authentication
    async fn check_github_auth(config: &Config) -> CheckResult {
        match GitHubClient::from_config(&config.github).await {
            Ok(client) => CheckResult::ok_with_details(
                "GitHub authentication successful",
                format!("Username: {}", client.username()),
            ),
            Err(e) => CheckResult::error_with_details(
                "GitHub authentication failed",
                format!("{:#}\nRun: repodrop auth setup", e),
            ),
        }
    }

    /// Check the configuration file parses; a missing one means defaults
    fn check_config_file(path: &Path) -> CheckResult {
        if !path.exists() {
            return CheckResult::warning_with_details(
                "No configuration file, using defaults",
                "Run: repodrop init",
            );
        }

        match Config::load(path) {
            Ok(_) => CheckResult::ok_with_details("Configuration valid", path.display().to_string()),
            Err(e) => CheckResult::error_with_details("Configuration invalid", format!("{:#}", e)),
        }
    }

    /// Check `unzip` for archive sources (warning only)
    fn check_unzip() -> CheckResult {
        if is_command_available("unzip") {
            CheckResult::ok("unzip available for .zip sources")
        } else {
            CheckResult::warning_with_details(
                "unzip not found in PATH",
                "Zip archives cannot be uploaded; directories still work",
            )
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 3] {
        [
            ("GitHub Authentication", &self.github_auth),
            ("Configuration", &self.config_file),
            ("Archive Support", &self.unzip),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("Test passed");
        assert!(result.passed);
        assert!(!result.is_warning);
        assert!(result.details.is_none());
    }

    #[test]
    fn test_check_result_warning_with_details() {
        let result = CheckResult::warning_with_details("Test warning", "Warning details");
        assert!(result.passed); // Warnings still "pass"
        assert!(result.is_warning);
        assert_eq!(result.details, Some("Warning details".to_string()));
    }

    #[test]
    fn test_check_result_error_with_details() {
        let result = CheckResult::error_with_details("Test failed", "Error details");
        assert!(!result.passed);
        assert!(!result.is_warning);
        assert_eq!(result.details, Some("Error details".to_string()));
    }

    #[test]
    fn test_missing_config_is_a_warning() {
        let temp_dir = TempDir::new().unwrap();
        let result = HealthCheck::check_config_file(&temp_dir.path().join("config.yml"));
        assert!(result.passed);
        assert!(result.is_warning);
    }

    #[test]
    fn test_valid_config_passes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        Config::default().save(&path).unwrap();

        let result = HealthCheck::check_config_file(&path);
        assert!(result.passed);
        assert!(!result.is_warning);
    }

    #[test]
    fn test_broken_config_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(&path, "upload: [not, a, map").unwrap();

        let result = HealthCheck::check_config_file(&path);
        assert!(!result.passed);
        assert!(result.details.is_some());
    }

    #[tokio::test]
    async fn test_run_checks_the_given_config_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yml");
        let mut config = Config::default();
        config.github.auth_method = "unsupported".to_string();
        config.save(&path).unwrap();

        let health = HealthCheck::run(&config, &path).await;

        assert!(health.config_file.passed);
        assert!(!health.config_file.is_warning);
        assert_eq!(health.config_file.details, Some(path.display().to_string()));
        assert!(!health.github_auth.passed);
        assert_eq!(health.errors().len(), 1);
    }

    #[test]
    fn test_check_unzip() {
        let result = HealthCheck::check_unzip();
        // Depends on the system, but never a hard failure
        assert!(result.passed);
    }

    #[test]
    fn test_all_passed_ignores_warnings() {
        let health = HealthCheck {
            github_auth: CheckResult::ok("Auth OK"),
            config_file: CheckResult::ok("Config OK"),
            unzip: CheckResult::warning_with_details("No unzip", "details"),
        };
        assert!(health.all_passed());
        assert!(health.errors().is_empty());
        assert_eq!(health.warnings().len(), 1);
    }

    #[test]
    fn test_all_passed_with_failing_auth() {
        let health = HealthCheck {
            github_auth: CheckResult::error_with_details("Auth failed", "Bad credentials"),
            config_file: CheckResult::ok("Config OK"),
            unzip: CheckResult::ok("unzip OK"),
        };
        assert!(!health.all_passed());
        assert_eq!(health.errors().len(), 1);
    }

    #[test]
    fn test_all_checks_returns_all_three() {
        let health = HealthCheck {
            github_auth: CheckResult::ok("Auth OK"),
            config_file: CheckResult::ok("Config OK"),
            unzip: CheckResult::ok("unzip OK"),
        };
        let checks = health.all_checks();
        assert_eq!(checks[0].0, "GitHub Authentication");
        assert_eq!(checks[1].0, "Configuration");
        assert_eq!(checks[2].0, "Archive Support");
    }
}
