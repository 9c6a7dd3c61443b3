use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repodrop::config::{expand_path, LoggingConfig};
use repodrop::github::auth_setup;
use repodrop::plan;
use repodrop::source::prepare_source;
use repodrop::{Config, ConsoleSink, EngineOptions, GitHubClient, HealthCheck, SyncEngine, SyncRequest};

#[derive(Parser)]
#[command(name = "repodrop")]
#[command(about = "Publish a local project directory as a new GitHub repository")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repository and upload a directory or .zip archive into it
    Upload {
        /// Project directory or .zip archive
        source: String,

        /// Repository name (defaults to the source name)
        #[arg(short, long)]
        name: Option<String>,

        /// Create a private repository
        #[arg(long)]
        private: bool,

        /// Branch to upload to
        #[arg(short, long)]
        branch: Option<String>,

        /// Commit message for every uploaded file
        #[arg(short, long)]
        message: Option<String>,

        /// Upload into the repository if it already exists
        #[arg(long)]
        existing: bool,

        /// Print progress events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show which files would be uploaded
    Plan {
        /// Project directory or .zip archive
        source: String,
    },

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Write a default configuration file
    Init {
        /// Reset the configuration to defaults
        #[arg(long)]
        force: bool,
    },

    /// System health check and diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Set up authentication
    Setup,

    /// Show authentication status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    init_logging(cli.verbose, &config.logging)?;
    debug!("Starting repodrop v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Upload {
            source,
            name,
            private,
            branch,
            message,
            existing,
            json,
        } => {
            let args = UploadArgs {
                source,
                name,
                private,
                branch,
                message,
                existing,
                json,
            };
            // Exit only after cmd_upload returned, so an extracted archive
            // is already removed from disk.
            let code = cmd_upload(args, &config).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Plan { source } => cmd_plan(&source, &config).await,
        Commands::Auth { auth_command } => cmd_auth(auth_command, &config).await,
        Commands::Init { force } => cmd_init(force, &config),
        Commands::Doctor => {
            let config_path = match cli.config {
                Some(path) => path,
                None => Config::default_config_path()?,
            };
            cmd_doctor(&config, &config_path).await
        }
    }
}

/// Initialize logging on stderr so stdout stays free for progress
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(logging.color);

    if logging.format == "compact" {
        tracing_subscriber::registry()
            .with(layer.compact())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry().with(layer).with(filter).init();
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

struct UploadArgs {
    source: String,
    name: Option<String>,
    private: bool,
    branch: Option<String>,
    message: Option<String>,
    existing: bool,
    json: bool,
}

/// Upload a project into a new repository, returning the process exit code
async fn cmd_upload(args: UploadArgs, config: &Config) -> Result<i32> {
    let source_path = expand_path(&args.source)?;
    let repo_name = match args.name {
        Some(name) => name,
        None => default_repo_name(&source_path)?,
    };

    let prepared = prepare_source(&source_path).await?;
    let client = GitHubClient::from_config(&config.github).await?;
    info!("Uploading {} as {}/{}", source_path.display(), client.username(), repo_name);

    let engine = SyncEngine::new(Arc::new(client), EngineOptions::from(&config.upload));
    let request = SyncRequest::new(prepared.root(), repo_name)
        .private(args.private || config.upload.private)
        .with_branch(args.branch.unwrap_or_else(|| config.upload.branch.clone()))
        .with_commit_message(args.message.unwrap_or_else(|| config.upload.commit_message.clone()))
        .use_existing(args.existing);

    let sink = if args.json {
        ConsoleSink::json()
    } else {
        ConsoleSink::human()
    };

    // The terminal event already told the user what happened.
    let code = match engine.run(&request, &sink).await {
        Ok(result) if result.is_partial() => 2,
        Ok(_) => 0,
        Err(_) => 1,
    };
    Ok(code)
}

/// Print the files an upload would send
async fn cmd_plan(source: &str, config: &Config) -> Result<()> {
    let source_path = expand_path(source)?;
    let prepared = prepare_source(&source_path).await?;

    let upload_plan = plan::enumerate(prepared.root(), &config.upload.ignore_file)?;

    println!("📋 Upload plan for {}", source_path.display());
    match upload_plan.ignore_file() {
        Some(ignore_file) => println!("   Ignore rules: {}", ignore_file.display()),
        None => println!("   Ignore rules: none ({} not found)", config.upload.ignore_file),
    }
    println!();

    for path in upload_plan.relative_paths() {
        println!("  📄 {}", path);
    }

    println!();
    println!("   📊 Files to upload: {}", upload_plan.total());
    println!("   ⏭️  Ignored entries: {}", upload_plan.ignored_count());

    Ok(())
}

/// Handle authentication commands
async fn cmd_auth(auth_command: AuthCommands, config: &Config) -> Result<()> {
    match auth_command {
        AuthCommands::Setup => {
            auth_setup::setup_authentication();
            Ok(())
        }
        AuthCommands::Status => auth_setup::test_authentication(&config.github).await,
    }
}

/// Write the configuration file, resetting it to defaults with `force`
fn cmd_init(force: bool, config: &Config) -> Result<()> {
    let config_path = Config::default_config_path()?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let new_config = if force { Config::default() } else { config.clone() };
    new_config.save(&config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ repodrop initialized successfully!");
    println!("   Config: {}", config_path.display());
    println!("   Default branch: {}", new_config.upload.branch);
    println!("   Next: run 'repodrop auth status' to check GitHub access");

    Ok(())
}

/// System health check and diagnostics
async fn cmd_doctor(config: &Config, config_path: &Path) -> Result<()> {
    let health = HealthCheck::run(config, config_path).await;
    print_health_report(&health);

    if !health.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Repository name taken from the source directory or archive name
fn default_repo_name(source: &Path) -> Result<String> {
    source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a repository name from {}; pass --name", source.display()))
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    use repodrop::health::CheckResult;

    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 repodrop System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let errors = health.errors();
    let warnings = health.warnings();
    if errors.is_empty() {
        println!("✅ All checks passed");
    } else {
        println!("❌ {} check(s) failed", errors.len());
    }
    if !warnings.is_empty() {
        println!("⚠️  {} warning(s)", warnings.len());
    }
}
