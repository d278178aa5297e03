//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `list`: Show what an issue is blocked by and what it blocks
//! - `add`: Add blocked-by or blocks relationships
//! - `remove`: Remove relationships, with confirmation
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--repo OWNER/REPO`: Repository that bare issue numbers refer to
//! - `--config PATH`: Configuration file (default: `deplink.yaml`)
//! - `--verbose`: Debug logging on stderr
//!
//! # Example
//!
//! ```bash
//! gh deplink list 100
//! gh deplink add 100 --blocked-by 45,67
//! gh deplink add 45 --blocks acme/tools#12 --dry-run
//! gh deplink remove 100 --all --force
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use deplink::app::App;
use deplink::auth::TokenCredentials;
use deplink::config::CONFIG_FILE_NAME;
use deplink::domain::RepoIdentity;
use std::path::PathBuf;

pub use args::{AddArgs, ListArgs, RemoveArgs};
pub use execute::RunStatus;
use validators::validate_repo;

use crate::context;
use crate::output::OutputMode;

/// Manage blocked-by / blocks relationships between GitHub issues.
///
/// Issues can be given as `123`, `#123`, `owner/repo#123` or a full issue
/// URL. Bare numbers refer to `--repo`, `GH_REPO` or the `origin` remote.
#[derive(Parser, Debug)]
#[command(name = "gh-deplink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Repository for bare issue numbers (OWNER/REPO)
    #[arg(short = 'R', long, global = true, value_parser = validate_repo)]
    pub repo: Option<RepoIdentity>,

    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show an issue's dependencies
    ///
    /// Lists the issues it is blocked by and the issues it blocks, sorted by
    /// repository and number.
    List(ListArgs),

    /// Add dependencies
    ///
    /// Each target is validated against the dependency graph first: self
    /// references, duplicates and anything that would close a cycle are
    /// rejected without touching GitHub. Targets are processed independently.
    Add(AddArgs),

    /// Remove dependencies
    ///
    /// Shows what would be removed and asks for confirmation.
    /// Use `--force` to skip confirmation.
    Remove(RemoveArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Configuration file for this run.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Build the run's wiring from configuration, environment and flags.
    async fn app(&self) -> Result<App> {
        let config = context::load_config(&self.config_path()).await?;
        let token = context::discover_token(context::process_env, context::gh_auth_token)?;
        let credentials = TokenCredentials::new(token);
        let ambient = context::ambient_repo(
            self.repo.clone(),
            context::process_env,
            context::origin_remote_url,
        );
        tracing::debug!(
            repo = ?ambient.as_ref().map(RepoIdentity::full_name),
            "Resolved ambient repository"
        );
        Ok(App::new(&config, &credentials, ambient)?)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<RunStatus> {
        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::List(args)) => {
                let app = self.app().await?;
                execute::execute_list(&app, args, output_mode).await
            }
            Some(Commands::Add(args)) => {
                let app = self.app().await?;
                execute::execute_add(&app, args, output_mode).await
            }
            Some(Commands::Remove(args)) => {
                let app = self.app().await?;
                execute::execute_remove(&app, args, output_mode, execute::prompt_removal).await
            }
            None => {
                println!("gh-deplink: manage issue dependencies");
                println!("Use --help for more information");
                Ok(RunStatus::Success)
            }
        }
    }
}
