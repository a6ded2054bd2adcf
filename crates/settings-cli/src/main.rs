//! settings-cli — entry point.
//!
//! Inspects and edits the JSON files written by `settings-store` from outside
//! the application that owns them: find the files, list or change values, or
//! reset a scope to defaults.
//!
//! # Usage
//!
//! ```text
//! settings-cli [OPTIONS] <COMMAND>
//!
//! Commands:
//!   path   Print the settings file paths
//!   list   Print every setting's effective value
//!   get    Print one setting's effective value
//!   set    Change one setting and save
//!   reset  Delete settings files and restore defaults
//!
//! Options:
//!   --root      <DIR>    Settings root [default: platform data directory]
//!   --manifest  <FILE>   Definition manifest [default: <root>/settings-manifest.toml]
//!   --user      <ID>     User id for user-scoped settings
//!   --log-level <LEVEL>  Log filter when RUST_LOG is unset [default: warn]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable            | Flag          |
//! |---------------------|---------------|
//! | `SETTINGS_ROOT`     | `--root`      |
//! | `SETTINGS_MANIFEST` | `--manifest`  |
//! | `SETTINGS_USER`     | `--user`      |
//! | `SETTINGS_LOG`      | `--log-level` |

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use settings_cli::application::{execute, Action, CliContext};
use settings_cli::domain::load_manifest;
use settings_core::Scope;
use settings_store::infrastructure::storage::default_root;

/// Manifest file name looked up under the root when `--manifest` is absent.
const DEFAULT_MANIFEST: &str = "settings-manifest.toml";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Inspect and edit device and user settings files.
#[derive(Debug, Parser)]
#[command(name = "settings-cli", version)]
struct Cli {
    /// Directory holding the device settings file and one folder per user.
    #[arg(long, env = "SETTINGS_ROOT")]
    root: Option<PathBuf>,

    /// TOML file declaring the known settings.
    #[arg(long, env = "SETTINGS_MANIFEST")]
    manifest: Option<PathBuf>,

    /// User id whose settings to load.
    #[arg(long, env = "SETTINGS_USER")]
    user: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "warn", env = "SETTINGS_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the settings file paths.
    Path,
    /// Print every setting's effective value.
    List {
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Print one setting's effective value.
    Get {
        key: String,
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Change one setting and save.
    Set {
        key: String,
        value: String,
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Delete settings files and restore defaults.
    Reset {
        #[arg(long, value_enum, default_value_t = ResetScope::All)]
        scope: ResetScope,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    Device,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Device => Scope::Device,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResetScope {
    Device,
    User,
    All,
}

impl Cli {
    /// Converts the parsed subcommand into an [`Action`].
    fn action(&self) -> Action {
        match &self.command {
            Command::Path => Action::Paths,
            Command::List { scope } => Action::List {
                scope: scope.map(Scope::from),
            },
            Command::Get { key, scope } => Action::Get {
                key: key.clone(),
                scope: scope.map(Scope::from),
            },
            Command::Set { key, value, scope } => Action::Set {
                key: key.clone(),
                value: value.clone(),
                scope: scope.map(Scope::from),
            },
            Command::Reset { scope } => Action::Reset {
                scope: match scope {
                    ResetScope::Device => Some(Scope::Device),
                    ResetScope::User => Some(Scope::User),
                    ResetScope::All => None,
                },
            },
        }
    }

    /// Resolves the root and, unless only paths are wanted, the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if no root is given and the platform data directory is
    /// unknown, or if the manifest cannot be read.
    fn context(&self) -> anyhow::Result<CliContext> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => default_root().context("no --root given and no platform data directory")?,
        };

        let definitions = if matches!(self.command, Command::Path) {
            Vec::new()
        } else {
            let manifest = self
                .manifest
                .clone()
                .unwrap_or_else(|| root.join(DEFAULT_MANIFEST));
            load_manifest(&manifest)
                .with_context(|| format!("loading manifest {}", manifest.display()))?
        };

        Ok(CliContext {
            root,
            user: self.user.clone(),
            definitions,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let action = cli.action();
    let ctx = cli.context()?;
    let lines = execute(action, ctx).await.context("settings command failed")?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
