mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use output::Printer;
use specbridge_core::{types::SyncScope, SpecBridgeError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specbridge",
    about = "Sync Kiro-style specs (requirements, design, tasks) to GitHub Issues",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .specbridge.yaml or .git/)
    #[arg(long, global = true, env = "SPECBRIDGE_ROOT")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/.specbridge.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show per-item changes and debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, short = 'j', global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .specbridge.yaml
    Init {
        /// Overwrite an existing configuration
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Sync specs to the configured targets
    Sync {
        /// What to sync: all, requirements, tasks or single
        #[arg(long, default_value = "all")]
        scope: SyncScope,

        /// Item id for --scope single (e.g. spec:user-auth:1.2)
        #[arg(long)]
        id: Option<String>,

        /// Report what would be synced without touching any target
        #[arg(long)]
        dry_run: bool,
    },

    /// Show synced items and the last run
    Status,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let printer = Printer::new(cli.verbose, cli.json);
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init { force } => cmd::init::run(&root, config, force, &printer),
        Commands::Sync { scope, id, dry_run } => {
            let args = cmd::sync::SyncArgs { scope, id, dry_run };
            cmd::sync::run(&root, config, &args, &printer)
        }
        Commands::Status => cmd::status::run(&root, config, &printer),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        if let Some(hint) = hint_for(&e) {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}

/// Follow-up advice for the error kinds a user can act on.
fn hint_for(err: &anyhow::Error) -> Option<String> {
    let known = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<SpecBridgeError>())?;
    match known {
        SpecBridgeError::ConfigNotFound(_) => {
            Some("run `specbridge init` to create a configuration file".to_string())
        }
        SpecBridgeError::Authentication(_) => Some(
            "check the token in .specbridge.yaml (or GITHUB_TOKEN), or run `gh auth login`"
                .to_string(),
        ),
        SpecBridgeError::RateLimit {
            retry_after: Some(secs),
            ..
        } => Some(format!("wait {secs} seconds before retrying")),
        SpecBridgeError::RateLimit { .. } => Some("wait a while before retrying".to_string()),
        other => Some(format!("error code {}", other.code())),
    }
}
