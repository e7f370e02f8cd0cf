//! termsync: keep a terminal's profiles and settings in step across machines
//! through one encrypted blob.

mod stores;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rpassword::prompt_password;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stores::{DirBlobStore, DirExtensionLister, FileConfigStore};
use termsync_core::sync::{
    AutoSync, AutoSyncOptions, ConfigEvent, JsonStateStore, StateStore, SyncOrchestrator,
    SyncOutcome,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "TERMSYNC_PASSWORD";
const NEW_PASSWORD_ENV: &str = "TERMSYNC_NEW_PASSWORD";

#[derive(Parser)]
#[command(name = "termsync", version)]
#[command(about = "Sync terminal profiles and settings through an encrypted blob", long_about = None)]
struct Cli {
    /// Terminal configuration file (JSON)
    #[arg(short, long, env = "TERMSYNC_CONFIG")]
    config: PathBuf,

    /// Directory used as remote storage
    #[arg(short, long, env = "TERMSYNC_REMOTE")]
    remote: PathBuf,

    /// Sync state file [default: <config dir>/termsync/state.json]
    #[arg(long, env = "TERMSYNC_STATE")]
    state: Option<PathBuf>,

    /// Directory whose subdirectories are the installed plugins
    #[arg(long, env = "TERMSYNC_PLUGINS")]
    plugins: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the master password (or verify it, if already set)
    SetPassword,

    /// Change the master password and re-encrypt the remote blob
    ChangePassword,

    /// Download, merge, and upload if the remote is behind
    Sync,

    /// Upload local configuration
    Push {
        /// Upload even when nothing changed since the last sync
        #[arg(long)]
        force: bool,
    },

    /// Download and merge remote configuration
    Pull {
        /// Let remote values win every conflict
        #[arg(long)]
        force: bool,
    },

    /// Show sync state
    Status,

    /// List stored versions of the remote blob
    Versions,

    /// Apply a stored version and make it current
    Restore {
        /// Version id, as printed by `versions`
        version: String,
    },

    /// Sync automatically when the configuration file changes
    Watch {
        /// Quiet period after the last change, in seconds
        #[arg(long, default_value_t = 5)]
        debounce: u64,
    },

    /// Forget the remote binding
    Disconnect,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let state_path = cli.state.clone().unwrap_or_else(JsonStateStore::default_path);
    let state = Arc::new(JsonStateStore::new(&state_path));
    let mut orchestrator = SyncOrchestrator::new(
        Arc::new(FileConfigStore::new(&cli.config)),
        Arc::new(DirBlobStore::new(&cli.remote)),
        state.clone(),
    );
    if let Some(plugins) = &cli.plugins {
        orchestrator = orchestrator.with_extensions(Arc::new(DirExtensionLister::new(plugins)));
    }
    let orchestrator = Arc::new(orchestrator);

    debug!(state = %state_path.display(), remote = %cli.remote.display(), "Using stores");

    match cli.command {
        Commands::SetPassword => {
            let password = read_password("Master password: ", PASSWORD_ENV)?;
            if !state.load()?.has_master_password() {
                confirm_password(&password)?;
            }
            orchestrator
                .set_master_password(&password)
                .await
                .context("Failed to set master password")?;
            println!("Master password set");
        }
        Commands::ChangePassword => {
            let old = read_password("Current master password: ", PASSWORD_ENV)?;
            let new = read_password("New master password: ", NEW_PASSWORD_ENV)?;
            confirm_password(&new)?;
            report(orchestrator.change_master_password(&old, &new).await)?;
        }
        Commands::Sync => {
            unlock(&orchestrator)?;
            report(orchestrator.sync().await)?;
        }
        Commands::Push { force } => {
            unlock(&orchestrator)?;
            let outcome = if force {
                orchestrator.force_upload().await
            } else {
                orchestrator.upload().await
            };
            report(outcome)?;
        }
        Commands::Pull { force } => {
            unlock(&orchestrator)?;
            let outcome = if force {
                orchestrator.force_download().await
            } else {
                orchestrator.pull().await
            };
            report(outcome)?;
        }
        Commands::Status => {
            let status = orchestrator.status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Versions => {
            let versions = orchestrator
                .list_versions()
                .await
                .context("Failed to list remote versions")?;
            if versions.is_empty() {
                println!("No versions stored");
            }
            for version in versions {
                let modified =
                    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(version.modified_time)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default();
                println!("{}\t{}\t{} bytes", version.id, modified, version.size);
            }
        }
        Commands::Restore { version } => {
            unlock(&orchestrator)?;
            report(orchestrator.restore_version(&version).await)?;
        }
        Commands::Watch { debounce } => {
            unlock(&orchestrator)?;
            let options = AutoSyncOptions {
                debounce: Duration::from_secs(debounce),
                ..AutoSyncOptions::from_settings(&state.load()?)
            };
            watch(orchestrator, options, &cli.config).await?;
        }
        Commands::Disconnect => {
            orchestrator.disconnect().await?;
            println!("Disconnected");
        }
    }

    Ok(())
}

/// Password from `env_var`, or prompted on the terminal
fn read_password(prompt: &str, env_var: &str) -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var(env_var) {
        return Ok(Zeroizing::new(password));
    }
    let password = Zeroizing::new(prompt_password(prompt)?);
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

/// Ask again when prompting interactively
fn confirm_password(password: &str) -> Result<()> {
    if std::env::var_os(PASSWORD_ENV).is_some() || std::env::var_os(NEW_PASSWORD_ENV).is_some() {
        return Ok(());
    }
    let again = Zeroizing::new(prompt_password("Repeat password: ")?);
    if again.as_str() != password {
        bail!("Passwords do not match");
    }
    Ok(())
}

fn unlock(orchestrator: &SyncOrchestrator) -> Result<()> {
    let password = read_password("Master password: ", PASSWORD_ENV)?;
    orchestrator
        .unlock(&password)
        .context("Failed to unlock sync session")
}

/// Print the outcome; failures become the process error
fn report(outcome: SyncOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.success {
        return Err(anyhow!(outcome.error.unwrap_or_else(|| "sync failed".to_string())));
    }
    Ok(())
}

/// Feed file system changes of `config_path` into auto-sync until Ctrl-C
async fn watch(
    orchestrator: Arc<SyncOrchestrator>,
    options: AutoSyncOptions,
    config_path: &Path,
) -> Result<()> {
    let (auto, events) = AutoSync::new(orchestrator, options);
    let handle = auto.spawn();

    // Editors often replace the file, so watch the directory and filter
    let config_path = std::env::current_dir()?.join(config_path);
    let file_name = config_path
        .file_name()
        .map(|n| n.to_os_string())
        .context("Configuration path has no file name")?;
    let dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .context("Configuration file has no parent directory")?;

    let (tx, mut rx) = mpsc::channel::<Event>(100);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    info!(path = %config_path.display(), "Watching configuration for changes");

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let relevant = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) && event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str()));
                if relevant && events.send(ConfigEvent::Changed).await.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, flushing pending changes");
                break;
            }
        }
    }

    drop(watcher);
    let _ = events.send(ConfigEvent::Shutdown).await;
    handle.await.context("Auto-sync task failed")?;
    Ok(())
}
