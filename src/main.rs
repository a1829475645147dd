use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filewarden::config::{Config, FileSettings, SettingsProvider};
use filewarden::daemon::{self, process, PidFile};
use filewarden::ControlClient;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filewarden")]
#[command(about = "Summarizes, files away and semantically indexes what lands in your folders")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to FILEWARDEN_CONFIG, ./config/settings.toml, ~/.config/filewarden/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground
    Run,
    /// Start the daemon in the background unless it is already running
    Start,
    /// Ask the running daemon to shut down
    Stop,
    /// Check whether the daemon is running
    Ping,
    /// Re-read the watch paths and restart the watchers
    Refresh,
    /// Search indexed files by meaning
    Find {
        /// What you are looking for
        #[arg(value_name = "QUERY")]
        query: String,
        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
    /// Manage the directories the daemon watches
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// Manage destination folders and their descriptions
    Assoc {
        #[command(subcommand)]
        action: AssocAction,
    },
}

#[derive(Subcommand)]
enum WatchAction {
    /// Start watching a directory
    Add { path: PathBuf },
    /// Stop watching a directory
    Remove { path: PathBuf },
    /// Show the watched directories
    List,
}

#[derive(Subcommand)]
enum AssocAction {
    /// Describe a folder files may be moved into
    Add { path: PathBuf, description: String },
    /// Forget a destination folder
    Remove { path: PathBuf },
    /// Show destination folders
    List,
}

fn load_config(explicit: Option<PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    let path = explicit.or_else(Config::locate);
    match path {
        Some(path) => Ok((Config::from_file(&path)?, Some(path))),
        None => Ok((Config::default(), None)),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = load_config(cli.config)?;
    let client = ControlClient::new(config.control_addr());

    match cli.command {
        Commands::Run => {
            init_logging();
            if client.is_running().await {
                anyhow::bail!("filewarden is already running on {}", config.control_addr());
            }
            daemon::run(config, config_path).await?;
        }
        Commands::Start => {
            if client.is_running().await {
                println!("filewarden is already running on {}", config.control_addr());
                return Ok(());
            }
            spawn_detached(&config, config_path.as_ref())?;

            for _ in 0..50 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if client.is_running().await {
                    println!("filewarden started on {}", config.control_addr());
                    return Ok(());
                }
            }
            anyhow::bail!(
                "filewarden did not come up, see {}",
                config.log_file().display()
            );
        }
        Commands::Stop => {
            if client.is_running().await {
                client.shutdown().await?;
                println!("Shutdown requested");
                return Ok(());
            }

            let pid_path = config.pid_file();
            match PidFile::read(&pid_path) {
                Some(pid) if process::is_daemon_process(pid) => {
                    process::terminate(pid)
                        .with_context(|| format!("Failed to signal process {pid}"))?;
                    println!(
                        "filewarden is not answering on {}, asked process {pid} to terminate",
                        config.control_addr()
                    );
                }
                Some(pid) => println!(
                    "filewarden is not running (stale PID {pid} in {})",
                    pid_path.display()
                ),
                None => println!("filewarden is not running"),
            }
        }
        Commands::Ping => {
            let id = client.ping().await?;
            println!("{id} is running on {}", config.control_addr());
        }
        Commands::Refresh => {
            let paths = client.refresh().await?;
            println!("Watching {} path(s):", paths.len());
            for path in paths {
                println!("  {}", path.display());
            }
        }
        Commands::Find { query, limit } => {
            let results = client
                .query(&query, limit)
                .await
                .context("Is the daemon running? Try `filewarden start`")?;

            if results.is_empty() {
                println!("No matching files.");
            }
            for (i, record) in results.iter().enumerate() {
                println!("{}. {}", i + 1, record.path);
                if let Some(summary) = &record.summary {
                    println!("   {}", summary.lines().next().unwrap_or_default());
                }
            }
        }
        Commands::Watch { action } => {
            let settings = editable_settings(&config, config_path);
            match action {
                WatchAction::Add { path } => {
                    let added = settings.add_watch_path(&path).await?;
                    println!("Watching {}", added.display());
                    refresh_if_running(&client).await?;
                }
                WatchAction::Remove { path } => {
                    let removed = settings.remove_watch_path(&path).await?;
                    println!("No longer watching {}", removed.display());
                    refresh_if_running(&client).await?;
                }
                WatchAction::List => {
                    for path in settings.watch_paths().await {
                        println!("{}", path.display());
                    }
                }
            }
        }
        Commands::Assoc { action } => {
            let settings = editable_settings(&config, config_path);
            match action {
                AssocAction::Add { path, description } => {
                    let folder = settings.set_folder(&path, &description).await?;
                    println!("{}: {description}", folder.display());
                }
                AssocAction::Remove { path } => {
                    let folder = settings.remove_folder(&path).await?;
                    println!("Removed {}", folder.display());
                }
                AssocAction::List => {
                    for (folder, description) in settings.folder_associations().await {
                        println!("{}: {description}", folder.display());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Settings file edits go to: the loaded config file, or the default location
fn editable_settings(config: &Config, config_path: Option<PathBuf>) -> FileSettings {
    let path = config_path.unwrap_or_else(Config::default_location);
    FileSettings::new(path, config.clone())
}

/// Let a running daemon pick up a changed Watch Path Set
async fn refresh_if_running(client: &ControlClient) -> Result<()> {
    if client.is_running().await {
        let active = client.refresh().await.context("Failed to refresh the daemon")?;
        println!("Daemon refreshed, {} watcher(s) active", active.len());
    }
    Ok(())
}

/// Re-launch this binary with `run`, logging to the daemon log file
fn spawn_detached(config: &Config, config_path: Option<&PathBuf>) -> Result<()> {
    let log_path = config.log_file();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let exe = std::env::current_exe().context("Failed to locate the filewarden binary")?;
    let mut command = std::process::Command::new(exe);
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    command
        .arg("run")
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log);
    process::detach(&mut command);
    command.spawn().context("Failed to spawn the daemon")?;
    Ok(())
}
