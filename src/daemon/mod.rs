pub mod client;
pub mod pidfile;
pub mod process;
pub mod runtime;
pub mod server;

pub use client::ControlClient;
pub use pidfile::PidFile;
pub use runtime::{Daemon, DaemonHandle, DaemonOptions, DaemonPhase};
pub use server::DAEMON_ID;

use crate::analysis::{Classifier, Summarizer};
use crate::config::{Config, FileSettings, SettingsProvider, StaticSettings};
use crate::embeddings::OllamaEmbeddingProvider;
use crate::extractor::DocumentExtractor;
use crate::index::LocalVectorIndex;
use crate::llm::GeminiClient;
use crate::pipeline::{QueryPipeline, SavePipeline};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build every component from `config` and run the daemon in the foreground
/// until it is shut down through the control API or Ctrl-C.
///
/// With `settings_path`, watch paths and folders are re-read from that file
/// on every refresh and classification.
pub async fn run(config: Config, settings_path: Option<PathBuf>) -> Result<()> {
    if config.model_api_key().is_none() {
        warn!("no model API key configured (model.api_key or GEMINI_API_KEY)");
    }

    let settings: Arc<dyn SettingsProvider> = match settings_path {
        Some(path) => Arc::new(FileSettings::new(path, config.clone())),
        None => Arc::new(StaticSettings::from_config(&config)),
    };

    let embedder = Arc::new(OllamaEmbeddingProvider::from_config(&config));
    let index = Arc::new(
        LocalVectorIndex::open(config.index_path(), embedder)
            .await
            .context("Failed to open vector index")?,
    );

    let save = Arc::new(
        SavePipeline::new(
            Arc::new(DocumentExtractor::new()),
            Summarizer::new(Arc::new(GeminiClient::summarizer_from_config(&config))),
            Classifier::new(
                Arc::new(GeminiClient::classifier_from_config(&config)),
                settings.clone(),
            ),
            index.clone(),
        )
        .with_max_chars(config.pipeline.token_threshold)
        .with_echo_ttl(Duration::from_secs(config.pipeline.echo_ttl_secs)),
    );
    let query = QueryPipeline::from_config(index, &config);

    let pid_file = match PidFile::create(config.pid_file()) {
        Ok(pid_file) => {
            debug!(path = %pid_file.path().display(), "PID file written");
            Some(pid_file)
        }
        Err(e) => {
            warn!("running without a PID file: {e:#}");
            None
        }
    };

    let handle = Daemon::start(DaemonOptions::from_config(&config), settings, save, query).await?;

    let daemon = handle.daemon().clone();
    tokio::spawn(async move {
        termination_signal().await;
        daemon.shutdown().await;
    });

    handle.wait().await?;
    drop(pid_file);
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where there is one
async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                    _ = terminate.recv() => info!("termination requested"),
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received");
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
        }
    }
}
