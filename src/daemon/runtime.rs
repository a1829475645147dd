use crate::config::{Config, SettingsProvider};
use crate::daemon::server;
use crate::errors::DaemonError;
use crate::pipeline::{QueryPipeline, SaveOutcome, SavePipeline};
use crate::watcher::{WatchEvent, WatchHandle};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Lifecycle of the daemon process. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DaemonPhase {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl DaemonPhase {
    pub fn is_terminating(self) -> bool {
        self >= Self::ShuttingDown
    }
}

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub addr: SocketAddr,
    pub queue_capacity: usize,
    pub max_concurrent_events: usize,
    pub debounce: Duration,
}

impl DaemonOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            addr: config.control_addr(),
            queue_capacity: config.daemon.queue_capacity,
            max_concurrent_events: config.daemon.max_concurrent_events,
            debounce: Duration::from_millis(config.daemon.debounce_ms),
        }
    }
}

/// Watchers and the queue they feed, only touched under the registry lock
struct WatcherRegistry {
    phase: DaemonPhase,
    watchers: BTreeMap<PathBuf, WatchHandle>,
    events: Option<mpsc::Sender<WatchEvent>>,
}

/// Shared daemon state: the watcher set, the query side and the shutdown signal
pub struct Daemon {
    settings: Arc<dyn SettingsProvider>,
    query: QueryPipeline,
    registry: Mutex<WatcherRegistry>,
    phase: watch::Sender<DaemonPhase>,
    debounce: Duration,
}

impl Daemon {
    /// Bind the control endpoint, start one watcher per watch path and begin serving.
    ///
    /// If the endpoint cannot be bound the daemon shuts itself down and the
    /// bind error is returned.
    pub async fn start(
        options: DaemonOptions,
        settings: Arc<dyn SettingsProvider>,
        save: Arc<SavePipeline>,
        query: QueryPipeline,
    ) -> Result<DaemonHandle, DaemonError> {
        let (phase, _) = watch::channel(DaemonPhase::Starting);
        let (events_tx, events_rx) = mpsc::channel(options.queue_capacity.max(1));

        let daemon = Arc::new(Self {
            settings,
            query,
            registry: Mutex::new(WatcherRegistry {
                phase: DaemonPhase::Starting,
                watchers: BTreeMap::new(),
                events: Some(events_tx),
            }),
            phase,
            debounce: options.debounce,
        });

        let limit = Arc::new(Semaphore::new(options.max_concurrent_events.max(1)));
        let dispatcher = tokio::spawn(dispatch(events_rx, save, limit));

        let listener = match TcpListener::bind(options.addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(addr = %options.addr, "cannot bind control endpoint, shutting down: {source}");
                daemon.shutdown().await;
                if let Err(e) = dispatcher.await {
                    warn!("event dispatcher ended abnormally: {e}");
                }
                daemon.finish().await;
                return Err(DaemonError::ControlBind {
                    addr: options.addr,
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;

        {
            let mut registry = daemon.registry.lock().await;
            daemon.start_watchers(&mut registry).await;
            registry.phase = DaemonPhase::Running;
            daemon.phase.send_replace(DaemonPhase::Running);
        }

        let server = tokio::spawn(server::serve(listener, daemon.clone()));
        info!(addr = %local_addr, "daemon running");

        Ok(DaemonHandle {
            daemon,
            local_addr,
            server,
            dispatcher,
        })
    }

    pub fn phase(&self) -> DaemonPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DaemonPhase> {
        self.phase.subscribe()
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query
    }

    /// Paths that currently have a running watcher
    pub async fn active_watch_paths(&self) -> Vec<PathBuf> {
        self.registry.lock().await.watchers.keys().cloned().collect()
    }

    /// Replace every watcher with a fresh one per current watch path.
    ///
    /// Holds the registry for the whole stop-join-start sequence, so it never
    /// interleaves with `shutdown`.
    pub async fn refresh(&self) -> Result<Vec<PathBuf>, DaemonError> {
        let mut registry = self.registry.lock().await;
        if registry.phase.is_terminating() {
            return Err(DaemonError::ShuttingDown);
        }

        Self::stop_watchers(&mut registry).await;
        self.start_watchers(&mut registry).await;

        let active: Vec<PathBuf> = registry.watchers.keys().cloned().collect();
        info!(watchers = active.len(), "watchers refreshed");
        Ok(active)
    }

    /// Signal shutdown, stop and join every watcher and close the work queue.
    /// Idempotent; in-flight events keep running until the dispatcher drains.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        if registry.phase.is_terminating() {
            return;
        }

        registry.phase = DaemonPhase::ShuttingDown;
        self.phase.send_replace(DaemonPhase::ShuttingDown);
        info!("daemon shutting down");

        Self::stop_watchers(&mut registry).await;
        registry.events = None;
    }

    async fn finish(&self) {
        let mut registry = self.registry.lock().await;
        registry.phase = DaemonPhase::Stopped;
        self.phase.send_replace(DaemonPhase::Stopped);
        info!("daemon stopped");
    }

    async fn start_watchers(&self, registry: &mut WatcherRegistry) {
        let Some(events) = registry.events.clone() else {
            return;
        };

        for path in self.settings.watch_paths().await {
            if registry.watchers.contains_key(&path) {
                continue;
            }
            match WatchHandle::spawn(&path, self.debounce, events.clone()) {
                Ok(handle) => {
                    info!(path = %path.display(), "watching");
                    registry.watchers.insert(path, handle);
                }
                Err(e) => warn!(path = %path.display(), "skipping watch path: {e:#}"),
            }
        }
    }

    async fn stop_watchers(registry: &mut WatcherRegistry) {
        let watchers = std::mem::take(&mut registry.watchers);
        if watchers.is_empty() {
            return;
        }
        let count = watchers.len();
        futures::future::join_all(watchers.into_values().map(WatchHandle::stop)).await;
        debug!(count, "watchers joined");
    }
}

/// Owner of a started daemon's background tasks
pub struct DaemonHandle {
    daemon: Arc<Daemon>,
    local_addr: SocketAddr,
    server: JoinHandle<std::io::Result<()>>,
    dispatcher: JoinHandle<()>,
}

impl DaemonHandle {
    pub fn daemon(&self) -> &Arc<Daemon> {
        &self.daemon
    }

    /// Address the control endpoint is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait until the daemon has shut down and drained, then mark it stopped
    pub async fn wait(self) -> Result<(), DaemonError> {
        let served = match self.server.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        };
        if let Err(e) = &served {
            error!("control server failed: {e}");
        }

        // The server may also stop on its own
        self.daemon.shutdown().await;
        if let Err(e) = self.dispatcher.await {
            warn!("event dispatcher ended abnormally: {e}");
        }
        self.daemon.finish().await;

        served.map_err(DaemonError::from)
    }
}

/// Drain the work queue into bounded concurrent save-pipeline runs.
/// Returns once the queue is closed and every in-flight event has finished.
async fn dispatch(
    mut events: mpsc::Receiver<WatchEvent>,
    save: Arc<SavePipeline>,
    limit: Arc<Semaphore>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            Some(done) = tasks.join_next(), if !tasks.is_empty() => report(done),
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(permit) = limit.clone().acquire_owned().await else { break };
                let save = save.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    handle_event(&save, event).await;
                });
            }
        }
    }

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "waiting for in-flight events");
    }
    while let Some(done) = tasks.join_next().await {
        report(done);
    }
}

async fn handle_event(save: &SavePipeline, event: WatchEvent) {
    let path = event.path();
    debug!(?event, "processing file event");
    match save.process_path(path).await {
        Ok(SaveOutcome::Indexed { id, path: stored, moved }) => {
            info!(id = %id, path = %stored.display(), moved, "event processed");
        }
        Ok(SaveOutcome::Skipped) => {}
        Err(e) => error!(path = %path.display(), "file event aborted: {e}"),
    }
}

fn report(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!("file event task panicked: {e}");
    }
}
