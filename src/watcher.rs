use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

const MIN_TICK: Duration = Duration::from_millis(10);

/// File event handed to the save pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created or moved into a watched directory
    Created(PathBuf),
    /// File content was modified
    Modified(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(path) | Self::Modified(path) => path,
        }
    }
}

/// A running observer for one watch path.
///
/// Raw notifications are coalesced per file for the debounce window, then
/// forwarded to the work queue. Dropping the handle also ends the forwarding
/// task, but only `stop` waits for it.
pub struct WatchHandle {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Start watching `path` recursively. Must be called inside a tokio runtime.
    pub fn spawn(path: &Path, debounce: Duration, sink: mpsc::Sender<WatchEvent>) -> Result<Self> {
        if !path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", path.display());
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Event>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(e) => warn!("filesystem watcher error: {e}"),
        })
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to start watching {}", path.display()))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(forward(raw_rx, stop_rx, debounce, sink));
        debug!(path = %path.display(), "watcher started");

        Ok(Self {
            path: path.to_path_buf(),
            watcher: Some(watcher),
            stop_tx: Some(stop_tx),
            task: Some(task),
        })
    }

    /// Stop the OS observer and wait for the forwarding task to finish
    pub async fn stop(mut self) {
        drop(self.watcher.take());
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(path = %self.path.display(), "watcher task ended abnormally: {e}");
            }
        }
        debug!(path = %self.path.display(), "watcher stopped");
    }
}

async fn forward(
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    mut stop_rx: oneshot::Receiver<()>,
    debounce: Duration,
    sink: mpsc::Sender<WatchEvent>,
) {
    let mut pending: HashMap<PathBuf, (WatchEvent, Instant)> = HashMap::new();
    let mut ticker = tokio::time::interval((debounce / 2).max(MIN_TICK));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            raw = raw_rx.recv() => match raw {
                Some(event) => coalesce(&mut pending, event, debounce),
                None => break,
            },
            _ = ticker.tick() => {
                if !flush_due(&mut pending, &sink).await {
                    break;
                }
            }
        }
    }
}

fn coalesce(pending: &mut HashMap<PathBuf, (WatchEvent, Instant)>, event: Event, debounce: Duration) {
    let created = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => return,
        EventKind::Modify(_) => false,
        _ => return,
    };

    let due = Instant::now() + debounce;
    for path in event.paths {
        // A create followed by writes is still a create
        let created = created
            || matches!(pending.get(&path), Some((WatchEvent::Created(_), _)));
        let watch_event = if created {
            WatchEvent::Created(path.clone())
        } else {
            WatchEvent::Modified(path.clone())
        };
        pending.insert(path, (watch_event, due));
    }
}

/// Hand over every event whose window has elapsed. Returns false once the queue is closed.
async fn flush_due(
    pending: &mut HashMap<PathBuf, (WatchEvent, Instant)>,
    sink: &mpsc::Sender<WatchEvent>,
) -> bool {
    let now = Instant::now();
    let due: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, (_, at))| *at <= now)
        .map(|(path, _)| path.clone())
        .collect();

    for path in due {
        let Some((event, _)) = pending.remove(&path) else {
            continue;
        };
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        match sink.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(path = %event.path().display(), "work queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
        }
    }
    true
}
