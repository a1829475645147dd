use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_ECHO_TTL: Duration = Duration::from_secs(30);

/// Short-lived memory of files the save pipeline just handled.
///
/// Moving a file into a watched folder, or the trailing modify events of a
/// write we already processed, would otherwise run the same content through
/// the model again.
pub struct RecentEvents {
    ttl: Duration,
    seen: Mutex<HashMap<PathBuf, (String, Instant)>>,
}

impl RecentEvents {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn remember(&self, path: &Path, hash: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            let now = Instant::now();
            seen.retain(|_, (_, at)| now.duration_since(*at) < self.ttl);
            seen.insert(path.to_path_buf(), (hash.to_string(), now));
        }
    }

    /// True if `path` was handled with this exact content within the TTL
    pub fn is_echo(&self, path: &Path, hash: &str) -> bool {
        let Ok(seen) = self.seen.lock() else {
            return false;
        };
        match seen.get(path) {
            Some((seen_hash, at)) => seen_hash == hash && at.elapsed() < self.ttl,
            None => false,
        }
    }
}

impl Default for RecentEvents {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_TTL)
    }
}
