use crate::config::Config;
use crate::errors::IndexResult;
use crate::index::{EntryId, ScoredEntry, VectorIndex};
use crate::models::File;
use crate::utils;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_RETURN_LENGTH: usize = 5;

/// Search the index and reconcile hits with the live filesystem.
///
/// Results are unique by canonical path, ranked closest first, and only name
/// files that existed when they were checked. Entries whose file is gone, and
/// farther entries for a path already returned, are deleted from the index as
/// a side effect.
pub struct QueryPipeline {
    index: Arc<dyn VectorIndex>,
    distance_threshold: f32,
    overfetch: usize,
}

impl QueryPipeline {
    pub fn new(index: Arc<dyn VectorIndex>, distance_threshold: f32, overfetch: usize) -> Self {
        Self {
            index,
            distance_threshold,
            overfetch: overfetch.max(1),
        }
    }

    pub fn from_config(index: Arc<dyn VectorIndex>, config: &Config) -> Self {
        Self::new(index, config.index.distance_threshold, config.index.overfetch)
    }

    pub async fn query(&self, text: &str, return_length: usize) -> IndexResult<Vec<File>> {
        if return_length == 0 {
            return Ok(Vec::new());
        }

        let candidates = self
            .index
            .query(text, return_length.saturating_mul(self.overfetch))
            .await?;

        let mut stale: Vec<EntryId> = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut results = Vec::new();

        for candidate in candidates {
            if candidate.distance > self.distance_threshold {
                continue;
            }

            let canonical = match tokio::fs::canonicalize(&candidate.entry.metadata.path).await {
                Ok(canonical) => canonical,
                Err(e) => {
                    warn!(path = %candidate.entry.metadata.path, id = %candidate.entry.id, "indexed file vanished, pruning: {e}");
                    stale.push(candidate.entry.id);
                    continue;
                }
            };
            if !seen.insert(canonical.clone()) {
                debug!(path = %canonical.display(), id = %candidate.entry.id, "pruning farther duplicate");
                stale.push(candidate.entry.id);
                continue;
            }

            match Self::resolve(candidate, &canonical).await {
                Ok(file) => results.push(file),
                Err(id) => stale.push(id),
            }
        }

        if !stale.is_empty() {
            match self.index.delete(&stale).await {
                Ok(removed) => debug!(removed, "pruned stale index entries"),
                Err(e) => warn!("failed to prune stale index entries: {e}"),
            }
        }

        results.truncate(return_length);
        Ok(results)
    }

    /// Build the result from live metadata, or hand back the id to prune
    async fn resolve(candidate: ScoredEntry, canonical: &Path) -> Result<File, EntryId> {
        let ScoredEntry { entry, .. } = candidate;

        let metadata = match tokio::fs::metadata(canonical).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                warn!(path = %canonical.display(), id = %entry.id, "indexed path is no longer a file, pruning");
                return Err(entry.id);
            }
            Err(e) => {
                warn!(path = %canonical.display(), id = %entry.id, "cannot stat indexed file, pruning: {e}");
                return Err(entry.id);
            }
        };

        let name = utils::basename(canonical).unwrap_or(entry.metadata.basename);
        let mut file = match File::new(name, canonical, entry.metadata.extension) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %canonical.display(), id = %entry.id, "unusable index entry, pruning: {e}");
                return Err(entry.id);
            }
        };
        file.add_summary(entry.document);
        file.apply_metadata(&metadata);
        Ok(file)
    }
}
