use crate::embeddings::r#trait::squared_l2;
use crate::embeddings::EmbeddingProvider;
use crate::errors::{IndexError, IndexResult};
use crate::index::{EntryId, EntryMetadata, IndexEntry, NewEntry, ScoredEntry, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const FORMAT_VERSION: u32 = 1;

/// Record as persisted on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: EntryId,
    document: String,
    metadata: EntryMetadata,
    embedding: Vec<f32>,
}

impl StoredEntry {
    fn to_entry(&self) -> IndexEntry {
        IndexEntry {
            id: self.id.clone(),
            document: self.document.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<StoredEntry>,
}

/// Vector index kept in memory and persisted as a single JSON file.
///
/// Search is exhaustive over unit-normalized embeddings using squared L2
/// distance. Every mutation rewrites the file through a temp file + rename,
/// under the write lock, so each add/delete is atomic on its own.
pub struct LocalVectorIndex {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<StoredEntry>>,
}

impl LocalVectorIndex {
    /// Open the index at `path`, creating an empty one if the file does not exist
    pub async fn open(path: impl AsRef<Path>, embedder: Arc<dyn EmbeddingProvider>) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: IndexFile = serde_json::from_slice(&bytes)?;
                if file.version != FORMAT_VERSION {
                    return Err(IndexError::Unavailable(format!(
                        "unsupported index format version {} in {}",
                        file.version,
                        path.display()
                    )));
                }
                file.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = entries.len(), "vector index opened");
        Ok(Self {
            path,
            embedder,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &[StoredEntry]) -> IndexResult<()> {
        let file = IndexFile {
            version: FORMAT_VERSION,
            entries: entries.to_vec(),
        };
        let bytes = serde_json::to_vec(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn embed(&self, text: &str) -> IndexResult<Vec<f32>> {
        self.embedder
            .compute_normalized(text)
            .await
            .map_err(|e| IndexError::Embedding(format!("{e:#}")))
    }
}

#[async_trait::async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn add(&self, entry: NewEntry) -> IndexResult<EntryId> {
        // Embed before taking the lock; the provider may be remote.
        let embedding = self.embed(&entry.document).await?;
        let id = uuid::Uuid::new_v4().to_string();

        let mut entries = self.entries.write().await;
        entries.push(StoredEntry {
            id: id.clone(),
            document: entry.document,
            metadata: entry.metadata,
            embedding,
        });
        if let Err(e) = self.persist(&entries).await {
            entries.pop();
            return Err(e);
        }

        debug!(id = %id, total = entries.len(), "index entry added");
        Ok(id)
    }

    async fn query(&self, text: &str, limit: usize) -> IndexResult<Vec<ScoredEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = self.embed(text).await?;

        let entries = self.entries.read().await;
        let (comparable, mismatched): (Vec<&StoredEntry>, Vec<&StoredEntry>) = entries
            .iter()
            .partition(|stored| stored.embedding.len() == query.len());
        if !mismatched.is_empty() {
            warn!(
                skipped = mismatched.len(),
                dimension = query.len(),
                "index entries embedded with a different model were not searched"
            );
        }

        let mut scored: Vec<ScoredEntry> = comparable
            .into_iter()
            .map(|stored| ScoredEntry {
                entry: stored.to_entry(),
                distance: squared_l2(&stored.embedding, &query),
            })
            .collect();

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete(&self, ids: &[EntryId]) -> IndexResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let doomed: HashSet<&str> = ids.iter().map(|id| id.as_str()).collect();

        let mut entries = self.entries.write().await;
        let before = entries.clone();
        entries.retain(|stored| !doomed.contains(stored.id.as_str()));
        let removed = before.len() - entries.len();
        if removed == 0 {
            return Ok(0);
        }

        if let Err(e) = self.persist(&entries).await {
            *entries = before;
            return Err(e);
        }

        debug!(removed, total = entries.len(), "index entries deleted");
        Ok(removed)
    }

    async fn entries(&self) -> IndexResult<Vec<IndexEntry>> {
        Ok(self.entries.read().await.iter().map(StoredEntry::to_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BagOfWordsEmbedder;
    use tempfile::TempDir;

    fn new_entry(document: &str, path: &str) -> NewEntry {
        NewEntry {
            document: document.to_string(),
            metadata: EntryMetadata {
                path: path.to_string(),
                basename: Path::new(path).file_name().unwrap().to_string_lossy().to_string(),
                extension: crate::utils::get_extension(Path::new(path)),
            },
        }
    }

    async fn open(dir: &TempDir) -> LocalVectorIndex {
        LocalVectorIndex::open(dir.path().join("index.json"), Arc::new(BagOfWordsEmbedder::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(&temp_dir).await;
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_generates_unique_ids_without_dedupe() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(&temp_dir).await;

        let a = index.add(new_entry("quarterly revenue report", "/docs/q3.pdf")).await.unwrap();
        let b = index.add(new_entry("quarterly revenue report", "/docs/q3.pdf")).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(&temp_dir).await;

        index.add(new_entry("photos of my cat sleeping", "/pics/cat.jpg")).await.unwrap();
        index.add(new_entry("quarterly revenue report for finance", "/docs/q3.pdf")).await.unwrap();
        index.add(new_entry("grocery list milk eggs", "/notes/list.txt")).await.unwrap();

        let hits = index.query("revenue report", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.metadata.path, "/docs/q3.pdf");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits.iter().all(|hit| (0.0..=4.0 + 1e-4).contains(&hit.distance)));
    }

    #[tokio::test]
    async fn test_query_zero_limit() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(&temp_dir).await;
        index.add(new_entry("anything", "/a.txt")).await.unwrap();
        assert!(index.query("anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let keep_id;
        {
            let index = open(&temp_dir).await;
            keep_id = index.add(new_entry("keep me", "/keep.txt")).await.unwrap();
            let drop_id = index.add(new_entry("drop me", "/drop.txt")).await.unwrap();

            let removed = index
                .delete(&[drop_id, "no-such-id".to_string()])
                .await
                .unwrap();
            assert_eq!(removed, 1);
        }

        let reopened = open(&temp_dir).await;
        let entries = reopened.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, keep_id);
        assert_eq!(entries[0].metadata.path, "/keep.txt");
        assert_eq!(entries[0].document, "keep me");
    }

    #[tokio::test]
    async fn test_delete_empty_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(&temp_dir).await;
        assert_eq!(index.delete(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_with_unembeddable_document_fails() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(&temp_dir).await;
        let result = index.add(new_entry("   ", "/blank.txt")).await;
        assert!(matches!(result, Err(IndexError::Embedding(_))));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_skips_entries_of_another_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.json");
        let legacy = IndexFile {
            version: FORMAT_VERSION,
            entries: vec![StoredEntry {
                id: "legacy".to_string(),
                document: "revenue report".to_string(),
                metadata: new_entry("revenue report", "/docs/old.pdf").metadata,
                embedding: vec![1.0, 0.0, 0.0],
            }],
        };
        std::fs::write(&path, serde_json::to_vec(&legacy).unwrap()).unwrap();

        let index = LocalVectorIndex::open(&path, Arc::new(BagOfWordsEmbedder::new()))
            .await
            .unwrap();
        index.add(new_entry("revenue report", "/docs/q3.pdf")).await.unwrap();

        let hits = index.query("revenue report", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.metadata.path, "/docs/q3.pdf");
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_to_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = LocalVectorIndex::open(&path, Arc::new(BagOfWordsEmbedder::new())).await;
        assert!(matches!(result, Err(IndexError::Serialization(_))));
    }
}
