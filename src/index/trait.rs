use crate::errors::IndexResult;
use crate::index::{EntryId, IndexEntry, NewEntry, ScoredEntry};

/// Persistent store of summaries searchable by semantic similarity.
///
/// Entries are never updated in place: they are only created or deleted.
/// Writes do not dedupe on path.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store a new entry under a freshly generated id
    async fn add(&self, entry: NewEntry) -> IndexResult<EntryId>;

    /// Up to `limit` entries closest to `text`, closest first
    async fn query(&self, text: &str, limit: usize) -> IndexResult<Vec<ScoredEntry>>;

    /// Remove entries by id, returning how many existed
    async fn delete(&self, ids: &[EntryId]) -> IndexResult<usize>;

    /// Raw listing of every entry, bypassing similarity search
    async fn entries(&self) -> IndexResult<Vec<IndexEntry>>;

    async fn count(&self) -> IndexResult<usize> {
        Ok(self.entries().await?.len())
    }
}
