//! Deterministic stand-ins for the model, the embedder and the index.

use crate::embeddings::EmbeddingProvider;
use crate::errors::{IndexError, IndexResult, ModelError};
use crate::index::{EntryId, EntryMetadata, IndexEntry, NewEntry, ScoredEntry, VectorIndex};
use crate::llm::LanguageModel;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Language model answering from a fixed script, recording every prompt
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(answers: Vec<Result<String, ModelError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn call(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".to_string())))
    }
}

/// Language model that holds every call until `release`, then answers `answer`
pub struct GatedModel {
    answer: String,
    entered: tokio::sync::Notify,
    gate: tokio::sync::watch::Sender<bool>,
}

impl GatedModel {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            entered: tokio::sync::Notify::new(),
            gate: tokio::sync::watch::channel(false).0,
        }
    }

    /// Resolves once a call is waiting at the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait::async_trait]
impl LanguageModel for GatedModel {
    async fn call(&self, _prompt: &str) -> Result<String, ModelError> {
        let mut open = self.gate.subscribe();
        self.entered.notify_one();
        open.wait_for(|open| *open)
            .await
            .map_err(|_| ModelError::Unavailable("gate dropped".to_string()))?;
        Ok(self.answer.clone())
    }
}

const BAG_DIMS: usize = 256;

/// Hashes each word into a bucket; texts sharing words end up close
pub struct BagOfWordsEmbedder;

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn compute_embedding(&self, content: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0; BAG_DIMS];
        let mut words = 0;
        for word in content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = blake3::hash(word.to_lowercase().as_bytes());
            vector[hash.as_bytes()[0] as usize] += 1.0;
            words += 1;
        }
        if words == 0 {
            anyhow::bail!("Cannot generate embedding for empty content");
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        BAG_DIMS
    }
}

/// Index returning preset hits, recording writes and deletions
#[derive(Default)]
pub struct ScriptedIndex {
    hits: Mutex<Vec<ScoredEntry>>,
    added: Mutex<Vec<NewEntry>>,
    deleted: Mutex<Vec<EntryId>>,
    queried_limits: Mutex<Vec<usize>>,
    fail_queries: AtomicBool,
    fail_adds: AtomicBool,
}

impl ScriptedIndex {
    pub fn with_hits(hits: Vec<ScoredEntry>) -> Self {
        let index = Self::default();
        *index.hits.lock().unwrap() = hits;
        index
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub fn fail_adds(&self) {
        self.fail_adds.store(true, Ordering::SeqCst);
    }

    pub fn added(&self) -> Vec<NewEntry> {
        self.added.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<EntryId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn queried_limits(&self) -> Vec<usize> {
        self.queried_limits.lock().unwrap().clone()
    }
}

/// Hit for `path` with the given id and distance
pub fn scored(id: &str, path: &Path, distance: f32) -> ScoredEntry {
    ScoredEntry {
        entry: IndexEntry {
            id: id.to_string(),
            document: format!("summary of {id}"),
            metadata: EntryMetadata {
                path: path.to_string_lossy().to_string(),
                basename: crate::utils::basename(path).unwrap_or_default(),
                extension: crate::utils::get_extension(path),
            },
        },
        distance,
    }
}

#[async_trait::async_trait]
impl VectorIndex for ScriptedIndex {
    async fn add(&self, entry: NewEntry) -> IndexResult<EntryId> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("scripted add failure".to_string()));
        }
        let mut added = self.added.lock().unwrap();
        added.push(entry);
        Ok(format!("entry-{}", added.len()))
    }

    async fn query(&self, _text: &str, limit: usize) -> IndexResult<Vec<ScoredEntry>> {
        self.queried_limits.lock().unwrap().push(limit);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("scripted query failure".to_string()));
        }
        Ok(self.hits.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn delete(&self, ids: &[EntryId]) -> IndexResult<usize> {
        let mut hits = self.hits.lock().unwrap();
        let before = hits.len();
        hits.retain(|hit| !ids.contains(&hit.entry.id));
        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        Ok(before - hits.len())
    }

    async fn entries(&self) -> IndexResult<Vec<IndexEntry>> {
        Ok(self.hits.lock().unwrap().iter().map(|hit| hit.entry.clone()).collect())
    }
}
