use crate::analysis::{Classification, Classifier, Summarizer};
use crate::errors::PipelineResult;
use crate::extractor::{self, TextExtractor};
use crate::index::{EntryId, EntryMetadata, NewEntry, VectorIndex};
use crate::models::File;
use crate::pipeline::recent::RecentEvents;
use crate::pipeline::relocate;
use crate::utils;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to one file event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// One new index entry was written; `path` is where the file is now
    Indexed { id: EntryId, path: PathBuf, moved: bool },
    /// Same content was just handled at this path
    Skipped,
}

/// Extract, summarize, classify, relocate and index one file.
///
/// An event either produces exactly one index entry or none. Any failure
/// before the entry is written leaves the file where it was.
pub struct SavePipeline {
    extractor: Arc<dyn TextExtractor>,
    summarizer: Summarizer,
    classifier: Classifier,
    index: Arc<dyn VectorIndex>,
    max_chars: Option<usize>,
    recent: RecentEvents,
}

impl SavePipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        summarizer: Summarizer,
        classifier: Classifier,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            classifier,
            index,
            max_chars: None,
            recent: RecentEvents::default(),
        }
    }

    /// Cut extracted text to this many characters before summarizing
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// How long an unchanged repeat event for a handled file is ignored
    pub fn with_echo_ttl(mut self, ttl: Duration) -> Self {
        self.recent = RecentEvents::new(ttl);
        self
    }

    /// Handle a create/modify event for `path`
    pub async fn process_path(&self, path: &Path) -> PipelineResult<SaveOutcome> {
        let file = File::read_from(path).await?;
        let hash = utils::content_hash(file.content.as_deref().unwrap_or_default());

        let canonical = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        if self.recent.is_echo(&canonical, &hash) {
            debug!(path = %path.display(), "content unchanged since last event, skipping");
            return Ok(SaveOutcome::Skipped);
        }

        let outcome = self.process(file).await?;
        if let SaveOutcome::Indexed { path, .. } = &outcome {
            let canonical = tokio::fs::canonicalize(path)
                .await
                .unwrap_or_else(|_| path.clone());
            self.recent.remember(&canonical, &hash);
        }
        Ok(outcome)
    }

    pub async fn process(&self, mut file: File) -> PipelineResult<SaveOutcome> {
        let content = file.content.take().unwrap_or_default();
        let text = extractor::extract_text(
            self.extractor.as_ref(),
            &content,
            file.extension.as_deref(),
            self.max_chars,
        )
        .await;

        let summary = self.summarizer.summarize(&file.name, &text).await?;
        file.add_summary(summary.clone());

        let classification = match self.classifier.classify(&file.name, &summary).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(path = %file.path.display(), "classification failed, leaving file in place: {e}");
                Classification::NoDestination
            }
        };

        let original = file.path.clone();
        let mut moved = false;
        if let Some(folder) = classification.destination() {
            match relocate::relocate(&file.path, folder).await {
                Ok(Some(target)) => {
                    info!(from = %original.display(), to = %target.display(), "file relocated");
                    file.path = target;
                    moved = true;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %file.path.display(), folder = %folder.display(), "relocation failed: {e}");
                }
            }
        }

        let entry = NewEntry {
            document: summary,
            metadata: EntryMetadata {
                path: file.path.to_string_lossy().to_string(),
                basename: file.name.clone(),
                extension: file.extension.clone(),
            },
        };

        let id = match self.index.add(entry).await {
            Ok(id) => id,
            Err(e) => {
                if moved {
                    if let Err(undo) = relocate::move_file(&file.path, &original).await {
                        warn!(
                            path = %file.path.display(),
                            original = %original.display(),
                            "could not move file back after index failure: {undo}"
                        );
                    }
                }
                return Err(e.into());
            }
        };

        info!(id = %id, path = %file.path.display(), "file indexed");
        Ok(SaveOutcome::Indexed {
            id,
            path: file.path,
            moved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSettings;
    use crate::errors::{ModelError, PipelineError};
    use crate::extractor::DocumentExtractor;
    use crate::index::LocalVectorIndex;
    use crate::testing::{BagOfWordsEmbedder, ScriptedIndex, ScriptedModel};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        inbox: PathBuf,
        reports: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let inbox = temp_dir.path().join("inbox");
        let reports = temp_dir.path().join("docs").join("reports");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(&reports).unwrap();
        Fixture {
            temp_dir,
            inbox,
            reports,
        }
    }

    fn pipeline(
        answers: Vec<Result<String, ModelError>>,
        folders: BTreeMap<PathBuf, String>,
        index: Arc<dyn VectorIndex>,
    ) -> (SavePipeline, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(answers));
        let settings = Arc::new(StaticSettings::new(Vec::new(), folders));
        let pipeline = SavePipeline::new(
            Arc::new(DocumentExtractor::new()),
            Summarizer::new(model.clone()),
            Classifier::new(model.clone(), settings),
            index,
        );
        (pipeline, model)
    }

    fn reports_folder(fx: &Fixture) -> BTreeMap<PathBuf, String> {
        BTreeMap::from([(fx.reports.clone(), "quarterly reports".to_string())])
    }

    #[tokio::test]
    async fn test_report_is_moved_and_indexed_at_new_path() {
        let fx = fixture();
        let embedder = Arc::new(BagOfWordsEmbedder::new());
        let index_path = fx.temp_dir.path().join("index.json");
        let index = Arc::new(LocalVectorIndex::open(index_path, embedder).await.unwrap());
        let (pipeline, _) = pipeline(
            vec![
                Ok("A Q3 financial report.".to_string()),
                Ok(format!("{}\n", fx.reports.display())),
            ],
            reports_folder(&fx),
            index.clone(),
        );
        let source = fx.inbox.join("report.pdf");
        std::fs::write(&source, b"%PDF-not-really").unwrap();

        let outcome = pipeline.process_path(&source).await.unwrap();

        let target = fx.reports.join("report.pdf");
        assert!(matches!(outcome, SaveOutcome::Indexed { moved: true, .. }));
        assert!(!source.exists());
        assert!(target.exists());

        let entries = index.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document, "A Q3 financial report.");
        assert_eq!(entries[0].metadata.path, target.to_string_lossy());
        assert_eq!(entries[0].metadata.basename, "report.pdf");
        assert_eq!(entries[0].metadata.extension.as_deref(), Some("pdf"));
    }

    #[tokio::test]
    async fn test_extracted_text_reaches_the_summarizer() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        let (pipeline, model) = pipeline(vec![Ok("Shopping list.".to_string())], BTreeMap::new(), index.clone());
        let pipeline = pipeline.with_max_chars(Some(9));
        let source = fx.inbox.join("list.txt");
        std::fs::write(&source, "milk   eggs\n\nbread").unwrap();

        pipeline.process_path(&source).await.unwrap();

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("File Name: list.txt"));
        assert!(prompts[0].contains("File Content:\nmilk eggs\n"));
        assert_eq!(index.added()[0].metadata.path, source.to_string_lossy());
    }

    #[tokio::test]
    async fn test_summary_failure_creates_no_entry() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        let (pipeline, _) = pipeline(
            vec![Err(ModelError::Unavailable("503".to_string()))],
            reports_folder(&fx),
            index.clone(),
        );
        let source = fx.inbox.join("report.txt");
        std::fs::write(&source, "revenue").unwrap();

        let result = pipeline.process_path(&source).await;

        assert!(matches!(result, Err(PipelineError::Model(ModelError::Unavailable(_)))));
        assert!(index.added().is_empty());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_classifier_failure_indexes_in_place() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        let (pipeline, _) = pipeline(
            vec![
                Ok("A Q3 report.".to_string()),
                Err(ModelError::MalformedResponse("{}".to_string())),
            ],
            reports_folder(&fx),
            index.clone(),
        );
        let source = fx.inbox.join("report.txt");
        std::fs::write(&source, "revenue").unwrap();

        let outcome = pipeline.process_path(&source).await.unwrap();

        assert!(matches!(outcome, SaveOutcome::Indexed { moved: false, .. }));
        assert!(source.exists());
        let added = index.added();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].metadata.path, source.to_string_lossy());
    }

    #[tokio::test]
    async fn test_index_failure_moves_file_back() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        index.fail_adds();
        let (pipeline, _) = pipeline(
            vec![
                Ok("A Q3 report.".to_string()),
                Ok(fx.reports.display().to_string()),
            ],
            reports_folder(&fx),
            index.clone(),
        );
        let source = fx.inbox.join("report.txt");
        std::fs::write(&source, "revenue").unwrap();

        let result = pipeline.process_path(&source).await;

        assert!(matches!(result, Err(PipelineError::Index(_))));
        assert!(source.exists());
        assert!(!fx.reports.join("report.txt").exists());
    }

    #[tokio::test]
    async fn test_repeated_event_with_same_content_is_skipped() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        let (pipeline, model) = pipeline(
            vec![Ok("First.".to_string()), Ok("Second.".to_string())],
            BTreeMap::new(),
            index.clone(),
        );
        let source = fx.inbox.join("notes.md");
        std::fs::write(&source, "# todo").unwrap();

        pipeline.process_path(&source).await.unwrap();
        assert_eq!(pipeline.process_path(&source).await.unwrap(), SaveOutcome::Skipped);
        assert_eq!(model.prompts().len(), 1);

        // Changed content appends a second entry for the same path
        std::fs::write(&source, "# todo\n- ship it").unwrap();
        pipeline.process_path(&source).await.unwrap();
        let added = index.added();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].metadata.path, added[1].metadata.path);
    }

    #[tokio::test]
    async fn test_zero_echo_ttl_reprocesses_unchanged_content() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        let (pipeline, model) = pipeline(
            vec![Ok("First.".to_string()), Ok("Second.".to_string())],
            BTreeMap::new(),
            index.clone(),
        );
        let pipeline = pipeline.with_echo_ttl(Duration::ZERO);
        let source = fx.inbox.join("notes.md");
        std::fs::write(&source, "# todo").unwrap();

        pipeline.process_path(&source).await.unwrap();
        let second = pipeline.process_path(&source).await.unwrap();

        assert!(matches!(second, SaveOutcome::Indexed { .. }));
        assert_eq!(model.prompts().len(), 2);
        assert_eq!(index.added().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let fx = fixture();
        let index = Arc::new(ScriptedIndex::default());
        let (pipeline, model) = pipeline(Vec::new(), BTreeMap::new(), index.clone());

        let result = pipeline.process_path(&fx.inbox.join("gone.txt")).await;

        assert!(matches!(result, Err(PipelineError::Io(_))));
        assert!(model.prompts().is_empty());
    }
}
