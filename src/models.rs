use crate::errors::PipelineError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// A filesystem object flowing through one pipeline step.
///
/// Never persisted directly: only the summary and path metadata derived from it
/// end up in the vector index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Base name, never empty
    pub name: String,
    /// Absolute path
    pub path: PathBuf,
    /// Lower-cased extension without the dot
    pub extension: Option<String>,
    /// Raw bytes, absent once the file has been persisted or when built from an index hit
    pub content: Option<Vec<u8>>,
    pub summary: Option<String>,
    pub size_bytes: Option<u64>,
    /// ISO-8601, filled from live metadata
    pub created_at: Option<String>,
    /// ISO-8601, filled from live metadata
    pub modified_at: Option<String>,
}

impl File {
    /// Create a new File; the extension is inferred from `name` when not given
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        extension: Option<String>,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::InvalidFile("file name must not be empty".to_string()));
        }
        let extension = extension
            .map(|ext| ext.to_lowercase())
            .or_else(|| utils::get_extension(Path::new(&name)));

        Ok(Self {
            name,
            path: path.into(),
            extension,
            content: None,
            summary: None,
            size_bytes: None,
            created_at: None,
            modified_at: None,
        })
    }

    /// Load a file's bytes from disk for processing
    pub async fn read_from(path: &Path) -> Result<Self, PipelineError> {
        let name = utils::basename(path).ok_or_else(|| {
            PipelineError::InvalidFile(format!("no file name in {}", path.display()))
        })?;
        let content = tokio::fs::read(path).await?;
        let mut file = Self::new(name, path, None)?;
        file.size_bytes = Some(content.len() as u64);
        file.content = Some(content);
        Ok(file)
    }

    /// Set the summary. The first summary wins; later calls are ignored.
    pub fn add_summary(&mut self, summary: impl Into<String>) {
        if self.summary.is_none() {
            self.summary = Some(summary.into());
        }
    }

    /// Overwrite size and timestamps with what the filesystem reports right now
    pub fn apply_metadata(&mut self, metadata: &Metadata) {
        self.size_bytes = Some(metadata.len());
        let modified = metadata.modified().ok();
        let created = metadata.created().ok().or(modified);
        self.created_at = created.map(utils::to_iso8601);
        self.modified_at = modified.map(utils::to_iso8601);
    }
}

/// Wire shape of one `/query` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub summary: Option<String>,
    pub extension: Option<String>,
    pub size_bytes: Option<u64>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
}

impl From<File> for FileRecord {
    fn from(file: File) -> Self {
        Self {
            path: file.path.to_string_lossy().to_string(),
            name: file.name,
            summary: file.summary,
            extension: file.extension,
            size_bytes: file.size_bytes,
            created_at: file.created_at,
            modified_at: file.modified_at,
        }
    }
}
