pub mod local;
pub mod r#trait;

pub use local::LocalVectorIndex;
pub use r#trait::VectorIndex;

use serde::{Deserialize, Serialize};

/// Opaque unique entry id
pub type EntryId = String;

/// Path metadata stored next to each summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Where the file was at the moment the entry was written
    pub path: String,
    pub basename: String,
    pub extension: Option<String>,
}

/// Entry about to be written; the index assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Text used for similarity matching (the file summary)
    pub document: String,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: EntryId,
    pub document: String,
    pub metadata: EntryMetadata,
}

/// Query hit with its dissimilarity score (lower is closer)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub distance: f32,
}
