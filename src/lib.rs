pub mod analysis;
pub mod config;
pub mod daemon;
pub mod embeddings;
pub mod errors;
pub mod extractor;
pub mod index;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use daemon::{ControlClient, Daemon};
pub use index::VectorIndex;
pub use llm::LanguageModel;
pub use models::{File, FileRecord};
pub use watcher::{WatchEvent, WatchHandle};
