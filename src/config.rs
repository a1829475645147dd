use crate::utils;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

const USER_CONFIG: &str = "~/.config/filewarden/settings.toml";

/// Application configuration loaded from settings.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directories observed for new and modified files
    #[serde(default)]
    pub watch_paths: Vec<String>,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Destination folder -> human-readable description
    #[serde(default)]
    pub folders: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_concurrent_events")]
    pub max_concurrent_events: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_name")]
    pub summary_model: String,
    #[serde(default = "default_model_name")]
    pub classifier_model: String,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
    #[serde(default)]
    pub classifier_temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index file; defaults to `<data_dir>/index.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Candidates farther than this are not returned
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
    /// Candidate over-fetch multiple of `return_length`
    #[serde(default = "default_overfetch")]
    pub overfetch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Extracted text is cut to this many characters before summarizing
    #[serde(default = "default_token_threshold")]
    pub token_threshold: Option<usize>,
    /// Repeat events with unchanged content inside this window are skipped
    #[serde(default = "default_echo_ttl_secs")]
    pub echo_ttl_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8765
}

fn default_data_dir() -> String {
    "~/.local/share/filewarden".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_concurrent_events() -> usize {
    4
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_model_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_model_name() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_summary_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dims() -> usize {
    768 // nomic-embed-text
}

fn default_distance_threshold() -> f32 {
    1.7
}

fn default_overfetch() -> usize {
    3
}

fn default_token_threshold() -> Option<usize> {
    Some(10_000)
}

fn default_echo_ttl_secs() -> u64 {
    30
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            queue_capacity: default_queue_capacity(),
            max_concurrent_events: default_max_concurrent_events(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            summary_model: default_model_name(),
            classifier_model: default_model_name(),
            summary_temperature: default_summary_temperature(),
            classifier_temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            distance_threshold: default_distance_threshold(),
            overfetch: default_overfetch(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_threshold: default_token_threshold(),
            echo_ttl_secs: default_echo_ttl_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            daemon: DaemonConfig::default(),
            model: ModelConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            index: IndexConfig::default(),
            pipeline: PipelineConfig::default(),
            folders: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::parse(&content)
    }

    /// Same as `from_file`, without blocking the runtime
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Write the configuration as TOML, replacing `path` atomically
    pub async fn write(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace config file {}", path.display()))?;
        Ok(())
    }

    /// First config file that exists, in lookup order
    pub fn locate() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(explicit) = std::env::var("FILEWARDEN_CONFIG") {
            candidates.push(utils::expand_path(&explicit));
        }
        candidates.push(PathBuf::from("config/settings.toml"));
        candidates.push(utils::expand_path(USER_CONFIG));

        candidates.into_iter().find(|path| path.exists())
    }

    /// Where settings edits go when no config file exists yet
    pub fn default_location() -> PathBuf {
        match std::env::var("FILEWARDEN_CONFIG") {
            Ok(explicit) => utils::expand_path(&explicit),
            Err(_) => utils::expand_path(USER_CONFIG),
        }
    }

    /// Model API key from config or environment variable
    pub fn model_api_key(&self) -> Option<String> {
        self.model
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    }

    pub fn data_dir(&self) -> PathBuf {
        utils::expand_path(&self.daemon.data_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        match &self.index.path {
            Some(path) => utils::expand_path(path),
            None => self.data_dir().join("index.json"),
        }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir().join("filewarden.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir().join("filewarden.log")
    }

    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.daemon.host, self.daemon.port)
    }

    /// Watch paths with `~` expanded, duplicates removed, order kept
    pub fn resolved_watch_paths(&self) -> Vec<PathBuf> {
        let mut seen = std::collections::HashSet::new();
        self.watch_paths
            .iter()
            .map(|raw| utils::expand_path(raw))
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    pub fn resolved_folders(&self) -> BTreeMap<PathBuf, String> {
        self.folders
            .iter()
            .map(|(path, desc)| (utils::expand_path(path), desc.clone()))
            .collect()
    }
}

/// Source of the externally owned settings the daemon reads at runtime.
///
/// Implementations are expected to reflect external edits, so callers ask
/// again every time instead of caching.
#[async_trait::async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Current Watch Path Set, ordered, without duplicates
    async fn watch_paths(&self) -> Vec<PathBuf>;

    /// Current destination folder associations (path -> description)
    async fn folder_associations(&self) -> BTreeMap<PathBuf, String>;
}

/// Settings re-read from the TOML file on every call.
///
/// A file that fails to parse keeps the last good snapshot. Edits made
/// through this type rewrite the whole file.
pub struct FileSettings {
    path: PathBuf,
    last_good: RwLock<Config>,
    edit: tokio::sync::Mutex<()>,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>, initial: Config) -> Self {
        Self {
            path: path.into(),
            last_good: RwLock::new(initial),
            edit: tokio::sync::Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Config {
        self.last_good
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    async fn current(&self) -> Config {
        match Config::read(&self.path).await {
            Ok(config) => {
                if let Ok(mut guard) = self.last_good.write() {
                    *guard = config.clone();
                }
                config
            }
            Err(e) => {
                warn!(path = %self.path.display(), "settings reload failed, using last good copy: {e:#}");
                self.snapshot()
            }
        }
    }

    /// Config to edit: the file as it is now, or the initial one if there is no file yet
    async fn load_for_edit(&self) -> Result<Config> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => Config::read(&self.path).await,
            _ => Ok(self.snapshot()),
        }
    }

    async fn save(&self, config: Config) -> Result<()> {
        config.write(&self.path).await?;
        if let Ok(mut guard) = self.last_good.write() {
            *guard = config;
        }
        Ok(())
    }

    /// Add a directory to the Watch Path Set. Returns the path as stored.
    pub async fn add_watch_path(&self, path: &Path) -> Result<PathBuf> {
        let _edit = self.edit.lock().await;
        let dir = existing_dir(path).await?;

        let mut config = self.load_for_edit().await?;
        if find_entry(config.watch_paths.iter(), &dir).await.is_some() {
            bail!("The folder '{}' is already being watched", dir.display());
        }
        config.watch_paths.push(dir.to_string_lossy().into_owned());
        self.save(config).await?;

        info!(path = %dir.display(), "watch path added");
        Ok(dir)
    }

    pub async fn remove_watch_path(&self, path: &Path) -> Result<PathBuf> {
        let _edit = self.edit.lock().await;
        let target = resolve_path(path).await?;

        let mut config = self.load_for_edit().await?;
        let Some((position, _)) = find_entry(config.watch_paths.iter(), &target).await else {
            bail!("The folder '{}' is not in the watch list", target.display());
        };
        config.watch_paths.remove(position);
        self.save(config).await?;

        info!(path = %target.display(), "watch path removed");
        Ok(target)
    }

    /// Associate a destination folder with a description, replacing any
    /// previous description for the same folder
    pub async fn set_folder(&self, path: &Path, description: &str) -> Result<PathBuf> {
        let _edit = self.edit.lock().await;
        let dir = existing_dir(path).await?;

        let mut config = self.load_for_edit().await?;
        if let Some((_, key)) = find_entry(config.folders.keys(), &dir).await {
            config.folders.remove(&key);
        }
        config
            .folders
            .insert(dir.to_string_lossy().into_owned(), description.to_string());
        self.save(config).await?;

        info!(path = %dir.display(), "folder association saved");
        Ok(dir)
    }

    pub async fn remove_folder(&self, path: &Path) -> Result<PathBuf> {
        let _edit = self.edit.lock().await;
        let target = resolve_path(path).await?;

        let mut config = self.load_for_edit().await?;
        let Some((_, key)) = find_entry(config.folders.keys(), &target).await else {
            bail!(
                "The folder '{}' is not in the list of folder associations",
                target.display()
            );
        };
        config.folders.remove(&key);
        self.save(config).await?;

        info!(path = %target.display(), "folder association removed");
        Ok(target)
    }
}

#[async_trait::async_trait]
impl SettingsProvider for FileSettings {
    async fn watch_paths(&self) -> Vec<PathBuf> {
        self.current().await.resolved_watch_paths()
    }

    async fn folder_associations(&self) -> BTreeMap<PathBuf, String> {
        self.current().await.resolved_folders()
    }
}

/// `~`-expanded, symlink-free absolute form of `path`. Paths that do not
/// exist (any more) keep their absolute, unresolved form.
async fn resolve_path(path: &Path) -> Result<PathBuf> {
    let expanded = utils::expand_path(&path.to_string_lossy());
    if let Ok(canonical) = tokio::fs::canonicalize(&expanded).await {
        return Ok(canonical);
    }
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(cwd.join(expanded))
}

async fn existing_dir(path: &Path) -> Result<PathBuf> {
    let resolved = resolve_path(path).await?;
    let is_dir = tokio::fs::metadata(&resolved)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        bail!("The path '{}' is not a directory", resolved.display());
    }
    Ok(resolved)
}

/// First configured entry (position, raw text) that resolves to `target`
async fn find_entry<'a>(
    entries: impl Iterator<Item = &'a String>,
    target: &Path,
) -> Option<(usize, String)> {
    for (position, raw) in entries.enumerate() {
        match resolve_path(Path::new(raw)).await {
            Ok(resolved) if resolved == target => return Some((position, raw.clone())),
            _ => {}
        }
    }
    None
}

/// In-memory settings, mutable at runtime
#[derive(Default)]
pub struct StaticSettings {
    watch_paths: RwLock<Vec<PathBuf>>,
    folders: RwLock<BTreeMap<PathBuf, String>>,
}

impl StaticSettings {
    pub fn new(watch_paths: Vec<PathBuf>, folders: BTreeMap<PathBuf, String>) -> Self {
        Self {
            watch_paths: RwLock::new(watch_paths),
            folders: RwLock::new(folders),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.resolved_watch_paths(), config.resolved_folders())
    }

    pub fn set_watch_paths(&self, paths: Vec<PathBuf>) {
        if let Ok(mut guard) = self.watch_paths.write() {
            *guard = paths;
        }
    }
}

#[async_trait::async_trait]
impl SettingsProvider for StaticSettings {
    async fn watch_paths(&self) -> Vec<PathBuf> {
        self.watch_paths
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    async fn folder_associations(&self) -> BTreeMap<PathBuf, String> {
        self.folders
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}
