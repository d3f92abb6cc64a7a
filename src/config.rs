use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::db::PartitionOptions;
use crate::models::{is_valid_board_name, BoardConfig};

/// Process settings, read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 64KB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory; partitions live in `<data_dir>/boards/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Board list, re-read on every reload
    #[serde(default = "default_boards_file")]
    pub boards_file: PathBuf,
    /// Longest a request waits for an in-progress reload
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,
    /// Longest a reload waits for in-flight requests to drain
    #[serde(default = "default_reload_timeout")]
    pub reload_timeout_secs: u64,
    /// Reader connections per partition
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
    /// SQLite busy timeout in milliseconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins (comma-separated, or "*" for any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8088 }
fn default_max_body_size() -> usize { 64 * 1024 } // 64KB
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_boards_file() -> PathBuf { PathBuf::from("boards.toml") }
fn default_claim_timeout() -> u64 { 30 }
fn default_reload_timeout() -> u64 { 60 }
fn default_max_readers() -> u32 { 4 }
fn default_busy_timeout() -> u64 { 5000 }
fn default_cors_origins() -> String { "*".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            boards_file: default_boards_file(),
            claim_timeout_secs: default_claim_timeout(),
            reload_timeout_secs: default_reload_timeout(),
            max_readers: default_max_readers(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl StorageConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    pub fn partition_options(&self) -> PartitionOptions {
        PartitionOptions {
            max_readers: self.max_readers,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: impl FnOnce() -> T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            server: ServerConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| default_host()),
                port: env_or("PORT", default_port),
                max_body_size: env_or("MAX_BODY_SIZE", default_max_body_size),
            },
            storage: StorageConfig {
                data_dir: std::env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_data_dir()),
                boards_file: std::env::var("BOARDS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_boards_file()),
                claim_timeout_secs: env_or("CLAIM_TIMEOUT_SECS", default_claim_timeout),
                reload_timeout_secs: env_or("RELOAD_TIMEOUT_SECS", default_reload_timeout),
                max_readers: env_or("PARTITION_MAX_READERS", default_max_readers),
                busy_timeout_ms: env_or("PARTITION_BUSY_TIMEOUT_MS", default_busy_timeout),
            },
            security: SecurityConfig {
                cors_origins: std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| default_cors_origins()),
            },
        };

        if config.storage.claim_timeout_secs == 0 {
            bail!("CLAIM_TIMEOUT_SECS must be at least 1");
        }
        if config.storage.reload_timeout_secs == 0 {
            bail!("RELOAD_TIMEOUT_SECS must be at least 1");
        }

        Ok(config)
    }
}

/// Names taken by fixed routes; a board with one of these would be unreachable
pub const RESERVED_BOARD_NAMES: &[&str] = &["health", "ready"];

/// The reloadable part of the configuration: the board list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BoardsConfig {
    #[serde(default)]
    pub boards: Vec<BoardConfig>,
}

impl BoardsConfig {
    /// Validate and sort by name
    pub fn new(mut boards: Vec<BoardConfig>) -> Result<Self> {
        let mut seen = HashSet::new();
        for board in &boards {
            if !is_valid_board_name(&board.name) {
                bail!("invalid board name: {:?}", board.name);
            }
            if RESERVED_BOARD_NAMES.contains(&board.name.as_str()) {
                bail!("board name {:?} is reserved", board.name);
            }
            if !seen.insert(board.name.as_str()) {
                bail!("board /{}/ is defined more than once", board.name);
            }
            if board.max_threads < 1 {
                bail!("board /{}/: max_threads must be at least 1", board.name);
            }
            if board.max_replies < 0 {
                bail!("board /{}/: max_replies must not be negative", board.name);
            }
            if board.max_post_bytes < 1 {
                bail!("board /{}/: max_post_bytes must be at least 1", board.name);
            }
        }

        boards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { boards })
    }

    /// Look up a board by name
    pub fn get(&self, name: &str) -> Option<&BoardConfig> {
        self.boards
            .binary_search_by(|b| b.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.boards[idx])
    }

    /// Parse a board file; the format follows the extension (toml, json, yaml)
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw: BoardsConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("failed to read board file {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("malformed board file {}", path.display()))?;

        Self::new(raw.boards)
    }
}

/// Where the coordinator gets its board list from on start and reload
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<BoardsConfig>;
}

/// Board list read from a file on disk
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<BoardsConfig> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || BoardsConfig::from_file(&path))
            .await
            .context("board file loader panicked")?
    }
}

/// Board list held in memory; swap it with [`MemoryConfigSource::set`]
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    boards: RwLock<Vec<BoardConfig>>,
}

impl MemoryConfigSource {
    pub fn new(boards: Vec<BoardConfig>) -> Self {
        Self {
            boards: RwLock::new(boards),
        }
    }

    pub fn set(&self, boards: Vec<BoardConfig>) {
        match self.boards.write() {
            Ok(mut guard) => *guard = boards,
            Err(_) => tracing::warn!(
                "Board list lock poisoned, dropping new list of {} board(s)",
                boards.len()
            ),
        }
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    async fn load(&self) -> Result<BoardsConfig> {
        let boards = self
            .boards
            .read()
            .map_err(|_| anyhow::anyhow!("board list lock poisoned"))?
            .clone();
        BoardsConfig::new(boards)
    }
}
