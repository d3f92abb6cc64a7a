use serde::{Deserialize, Serialize};

use super::ThreadSummary;
use crate::style::Style;

/// Longest board name accepted; names double as partition file names
pub const MAX_BOARD_NAME_LEN: usize = 32;

/// A board as described by the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board identity, e.g. "g" for /g/. Alphanumeric only.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display style tag (a colour name); resolved into a `Style` on load
    #[serde(default)]
    pub style: String,
    /// Maximum number of threads shown in the board listing
    #[serde(default = "default_max_threads")]
    pub max_threads: i64,
    /// Threads with more replies than this drop out of the listing
    #[serde(default = "default_max_replies")]
    pub max_replies: i64,
    /// Maximum post content size in bytes
    #[serde(default = "default_max_post_bytes")]
    pub max_post_bytes: usize,
}

fn default_max_threads() -> i64 { 50 }
fn default_max_replies() -> i64 { 128 }
fn default_max_post_bytes() -> usize { 8192 }

impl BoardConfig {
    /// Board with default limits
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            style: String::new(),
            max_threads: default_max_threads(),
            max_replies: default_max_replies(),
            max_post_bytes: default_max_post_bytes(),
        }
    }

    pub fn path(&self) -> String {
        format!("/{}/", self.name)
    }
}

/// Whether `name` may be used as a board identity
pub fn is_valid_board_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_BOARD_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Board metadata as published to readers, with its style resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardInfo {
    pub name: String,
    pub description: String,
    pub style: Style,
    /// SGR foreground code for terminal renderers
    pub ansi: Option<u8>,
    /// Foreground colour for HTML renderers
    pub color: Option<&'static str>,
    pub max_threads: i64,
    pub max_replies: i64,
    pub max_post_bytes: usize,
}

impl From<&BoardConfig> for BoardInfo {
    fn from(config: &BoardConfig) -> Self {
        let style = Style::from_tag(&config.style);
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            style,
            ansi: style.ansi_code(),
            color: style.css_color(),
            max_threads: config.max_threads,
            max_replies: config.max_replies,
            max_post_bytes: config.max_post_bytes,
        }
    }
}

/// Partition-wide counts, including threads hidden from the listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoardStats {
    pub thread_count: i64,
    pub post_count: i64,
}

/// Board page: metadata plus the visible window of threads
#[derive(Debug, Serialize)]
pub struct BoardOverview {
    pub board: BoardInfo,
    pub stats: BoardStats,
    pub threads: Vec<ThreadSummary>,
}
