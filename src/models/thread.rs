use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BoardInfo, Post};

/// A thread with its full post history, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct Thread {
    pub id: i64,
    pub topic: String,
    /// Number of posts minus the OP
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent post; never moves backward
    pub active_at: DateTime<Utc>,
    pub posts: Vec<Post>,
}

/// A thread as shown in a board listing
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub id: i64,
    pub topic: String,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub active_at: DateTime<Utc>,
    pub op: Post,
}

/// Thread page response
#[derive(Debug, Serialize)]
pub struct ThreadView {
    pub board: BoardInfo,
    pub thread: Thread,
}
