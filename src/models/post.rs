use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// Author shown when a poster leaves the name field empty
pub const ANONYMOUS: &str = "Anonymous";

/// A stored post. Posts are append-only; nothing here is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Post {
    /// Partition-local post number
    pub id: i64,
    pub thread_id: i64,
    pub author: String,
    pub content: String,
    /// Assigned by the storage layer on insert
    pub created_at: DateTime<Utc>,
}

/// A post that passed validation and may be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub author: String,
    pub content: String,
}

impl NewPost {
    /// Validate raw input against a board's byte limit.
    ///
    /// Content is trimmed and must be non-empty; an empty or missing name
    /// becomes [`ANONYMOUS`].
    pub fn validate(name: Option<&str>, content: &str, max_bytes: usize) -> Result<Self> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("empty post content".to_string()));
        }
        if content.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "post too large: {} bytes (max {} bytes)",
                content.len(),
                max_bytes
            )));
        }

        let author = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(ANONYMOUS)
            .to_string();

        Ok(Self {
            author,
            content: content.to_string(),
        })
    }
}

/// Request to create a new thread
#[derive(Debug, Default, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Request to reply to a thread
#[derive(Debug, Default, Deserialize)]
pub struct CreateReplyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_anonymous() {
        let post = NewPost::validate(None, "hello", 100).unwrap();
        assert_eq!(post.author, ANONYMOUS);

        let post = NewPost::validate(Some("   "), "hello", 100).unwrap();
        assert_eq!(post.author, ANONYMOUS);

        let post = NewPost::validate(Some(" m00t "), "hello", 100).unwrap();
        assert_eq!(post.author, "m00t");
    }

    #[test]
    fn test_rejects_empty_content() {
        assert!(matches!(
            NewPost::validate(None, "  \n\t ", 100),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_byte_limit() {
        // Limit counts bytes, not characters
        assert!(NewPost::validate(None, "ab", 2).is_ok());
        assert!(matches!(
            NewPost::validate(None, "abc", 2),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            NewPost::validate(None, "é", 1),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_content_is_trimmed() {
        let post = NewPost::validate(None, "  spaced out  ", 12).unwrap();
        assert_eq!(post.content, "spaced out");
    }
}
