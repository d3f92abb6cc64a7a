use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{BoardStats, Post, Thread, ThreadSummary};

impl super::Partition {
    /// Threads visible on the board page.
    ///
    /// Only threads with between 0 and `max_replies` replies qualify; the
    /// rest stay in storage and remain reachable through [`get_thread`].
    /// Ordered by last activity, newest first, at most `max_threads` rows.
    ///
    /// [`get_thread`]: Self::get_thread
    pub async fn list_board(&self, max_threads: i64, max_replies: i64) -> Result<Vec<ThreadSummary>> {
        // SQLx can't decode nested structs, so the OP columns are flattened
        #[derive(sqlx::FromRow)]
        struct SummaryRow {
            id: i64,
            topic: String,
            num_replies: i64,
            created_at: DateTime<Utc>,
            active_at: DateTime<Utc>,
            op_id: i64,
            op_author: String,
            op_content: String,
            op_created_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                t.id, t.topic, t.num_replies, t.created_at, t.active_at,
                op.id AS op_id,
                op.author AS op_author,
                op.content AS op_content,
                op.created_at AS op_created_at
            FROM thread t
            INNER JOIN post op ON op.id = t.op_id
            WHERE t.num_replies BETWEEN 0 AND ?
            ORDER BY t.active_at DESC, t.last_post_id DESC
            LIMIT ?
            "#,
        )
        .bind(max_replies)
        .bind(max_threads.max(0))
        .fetch_all(&self.reader)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ThreadSummary {
                id: r.id,
                topic: r.topic,
                reply_count: r.num_replies,
                created_at: r.created_at,
                active_at: r.active_at,
                op: Post {
                    id: r.op_id,
                    thread_id: r.id,
                    author: r.op_author,
                    content: r.op_content,
                    created_at: r.op_created_at,
                },
            })
            .collect())
    }

    /// Full thread, every post in insertion order
    pub async fn get_thread(&self, thread_id: i64) -> Result<Thread> {
        #[derive(sqlx::FromRow)]
        struct ThreadRow {
            id: i64,
            topic: String,
            num_replies: i64,
            created_at: DateTime<Utc>,
            active_at: DateTime<Utc>,
        }

        // One read transaction so the header and posts agree
        let mut tx = self.reader.begin().await?;

        let row = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, topic, num_replies, created_at, active_at
            FROM thread
            WHERE id = ? AND op_id IS NOT NULL
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No such thread: {}", thread_id)))?;

        let posts = sqlx::query_as::<_, Post>(
            "SELECT id, thread_id, author, content, created_at FROM post WHERE thread_id = ? ORDER BY id ASC",
        )
        .bind(thread_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Thread {
            id: row.id,
            topic: row.topic,
            reply_count: row.num_replies,
            created_at: row.created_at,
            active_at: row.active_at,
            posts,
        })
    }

    /// Map a partition-local post number to the thread containing it
    pub async fn resolve_local_id(&self, post_id: i64) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT thread_id FROM post WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.reader)
            .await?;

        row.map(|(thread_id,)| thread_id)
            .ok_or_else(|| AppError::NotFound(format!("No such post: {}", post_id)))
    }

    /// Thread and post totals, hidden threads included
    pub async fn stats(&self) -> Result<BoardStats> {
        let (thread_count, post_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM thread WHERE op_id IS NOT NULL),
                (SELECT COUNT(*) FROM post)
            "#,
        )
        .fetch_one(&self.reader)
        .await?;

        Ok(BoardStats {
            thread_count,
            post_count,
        })
    }
}
