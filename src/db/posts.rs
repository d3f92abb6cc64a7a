use crate::error::{AppError, Result};
use crate::models::NewPost;

impl super::Partition {
    /// Create a thread together with its opening post.
    ///
    /// Both rows are written in one transaction. Timestamps, the OP link and
    /// the reply counter are filled in by the `derive_thread_state` trigger
    /// when the post lands. Returns `(thread_id, post_id)`.
    pub async fn create_thread(&self, topic: &str, op: &NewPost) -> Result<(i64, i64)> {
        let mut tx = self.writer.begin().await?;

        let thread_id = sqlx::query("INSERT INTO thread (topic) VALUES (?)")
            .bind(topic)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let post_id = sqlx::query("INSERT INTO post (thread_id, author, content) VALUES (?, ?, ?)")
            .bind(thread_id)
            .bind(&op.author)
            .bind(&op.content)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        tx.commit().await?;

        tracing::debug!(
            "Created thread {} (op {}) on /{}/",
            thread_id,
            post_id,
            self.board()
        );
        Ok((thread_id, post_id))
    }

    /// Append a reply to an existing thread.
    ///
    /// The insert bumps the thread's reply count by one and advances its
    /// last activity to the new post's timestamp in the same statement.
    pub async fn add_reply(&self, thread_id: i64, post: &NewPost) -> Result<i64> {
        let mut tx = self.writer.begin().await?;

        let thread: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM thread WHERE id = ? AND op_id IS NOT NULL")
                .bind(thread_id)
                .fetch_optional(&mut *tx)
                .await?;
        if thread.is_none() {
            return Err(AppError::NotFound(format!("No such thread: {}", thread_id)));
        }

        let post_id = sqlx::query("INSERT INTO post (thread_id, author, content) VALUES (?, ?, ?)")
            .bind(thread_id)
            .bind(&post.author)
            .bind(&post.content)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        tx.commit().await?;

        tracing::debug!(
            "Added reply {} to thread {} on /{}/",
            post_id,
            thread_id,
            self.board()
        );
        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Partition, PartitionOptions};
    use crate::error::AppError;
    use crate::models::NewPost;

    fn post(author: Option<&str>, content: &str) -> NewPost {
        NewPost::validate(author, content, 8192).unwrap()
    }

    async fn open(dir: &tempfile::TempDir) -> Partition {
        Partition::open(dir.path(), "g", &PartitionOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_thread_has_only_op() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;

        let (thread_id, post_id) = partition
            .create_thread("Candlejack", &post(Some("m00t"), "I'm not afraid"))
            .await
            .unwrap();

        let thread = partition.get_thread(thread_id).await.unwrap();
        assert_eq!(thread.topic, "Candlejack");
        assert_eq!(thread.reply_count, 0);
        assert_eq!(thread.posts.len(), 1);

        let op = &thread.posts[0];
        assert_eq!(op.id, post_id);
        assert_eq!(op.author, "m00t");
        assert_eq!(thread.created_at, op.created_at);
        assert_eq!(thread.active_at, op.created_at);
        partition.close().await;
    }

    #[tokio::test]
    async fn test_replies_update_counters() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;
        let (thread_id, _) = partition.create_thread("t", &post(None, "op")).await.unwrap();

        let n = 7;
        for i in 0..n {
            partition
                .add_reply(thread_id, &post(None, &format!("reply {}", i)))
                .await
                .unwrap();
        }

        let thread = partition.get_thread(thread_id).await.unwrap();
        assert_eq!(thread.reply_count, n);
        assert_eq!(thread.posts.len() as i64, n + 1);
        let latest = thread.posts.last().unwrap();
        assert_eq!(latest.content, "reply 6");
        assert_eq!(thread.active_at, latest.created_at);
        // Created-at never moves after the OP
        assert_eq!(thread.created_at, thread.posts[0].created_at);
        partition.close().await;
    }

    #[tokio::test]
    async fn test_reply_to_missing_thread() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;

        let err = partition.add_reply(42, &post(None, "hello?")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Nothing was written
        let stats = partition.stats().await.unwrap();
        assert_eq!(stats.post_count, 0);
        partition.close().await;
    }

    #[tokio::test]
    async fn test_concurrent_replies_never_lose_increments() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;
        let (thread_id, _) = partition.create_thread("race", &post(None, "op")).await.unwrap();

        let k = 32;
        let tasks: Vec<_> = (0..k)
            .map(|i| {
                let partition = partition.clone();
                tokio::spawn(async move {
                    partition
                        .add_reply(thread_id, &post(None, &format!("reply {}", i)))
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let thread = partition.get_thread(thread_id).await.unwrap();
        assert_eq!(thread.reply_count, k);
        assert_eq!(thread.posts.len() as i64, k + 1);
        partition.close().await;
    }

    #[tokio::test]
    async fn test_activity_never_moves_backward() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;
        let (thread_id, _) = partition.create_thread("t", &post(None, "op")).await.unwrap();
        let before = partition.get_thread(thread_id).await.unwrap();

        // A post stamped earlier than the current activity
        sqlx::query(
            "INSERT INTO post (thread_id, author, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind("Anonymous")
        .bind("from the past")
        .bind("2000-01-01T00:00:00.000Z")
        .execute(&partition.writer)
        .await
        .unwrap();

        let after = partition.get_thread(thread_id).await.unwrap();
        assert_eq!(after.reply_count, 1);
        assert_eq!(after.active_at, before.active_at);
        assert_eq!(after.created_at, before.created_at);
        partition.close().await;
    }

    #[tokio::test]
    async fn test_unfinished_thread_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;

        {
            let mut tx = partition.writer.begin().await.unwrap();
            sqlx::query("INSERT INTO thread (topic) VALUES (?)")
                .bind("abandoned")
                .execute(&mut *tx)
                .await
                .unwrap();
            // Dropped without commit
        }

        let (raw_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM thread")
            .fetch_one(&partition.writer)
            .await
            .unwrap();
        assert_eq!(raw_count, 0);
        assert_eq!(partition.stats().await.unwrap().thread_count, 0);

        let (thread_id, _) = partition.create_thread("real", &post(None, "op")).await.unwrap();
        let stats = partition.stats().await.unwrap();
        assert_eq!(stats.thread_count, 1);
        assert_eq!(stats.post_count, 1);
        assert_eq!(partition.get_thread(thread_id).await.unwrap().topic, "real");
        partition.close().await;
    }

    #[tokio::test]
    async fn test_posts_are_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let partition = open(&dir).await;
        let (_, post_id) = partition.create_thread("t", &post(None, "op")).await.unwrap();

        let update = sqlx::query("UPDATE post SET content = 'edited' WHERE id = ?")
            .bind(post_id)
            .execute(&partition.writer)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM post WHERE id = ?")
            .bind(post_id)
            .execute(&partition.writer)
            .await;
        assert!(delete.is_err());
        partition.close().await;
    }
}
