//! Per-board partitions.
//!
//! Every board owns one SQLite file under `<data_dir>/boards/`. Threads and
//! posts never cross partitions, so IDs are only unique within a board.
//! Each handle holds two pools: a reader pool and a single-connection
//! writer pool. The writer pool is the only place a partition is mutated,
//! which serializes all inserts against that board.

mod posts;
mod threads;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::error::{AppError, Result};
use crate::models::is_valid_board_name;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Connection settings shared by every partition
#[derive(Debug, Clone)]
pub struct PartitionOptions {
    /// Reader connections per partition
    pub max_readers: u32,
    /// How long SQLite waits on a locked file before giving up
    pub busy_timeout: Duration,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            max_readers: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Location of a board's partition file under `root`
pub fn partition_path(root: &Path, board: &str) -> PathBuf {
    root.join("boards").join(format!("{}.db", board))
}

/// Open handle to one board's storage
#[derive(Clone)]
pub struct Partition {
    board: Arc<str>,
    path: PathBuf,
    reader: SqlitePool,
    writer: SqlitePool,
}

impl Partition {
    /// Open (creating if needed) the partition for `board` under `root`.
    ///
    /// Safe to call on an already-initialized file: schema setup only
    /// creates what is missing.
    pub async fn open(root: &Path, board: &str, options: &PartitionOptions) -> Result<Self> {
        if !is_valid_board_name(board) {
            return Err(AppError::NotFound(format!("No such board: {}", board)));
        }

        let path = partition_path(root, board);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AppError::Storage(sqlx::Error::Io(e)))?;
        }

        let connect = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(options.busy_timeout)
            .foreign_keys(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect.clone())
            .await?;

        // Close the writer again if the schema can't be applied
        if let Err(e) = Self::apply_schema(&writer, board).await {
            writer.close().await;
            return Err(e);
        }

        let reader = match SqlitePoolOptions::new()
            .max_connections(options.max_readers.max(1))
            .connect_with(connect)
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                writer.close().await;
                return Err(e.into());
            }
        };

        tracing::info!("Opened partition /{}/ at {}", board, path.display());

        Ok(Self {
            board: Arc::from(board),
            path,
            reader,
            writer,
        })
    }

    async fn apply_schema(writer: &SqlitePool, board: &str) -> Result<()> {
        match MIGRATOR.run(writer).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("was previously applied but has been modified") {
                    tracing::warn!(
                        "Partition /{}/ schema checksum mismatch: {}. Continuing anyway - schema statements are idempotent.",
                        board,
                        err_str
                    );
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Release both pools. Later calls through this handle (or any clone of
    /// it) fail with [`AppError::Closed`].
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
        tracing::info!("Closed partition /{}/", self.board);
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_closed() || self.reader.is_closed()
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cheap round trip used by readiness probes
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.reader).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("board", &self.board)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
