//! Shared board state and its hot reload.
//!
//! The coordinator owns the current [`Bundle`]: the validated board list,
//! one open [`Partition`] per board and the display snapshot derived from
//! them. Requests hold a shared [`Claim`] on the bundle for their whole
//! duration. A reload takes the exclusive side of the same lock, so it
//! waits for in-flight requests to finish and blocks new ones until the
//! swap is done. Tokio's `RwLock` is fair, so a pending reload is never
//! starved by a steady stream of readers.

use futures::future::join_all;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

use crate::config::{BoardsConfig, ConfigSource, StorageConfig};
use crate::db::{Partition, PartitionOptions};
use crate::error::{AppError, Result};
use crate::models::{BoardConfig, BoardInfo};

/// Everything a request needs, swapped atomically on reload
#[derive(Debug, Default)]
pub struct Bundle {
    config: BoardsConfig,
    partitions: HashMap<String, Partition>,
    boards: Vec<BoardInfo>,
}

impl Bundle {
    fn new(config: BoardsConfig, partitions: HashMap<String, Partition>) -> Self {
        let boards = config.boards.iter().map(BoardInfo::from).collect();
        Self {
            config,
            partitions,
            boards,
        }
    }

    /// Display snapshot, sorted by board name
    pub fn boards(&self) -> &[BoardInfo] {
        &self.boards
    }

    /// A board's configuration together with its partition
    pub fn board(&self, name: &str) -> Result<(&BoardConfig, &Partition)> {
        let config = self
            .config
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("No such board: {}", name)))?;
        let partition = self
            .partitions
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("No such board: {}", name)))?;
        Ok((config, partition))
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    async fn close(self) {
        join_all(self.partitions.values().map(|p| p.close())).await;
    }
}

/// Shared hold on the current bundle. No reload can swap the bundle
/// while any claim is alive.
pub type Claim = OwnedRwLockReadGuard<Bundle>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ready,
    Refreshing,
}

pub struct Coordinator {
    root: PathBuf,
    options: PartitionOptions,
    source: Arc<dyn ConfigSource>,
    bundle: Arc<RwLock<Bundle>>,
    claim_timeout: Duration,
    reload_timeout: Duration,
    generation: AtomicU64,
    pending_reloads: AtomicUsize,
    closed: AtomicBool,
}

impl Coordinator {
    /// Load the board list and open every partition.
    ///
    /// Fails if the configuration is invalid or any partition can't be
    /// opened; nothing stays open in that case.
    pub async fn start(storage: &StorageConfig, source: Arc<dyn ConfigSource>) -> Result<Self> {
        let root = storage.data_dir.clone();
        let options = storage.partition_options();

        let config = source.load().await?;
        let partitions = open_all(&root, &options, &config).await?;

        tracing::info!(
            "Serving {} board(s) from {}",
            config.boards.len(),
            root.display()
        );

        Ok(Self {
            root,
            options,
            source,
            bundle: Arc::new(RwLock::new(Bundle::new(config, partitions))),
            claim_timeout: storage.claim_timeout(),
            reload_timeout: storage.reload_timeout(),
            generation: AtomicU64::new(1),
            pending_reloads: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Take a shared claim on the current bundle.
    ///
    /// Waits behind a pending reload for at most the claim timeout.
    pub async fn read(&self) -> Result<Claim> {
        let claim = tokio::time::timeout(self.claim_timeout, self.bundle.clone().read_owned())
            .await
            .map_err(|_| AppError::Unavailable("timed out waiting for board reload".to_string()))?;

        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::Unavailable("shutting down".to_string()));
        }
        Ok(claim)
    }

    /// Re-read the board list and swap in freshly opened partitions.
    ///
    /// On failure the previous bundle stays in place untouched and every
    /// handle opened for the attempt is closed again. Returns the new
    /// generation number.
    pub async fn reload(&self) -> Result<u64> {
        self.pending_reloads.fetch_add(1, Ordering::AcqRel);
        let result = self.swap_bundle().await;
        self.pending_reloads.fetch_sub(1, Ordering::AcqRel);

        match &result {
            Ok(generation) => tracing::info!("Reload complete, generation {}", generation),
            Err(e) => tracing::warn!("Reload rejected, keeping previous boards: {}", e),
        }
        result
    }

    async fn swap_bundle(&self) -> Result<u64> {
        let mut bundle = tokio::time::timeout(self.reload_timeout, self.bundle.write())
            .await
            .map_err(|_| AppError::Refresh("timed out waiting for in-flight requests".to_string()))?;

        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::Refresh("coordinator is shut down".to_string()));
        }

        let config = self
            .source
            .load()
            .await
            .map_err(|e| AppError::Refresh(format!("{:#}", e)))?;
        let partitions = open_all(&self.root, &self.options, &config)
            .await
            .map_err(|e| AppError::Refresh(e.to_string()))?;

        let old = std::mem::replace(&mut *bundle, Bundle::new(config, partitions));
        // Still exclusive: nobody can be using the old handles
        old.close().await;

        Ok(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Close every partition. Later claims fail with `Unavailable`.
    pub async fn shutdown(&self) {
        let mut bundle = self.bundle.write().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let old = std::mem::take(&mut *bundle);
        old.close().await;
        tracing::info!("All partitions closed");
    }

    pub fn state(&self) -> State {
        if self.pending_reloads.load(Ordering::Acquire) > 0 {
            State::Refreshing
        } else {
            State::Ready
        }
    }

    /// Bumped on every successful reload; starts at 1
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("root", &self.root)
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish()
    }
}

/// Open a partition for every configured board, all or nothing
async fn open_all(
    root: &Path,
    options: &PartitionOptions,
    config: &BoardsConfig,
) -> Result<HashMap<String, Partition>> {
    let results = join_all(
        config
            .boards
            .iter()
            .map(|board| Partition::open(root, &board.name, options)),
    )
    .await;

    let mut opened = HashMap::with_capacity(results.len());
    let mut first_error = None;
    for (board, result) in config.boards.iter().zip(results) {
        match result {
            Ok(partition) => {
                opened.insert(board.name.clone(), partition);
            }
            Err(e) => {
                tracing::error!("Failed to open partition /{}/: {}", board.name, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        None => Ok(opened),
        Some(e) => {
            join_all(opened.values().map(|p| p.close())).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigSource;
    use crate::models::NewPost;

    fn board(name: &str, max_threads: i64) -> BoardConfig {
        let mut board = BoardConfig::new(name);
        board.max_threads = max_threads;
        board
    }

    fn storage(dir: &tempfile::TempDir) -> StorageConfig {
        let mut storage = StorageConfig::with_data_dir(dir.path());
        storage.claim_timeout_secs = 1;
        storage.reload_timeout_secs = 1;
        storage
    }

    fn post(content: &str) -> NewPost {
        NewPost::validate(None, content, 8192).unwrap()
    }

    async fn start(
        dir: &tempfile::TempDir,
        boards: Vec<BoardConfig>,
    ) -> (Arc<Coordinator>, Arc<MemoryConfigSource>) {
        let source = Arc::new(MemoryConfigSource::new(boards));
        let coordinator = Coordinator::start(&storage(dir), source.clone())
            .await
            .unwrap();
        (Arc::new(coordinator), source)
    }

    #[tokio::test]
    async fn test_start_opens_every_board() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _) = start(&dir, vec![board("g", 2), board("b", 10)]).await;

        let claim = coordinator.read().await.unwrap();
        let names: Vec<&str> = claim.boards().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["b", "g"]);
        assert!(claim.board("g").is_ok());
        assert!(matches!(claim.board("v"), Err(AppError::NotFound(_))));
        assert_eq!(coordinator.state(), State::Ready);
        assert_eq!(coordinator.generation(), 1);
        drop(claim);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MemoryConfigSource::new(vec![board("g", 2), board("g", 3)]));
        let result = Coordinator::start(&storage(&dir), source).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_reload_swaps_config_and_closes_old_handles() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, source) = start(&dir, vec![board("g", 2)]).await;

        let old_handle = {
            let claim = coordinator.read().await.unwrap();
            let (_, partition) = claim.board("g").unwrap();
            partition.create_thread("kept", &post("survives reload")).await.unwrap();
            partition.clone()
        };

        source.set(vec![board("g", 5), board("v", 1)]);
        assert_eq!(coordinator.reload().await.unwrap(), 2);
        assert!(old_handle.is_closed());

        let claim = coordinator.read().await.unwrap();
        let (config, partition) = claim.board("g").unwrap();
        assert_eq!(config.max_threads, 5);
        assert_eq!(partition.list_board(10, 10).await.unwrap().len(), 1);
        assert!(claim.board("v").is_ok());
        drop(claim);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_boards() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, source) = start(&dir, vec![board("g", 2)]).await;

        // A directory where the partition file should be can't be opened
        std::fs::create_dir_all(crate::db::partition_path(dir.path(), "x")).unwrap();
        source.set(vec![board("g", 9), board("x", 1)]);

        let err = coordinator.reload().await.unwrap_err();
        assert!(matches!(err, AppError::Refresh(_)));
        assert_eq!(coordinator.generation(), 1);
        assert_eq!(coordinator.state(), State::Ready);

        let claim = coordinator.read().await.unwrap();
        let (config, partition) = claim.board("g").unwrap();
        assert_eq!(config.max_threads, 2);
        assert!(!partition.is_closed());
        partition.create_thread("still", &post("writable")).await.unwrap();
        assert!(matches!(claim.board("x"), Err(AppError::NotFound(_))));
        drop(claim);

        // Invalid configuration is rejected the same way
        source.set(vec![board("g", 0)]);
        assert!(matches!(coordinator.reload().await, Err(AppError::Refresh(_))));

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_waits_for_claims_and_blocks_new_ones() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, source) = start(&dir, vec![board("g", 2)]).await;

        let claim = coordinator.read().await.unwrap();
        source.set(vec![board("g", 7)]);

        let reload = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.reload().await }
        });

        // Give the reload time to queue behind the claim
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(coordinator.state(), State::Refreshing);
        assert!(!reload.is_finished());

        // A pending reload holds back new claims
        let blocked = tokio::time::timeout(Duration::from_millis(200), coordinator.read()).await;
        assert!(blocked.is_err());

        // The existing claim still sees the old config
        assert_eq!(claim.board("g").unwrap().0.max_threads, 2);
        drop(claim);

        assert_eq!(reload.await.unwrap().unwrap(), 2);
        let claim = coordinator.read().await.unwrap();
        assert_eq!(claim.board("g").unwrap().0.max_threads, 7);
        drop(claim);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_times_out_behind_long_claim() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, source) = start(&dir, vec![board("g", 2)]).await;

        let claim = coordinator.read().await.unwrap();
        source.set(vec![board("g", 7)]);

        let err = coordinator.reload().await.unwrap_err();
        assert!(matches!(err, AppError::Refresh(_)));
        assert_eq!(claim.board("g").unwrap().0.max_threads, 2);
        drop(claim);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _) = start(&dir, vec![board("g", 2)]).await;

        let handle = {
            let claim = coordinator.read().await.unwrap();
            claim.board("g").unwrap().1.clone()
        };

        coordinator.shutdown().await;
        assert!(handle.is_closed());
        assert!(matches!(coordinator.read().await, Err(AppError::Unavailable(_))));
        assert!(matches!(coordinator.reload().await, Err(AppError::Refresh(_))));

        // Second shutdown is a no-op
        coordinator.shutdown().await;
    }
}
