//! Board operations, independent of the transport.
//!
//! Each operation takes one claim on the coordinator and holds it until the
//! storage work is done, so a reload never closes a partition under a
//! running request. Input is validated before any storage access.

use crate::{
    coordinator::Coordinator,
    error::{AppError, Result},
    models::{BoardInfo, BoardOverview, CreateReplyRequest, CreateThreadRequest, NewPost, ThreadView},
};

/// Every configured board, sorted by name
pub async fn list_boards(coordinator: &Coordinator) -> Result<Vec<BoardInfo>> {
    let claim = coordinator.read().await?;
    Ok(claim.boards().to_vec())
}

/// Board metadata, stats and the visible window of threads
pub async fn board_overview(coordinator: &Coordinator, board: &str) -> Result<BoardOverview> {
    let claim = coordinator.read().await?;
    let (config, partition) = claim.board(board)?;

    let threads = partition
        .list_board(config.max_threads, config.max_replies)
        .await?;
    let stats = partition.stats().await?;

    Ok(BoardOverview {
        board: config.into(),
        stats,
        threads,
    })
}

/// A full thread, addressed by the local number of any of its posts
pub async fn view_thread(coordinator: &Coordinator, board: &str, post_id: i64) -> Result<ThreadView> {
    let claim = coordinator.read().await?;
    let (config, partition) = claim.board(board)?;

    let thread_id = partition.resolve_local_id(post_id).await?;
    let thread = partition.get_thread(thread_id).await?;

    Ok(ThreadView {
        board: config.into(),
        thread,
    })
}

/// Start a new thread; returns it as stored
pub async fn create_thread(
    coordinator: &Coordinator,
    board: &str,
    req: &CreateThreadRequest,
) -> Result<ThreadView> {
    let claim = coordinator.read().await?;
    let (config, partition) = claim.board(board)?;

    let topic = req.topic.as_deref().unwrap_or_default().trim();
    if topic.len() > config.max_post_bytes {
        return Err(AppError::Validation(format!(
            "topic too large: {} bytes (max {} bytes)",
            topic.len(),
            config.max_post_bytes
        )));
    }
    let op = NewPost::validate(req.name.as_deref(), &req.content, config.max_post_bytes)?;

    let (thread_id, post_id) = partition.create_thread(topic, &op).await?;
    tracing::info!("New thread {}{} ({:?})", config.path(), post_id, topic);

    let thread = partition.get_thread(thread_id).await?;
    Ok(ThreadView {
        board: config.into(),
        thread,
    })
}

/// Reply to the thread containing local post `post_id`; returns the
/// updated thread
pub async fn reply(
    coordinator: &Coordinator,
    board: &str,
    post_id: i64,
    req: &CreateReplyRequest,
) -> Result<ThreadView> {
    let claim = coordinator.read().await?;
    let (config, partition) = claim.board(board)?;

    let post = NewPost::validate(req.name.as_deref(), &req.content, config.max_post_bytes)?;

    let thread_id = partition.resolve_local_id(post_id).await?;
    let reply_id = partition.add_reply(thread_id, &post).await?;
    tracing::debug!("Reply {}{} in thread {}", config.path(), reply_id, thread_id);

    let thread = partition.get_thread(thread_id).await?;
    Ok(ThreadView {
        board: config.into(),
        thread,
    })
}

/// Readiness: a claim can be taken and every partition answers
pub async fn ping(coordinator: &Coordinator) -> Result<()> {
    let claim = coordinator.read().await?;
    for result in futures::future::join_all(claim.partitions().map(|p| p.ping())).await {
        result?;
    }
    Ok(())
}
