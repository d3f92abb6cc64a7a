use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};

use crate::{
    api::ops,
    error::{AppError, Result},
    models::{CreateReplyRequest, ThreadView},
    AppState,
};

/// Post numbers in URLs are plain positive integers
fn parse_post_number(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::NotFound(format!("No such post: {}", raw)))
}

/// Get the thread containing a post
pub async fn get_thread(
    State(state): State<AppState>,
    Path((board, id)): Path<(String, String)>,
) -> Result<Json<ThreadView>> {
    let post_id = parse_post_number(&id)?;
    let view = ops::view_thread(&state.coordinator, &board, post_id).await?;
    Ok(Json(view))
}

/// Reply to the thread containing a post
///
/// Accepts application/x-www-form-urlencoded with fields:
/// - name: Author name (optional, defaults to Anonymous)
/// - content: Post body (required)
pub async fn create_reply(
    State(state): State<AppState>,
    Path((board, id)): Path<(String, String)>,
    Form(req): Form<CreateReplyRequest>,
) -> Result<(StatusCode, Json<ThreadView>)> {
    let post_id = parse_post_number(&id)?;
    let view = ops::reply(&state.coordinator, &board, post_id, &req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}
