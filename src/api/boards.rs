use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};

use crate::{
    api::ops,
    error::Result,
    models::{BoardInfo, BoardOverview, CreateThreadRequest, ThreadView},
    AppState,
};

/// List all configured boards
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<BoardInfo>>> {
    let boards = ops::list_boards(&state.coordinator).await?;
    Ok(Json(boards))
}

/// Board metadata with the threads currently in its listing
pub async fn get_board(
    State(state): State<AppState>,
    Path(board): Path<String>,
) -> Result<Json<BoardOverview>> {
    let overview = ops::board_overview(&state.coordinator, &board).await?;
    Ok(Json(overview))
}

/// Create a new thread
///
/// Accepts application/x-www-form-urlencoded with fields:
/// - topic: Thread topic (optional)
/// - name: Author name (optional, defaults to Anonymous)
/// - content: Post body (required)
pub async fn create_thread(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Form(req): Form<CreateThreadRequest>,
) -> Result<(StatusCode, Json<ThreadView>)> {
    let view = ops::create_thread(&state.coordinator, &board, &req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}
