mod boards;
pub mod ops;
mod threads;

use axum::{routing::get, Router};

use crate::AppState;

/// Build the board router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(boards::list_boards))
        // Every board route also answers with a trailing slash (`/g/`, `/g/12/`)
        .route("/{board}", get(boards::get_board).post(boards::create_thread))
        .route("/{board}/", get(boards::get_board).post(boards::create_thread))
        .route("/{board}/{id}", get(threads::get_thread).post(threads::create_reply))
        .route("/{board}/{id}/", get(threads::get_thread).post(threads::create_reply))
}
