//! The wall feed: polling snapshot, composer, inline editor and deletion.

use axum::Router;

use crate::state::AppState;

pub mod composer;
pub mod delete;
mod dto;
pub mod editor;
pub mod feed;
pub mod handlers;
pub mod time_ago;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes(max_upload_bytes))
}
