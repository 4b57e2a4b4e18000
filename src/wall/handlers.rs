use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::composer::{Draft, ImageFile};
use super::delete::{delete_post, Deleted};
use super::dto::{EditSessionView, FeedView, PostView, SaveEditRequest};
use crate::confirm::{Confirmation, Outcome};
use crate::error::{Result, WallError};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/posts", get(list_posts))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/:id", put(save_edit).delete(remove_post))
        .route("/posts/:id/edit", post(begin_edit).delete(cancel_edit))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Json<FeedView> {
    let editing_id = state.editor.editing_id().await;
    let now = OffsetDateTime::now_utc();
    let posts = state
        .feed
        .snapshot()
        .await
        .into_iter()
        .map(|p| PostView::render(p, now, editing_id))
        .collect();
    Json(FeedView { posts, editing_id })
}

/// POST /posts (multipart): `text`, optional `image`.
#[instrument(skip(state, mp))]
pub async fn create_post(
    State(state): State<AppState>,
    confirmation: Confirmation,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<Outcome<PostView>>)> {
    let mut draft = Draft::default();
    while let Some(field) = mp.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => draft.text = field.text().await?,
            Some("image" | "file") => draft.image = read_image(field).await?,
            _ => {}
        }
    }

    let outcome = state.composer.compose(&mut draft, confirmation).await?;
    Ok(match outcome {
        Outcome::Applied(post) => {
            let view = PostView::render(post, OffsetDateTime::now_utc(), None);
            (StatusCode::CREATED, Json(Outcome::Applied(view)))
        }
        Outcome::Declined => (StatusCode::OK, Json(Outcome::Declined)),
    })
}

#[instrument(skip(state))]
pub async fn begin_edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditSessionView>> {
    let post = state
        .feed
        .snapshot()
        .await
        .into_iter()
        .find(|p| p.id == id)
        .ok_or(WallError::PostNotFound(id))?;
    let session = state.editor.begin_edit(&post).await;
    Ok(Json(session.into()))
}

#[instrument(skip(state))]
pub async fn cancel_edit(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if let Some(session) = state.editor.active().await.filter(|s| s.post_id == id) {
        state.editor.cancel_edit(&session).await;
    }
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, body))]
pub async fn save_edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    confirmation: Confirmation,
    Json(body): Json<SaveEditRequest>,
) -> Result<Json<Outcome<PostView>>> {
    let session = state
        .editor
        .active()
        .await
        .filter(|s| s.post_id == id)
        .ok_or(WallError::NotEditing(id))?;

    let outcome = state
        .editor
        .save_edit(&session, &body.text, confirmation)
        .await?;
    Ok(Json(match outcome {
        Outcome::Applied(post) => {
            Outcome::Applied(PostView::render(post, OffsetDateTime::now_utc(), None))
        }
        Outcome::Declined => Outcome::Declined,
    }))
}

#[instrument(skip(state))]
pub async fn remove_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    confirmation: Confirmation,
) -> Json<Outcome<Deleted>> {
    let outcome = delete_post(state.backend.rows.as_ref(), &state.feed, id, confirmation).await;
    if matches!(outcome, Outcome::Applied(_)) {
        if let Some(session) = state.editor.active().await.filter(|s| s.post_id == id) {
            state.editor.cancel_edit(&session).await;
        }
    }
    Json(outcome)
}

/// Reads a file part. A part with no file name and no bytes is an empty file input.
pub(crate) async fn read_image(field: Field<'_>) -> Result<Option<ImageFile>> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let bytes = field.bytes().await?;
    if bytes.is_empty() && file_name.is_empty() {
        return Ok(None);
    }
    Ok(Some(ImageFile {
        file_name,
        content_type,
        bytes,
    }))
}
