use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use super::dto::{BeginEditView, PhotoView, ProfileView, SaveBioRequest, SaveNameRequest};
use super::editor::{MAX_BIO_CHARS, MAX_NAME_CHARS};
use super::FieldGroup;
use crate::backend::InfoFields;
use crate::confirm::{Confirmation, Outcome};
use crate::error::{Result, WallError};
use crate::state::AppState;
use crate::wall::handlers::read_image;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/profile/:group/edit", post(begin_edit).delete(cancel_edit))
        .route("/profile/name", put(save_name))
        .route("/profile/bio", put(save_bio))
        .route("/profile/info", put(save_info))
        .route("/profile/photo", post(upload_photo))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

async fn render(state: &AppState) -> ProfileView {
    let card = state.profile.card().await;
    let mut editing = Vec::new();
    if card.editing_name {
        editing.push(FieldGroup::Name);
    }
    if card.editing_bio {
        editing.push(FieldGroup::Bio);
    }
    if state.info.is_editing().await {
        editing.push(FieldGroup::Info);
    }
    ProfileView {
        name: card.name,
        bio: card.bio,
        bio_is_placeholder: card.bio_is_placeholder,
        photo_url: state.photo.current_url().await,
        info: state.info.saved().await,
        editing,
    }
}

#[instrument(skip(state))]
pub async fn get_profile(State(state): State<AppState>) -> Json<ProfileView> {
    Json(render(&state).await)
}

#[instrument(skip(state))]
pub async fn begin_edit(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<BeginEditView>> {
    let group: FieldGroup = group.parse()?;
    let view = match group {
        FieldGroup::Name => BeginEditView {
            group,
            text: Some(state.profile.begin_name_edit().await),
            info: None,
        },
        FieldGroup::Bio => BeginEditView {
            group,
            text: Some(state.profile.begin_bio_edit().await),
            info: None,
        },
        FieldGroup::Info => BeginEditView {
            group,
            text: None,
            info: Some(state.info.begin_edit().await),
        },
    };
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn cancel_edit(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<StatusCode> {
    match group.parse::<FieldGroup>()? {
        FieldGroup::Name => state.profile.cancel_name_edit().await,
        FieldGroup::Bio => state.profile.cancel_bio_edit().await,
        FieldGroup::Info => state.info.cancel_edit().await,
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn save_name(
    State(state): State<AppState>,
    Json(body): Json<SaveNameRequest>,
) -> Result<Json<ProfileView>> {
    if body.name.chars().count() > MAX_NAME_CHARS {
        return Err(WallError::validation(format!(
            "Name must be {MAX_NAME_CHARS} characters or less."
        )));
    }
    state.profile.save_name(&body.name).await?;
    Ok(Json(render(&state).await))
}

#[instrument(skip(state, body))]
pub async fn save_bio(
    State(state): State<AppState>,
    Json(body): Json<SaveBioRequest>,
) -> Result<Json<ProfileView>> {
    if body.bio.chars().count() > MAX_BIO_CHARS {
        return Err(WallError::validation(format!(
            "Bio must be {MAX_BIO_CHARS} characters or less."
        )));
    }
    state.profile.save_bio(&body.bio).await?;
    Ok(Json(render(&state).await))
}

#[instrument(skip(state, body))]
pub async fn save_info(
    State(state): State<AppState>,
    confirmation: Confirmation,
    Json(body): Json<InfoFields>,
) -> Result<Json<Outcome<ProfileView>>> {
    Ok(Json(match state.info.save(body, confirmation).await? {
        Outcome::Applied(_) => Outcome::Applied(render(&state).await),
        Outcome::Declined => Outcome::Declined,
    }))
}

/// POST /profile/photo (multipart): `photo`.
#[instrument(skip(state, mp))]
pub async fn upload_photo(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Json<PhotoView>> {
    let mut file = None;
    while let Some(field) = mp.next_field().await? {
        if matches!(field.name(), Some("photo" | "file")) {
            file = read_image(field).await?;
        }
    }
    let file = file.ok_or_else(|| WallError::validation("No file selected."))?;
    let photo_url = state.photo.replace(file).await?;
    Ok(Json(PhotoView { photo_url }))
}
