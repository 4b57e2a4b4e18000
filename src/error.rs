use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

pub type Result<T, E = WallError> = std::result::Result<T, E>;

/// A row insert, update or delete the store refused or could not serve.
#[derive(Debug, Error)]
#[error("{op} on {table} failed: {source:#}")]
pub struct WriteError {
    pub table: &'static str,
    pub op: &'static str,
    #[source]
    pub source: anyhow::Error,
}

impl WriteError {
    pub fn new(table: &'static str, op: &'static str, source: anyhow::Error) -> Self {
        Self { table, op, source }
    }
}

#[derive(Debug, Error)]
pub enum WallError {
    /// Local precondition failed; nothing was sent anywhere.
    #[error("{0}")]
    Validation(String),
    #[error("upload failed: {0:#}")]
    Upload(#[source] anyhow::Error),
    #[error("failed to post message: {0}")]
    PostFailed(#[source] WriteError),
    #[error("failed to update post: {0}")]
    UpdateFailed(#[source] WriteError),
    #[error("failed to save: {0}")]
    SaveFailed(#[source] WriteError),
    #[error("post {0} is not being edited")]
    NotEditing(Uuid),
    #[error("post {0} not found")]
    PostNotFound(Uuid),
    #[error("unknown field group {0:?}")]
    UnknownGroup(String),
    #[error("malformed form data: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl WallError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WallError::Validation(_) | WallError::Multipart(_) => StatusCode::BAD_REQUEST,
            WallError::NotEditing(_) => StatusCode::CONFLICT,
            WallError::PostNotFound(_) | WallError::UnknownGroup(_) => StatusCode::NOT_FOUND,
            WallError::Upload(_)
            | WallError::PostFailed(_)
            | WallError::UpdateFailed(_)
            | WallError::SaveFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message shown to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            WallError::Validation(msg) => msg.clone(),
            WallError::Upload(_) => "Failed to upload image.".into(),
            WallError::PostFailed(_) => "Failed to post message.".into(),
            WallError::UpdateFailed(_) => "Failed to update post. Please try again.".into(),
            WallError::SaveFailed(_) => "Failed to save. Please try again.".into(),
            WallError::NotEditing(_) => "This post is not being edited.".into(),
            WallError::PostNotFound(_) => "Post not found.".into(),
            WallError::UnknownGroup(g) => format!("Unknown field group {g:?}."),
            WallError::Multipart(_) => "Malformed form data.".into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for WallError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::warn!(error = %self, %status, "request rejected");
        } else {
            error!(error = %self, %status, "replying with error");
        }

        let body = ErrorResponse {
            status: status.as_u16(),
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}
