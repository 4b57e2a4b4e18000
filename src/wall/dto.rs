use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::editor::EditSession;
use super::time_ago::time_ago;
use crate::backend::Post;

/// A post as the page shows it.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub time_ago: String,
    pub editing: bool,
}

impl PostView {
    pub fn render(post: Post, now: OffsetDateTime, editing_id: Option<Uuid>) -> Self {
        Self {
            editing: editing_id == Some(post.id),
            time_ago: time_ago(post.created_at, now),
            id: post.id,
            name: post.name,
            text: post.text,
            image_url: post.image_url,
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedView {
    pub posts: Vec<PostView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editing_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct EditSessionView {
    pub post_id: Uuid,
    pub text: String,
}

impl From<EditSession> for EditSessionView {
    fn from(s: EditSession) -> Self {
        Self {
            post_id: s.post_id,
            text: s.original_text,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveEditRequest {
    pub text: String,
}
