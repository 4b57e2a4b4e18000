use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use super::composer::validate_text;
use super::feed::FeedSynchronizer;
use crate::backend::{Post, RowStore, MESSAGES_TABLE};
use crate::confirm::{Confirmation, Outcome};
use crate::error::{Result, WallError, WriteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub post_id: Uuid,
    /// Text the edit box starts with.
    pub original_text: String,
}

/// Inline editing of post text. At most one post is being edited at a time;
/// beginning a new session replaces the current one.
#[derive(Clone)]
pub struct PostEditor {
    rows: Arc<dyn RowStore>,
    feed: FeedSynchronizer,
    active: Arc<Mutex<Option<EditSession>>>,
}

impl PostEditor {
    pub fn new(rows: Arc<dyn RowStore>, feed: FeedSynchronizer) -> Self {
        Self {
            rows,
            feed,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn begin_edit(&self, post: &Post) -> EditSession {
        let session = EditSession {
            post_id: post.id,
            original_text: post.text.clone(),
        };
        *self.active.lock().await = Some(session.clone());
        session
    }

    pub async fn cancel_edit(&self, session: &EditSession) {
        let mut active = self.active.lock().await;
        if active.as_ref() == Some(session) {
            *active = None;
        }
    }

    pub async fn active(&self) -> Option<EditSession> {
        self.active.lock().await.clone()
    }

    pub async fn editing_id(&self) -> Option<Uuid> {
        self.active.lock().await.as_ref().map(|s| s.post_id)
    }

    /// Commits new text for the session's post. Only `text` changes. On failure the
    /// session stays open.
    #[instrument(skip(self, new_text), fields(post_id = %session.post_id))]
    pub async fn save_edit(
        &self,
        session: &EditSession,
        new_text: &str,
        confirmation: Confirmation,
    ) -> Result<Outcome<Post>> {
        let text = validate_text(new_text)?;
        if !confirmation.granted() {
            return Ok(Outcome::Declined);
        }

        let updated = self
            .rows
            .update_post_text(session.post_id, text)
            .await
            .map_err(update_failed)?
            .ok_or_else(|| {
                update_failed(anyhow::anyhow!("no message with id {}", session.post_id))
            })?;

        info!("post updated");
        self.cancel_edit(session).await;
        self.feed.refresh().await;
        Ok(Outcome::Applied(updated))
    }
}

fn update_failed(e: anyhow::Error) -> WallError {
    WallError::UpdateFailed(WriteError::new(MESSAGES_TABLE, "update", e))
}
