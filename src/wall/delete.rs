use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::feed::FeedSynchronizer;
use crate::backend::RowStore;
use crate::confirm::{Confirmation, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}

/// Deletes a post by id, then refreshes the feed whatever the store answered.
///
/// Store errors and unknown ids are logged and absorbed: the next feed fetch is
/// what tells the caller whether the post is gone.
#[instrument(skip(rows, feed))]
pub async fn delete_post(
    rows: &dyn RowStore,
    feed: &FeedSynchronizer,
    id: Uuid,
    confirmation: Confirmation,
) -> Outcome<Deleted> {
    if !confirmation.granted() {
        return Outcome::Declined;
    }

    match rows.delete_post(id).await {
        Ok(true) => info!("post deleted"),
        Ok(false) => warn!("delete matched no post"),
        Err(e) => warn!(error = %e, "delete failed"),
    }
    feed.refresh().await;
    Outcome::Applied(Deleted { id })
}
