//! Capabilities of the hosted backend: a row store and an object store.
//!
//! The wall never owns data. Every read goes to the row store and every write is a
//! single remote call on one of these traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

pub mod memory;
pub mod postgres;
mod records;
pub mod s3;

pub use records::{InfoFields, NewPost, PersonalInfo, Post, Profile, ProfilePatch};

pub const MESSAGES_TABLE: &str = "messages";
pub const PROFILE_TABLE: &str = "user_profile";
pub const INFO_TABLE: &str = "user_info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// When false the upload must fail if `key` already exists.
    pub overwrite: bool,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub name: String,
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>>;
    async fn insert_post(&self, post: &NewPost) -> anyhow::Result<Post>;
    /// Returns `None` when no row has this id.
    async fn update_post_text(&self, id: Uuid, text: &str) -> anyhow::Result<Option<Post>>;
    /// Returns whether a row was removed.
    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn fetch_profile(&self) -> anyhow::Result<Option<Profile>>;
    async fn insert_profile(&self, patch: &ProfilePatch) -> anyhow::Result<Profile>;
    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch)
        -> anyhow::Result<Option<Profile>>;

    async fn fetch_info(&self) -> anyhow::Result<Option<PersonalInfo>>;
    async fn insert_info(&self, info: &InfoFields) -> anyhow::Result<PersonalInfo>;
    async fn update_info(&self, id: Uuid, info: &InfoFields)
        -> anyhow::Result<Option<PersonalInfo>>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &UploadOptions,
    ) -> anyhow::Result<()>;
    async fn remove(&self, bucket: &str, key: &str) -> anyhow::Result<()>;
    fn public_url(&self, bucket: &str, key: &str) -> String;
    async fn list(&self, bucket: &str, prefix: &str, limit: usize)
        -> anyhow::Result<Vec<ObjectEntry>>;
}

/// Both capabilities, shared by every component.
#[derive(Clone)]
pub struct Backend {
    pub rows: Arc<dyn RowStore>,
    pub objects: Arc<dyn ObjectStore>,
}

/// `{base}/{bucket}/{key}` with exactly one slash at each joint.
pub fn join_public_url(base: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        bucket.trim_matches('/'),
        key.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::join_public_url;

    #[test]
    fn public_url_joins_cleanly() {
        assert_eq!(
            join_public_url("https://x.co/storage/v1/object/public/", "wall-uploads", "a.png"),
            "https://x.co/storage/v1/object/public/wall-uploads/a.png"
        );
        assert_eq!(
            join_public_url("http://localhost:8080/storage", "/profile-photos/", "/profile.jpg"),
            "http://localhost:8080/storage/profile-photos/profile.jpg"
        );
    }
}
