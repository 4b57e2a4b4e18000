use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{
    join_public_url, Backend, InfoFields, NewPost, ObjectEntry, ObjectStore, PersonalInfo, Post,
    Profile, ProfilePatch, RowStore, UploadOptions,
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct Rows {
    posts: Vec<Post>,
    profile: Option<Profile>,
    info: Option<PersonalInfo>,
    last_created_at: Option<OffsetDateTime>,
}

/// In-process row and object store.
///
/// Used for `WALL_BACKEND=memory` and as the fake in tests: each failure switch makes
/// the matching family of calls return an error, and every call is counted.
#[derive(Default)]
pub struct MemoryBackend {
    public_base_url: String,
    rows: Mutex<Rows>,
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    fail_uploads: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(public_base_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            public_base_url: public_base_url.into(),
            ..Default::default()
        })
    }

    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend {
            rows: self.clone(),
            objects: self.clone(),
        }
    }

    pub fn fail_uploads(&self, on: bool) {
        self.fail_uploads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Number of backend calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.objects()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn rows(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, what: &str) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("memory backend: read {what} unavailable");
        }
        Ok(())
    }

    fn write(&self, what: &str) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory backend: write {what} rejected");
        }
        Ok(())
    }
}

impl Rows {
    /// Server clock that never repeats, so insertion order is also time order.
    fn stamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(at);
        at
    }
}

fn apply_patch(profile: &mut Profile, patch: &ProfilePatch) {
    if let Some(name) = &patch.name {
        profile.name = Some(name.clone());
    }
    if let Some(bio) = &patch.bio {
        profile.bio = Some(bio.clone());
    }
}

#[async_trait]
impl RowStore for MemoryBackend {
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        self.read("messages")?;
        let mut posts = self.rows().posts.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> anyhow::Result<Post> {
        self.write("messages")?;
        let mut rows = self.rows();
        let created_at = rows.stamp();
        let row = Post {
            id: Uuid::new_v4(),
            name: post.name.clone(),
            text: post.text.clone(),
            image_url: post.image_url.clone(),
            created_at,
        };
        rows.posts.push(row.clone());
        Ok(row)
    }

    async fn update_post_text(&self, id: Uuid, text: &str) -> anyhow::Result<Option<Post>> {
        self.write("messages")?;
        let mut rows = self.rows();
        Ok(rows.posts.iter_mut().find(|p| p.id == id).map(|p| {
            p.text = text.to_string();
            p.clone()
        }))
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        self.write("messages")?;
        let mut rows = self.rows();
        let before = rows.posts.len();
        rows.posts.retain(|p| p.id != id);
        Ok(rows.posts.len() != before)
    }

    async fn fetch_profile(&self) -> anyhow::Result<Option<Profile>> {
        self.read("user_profile")?;
        Ok(self.rows().profile.clone())
    }

    async fn insert_profile(&self, patch: &ProfilePatch) -> anyhow::Result<Profile> {
        self.write("user_profile")?;
        let mut rows = self.rows();
        let profile = rows.profile.get_or_insert_with(|| Profile {
            id: Uuid::new_v4(),
            name: None,
            bio: None,
        });
        apply_patch(profile, patch);
        Ok(profile.clone())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        patch: &ProfilePatch,
    ) -> anyhow::Result<Option<Profile>> {
        self.write("user_profile")?;
        let mut rows = self.rows();
        Ok(rows.profile.as_mut().filter(|p| p.id == id).map(|p| {
            apply_patch(p, patch);
            p.clone()
        }))
    }

    async fn fetch_info(&self) -> anyhow::Result<Option<PersonalInfo>> {
        self.read("user_info")?;
        Ok(self.rows().info.clone())
    }

    async fn insert_info(&self, info: &InfoFields) -> anyhow::Result<PersonalInfo> {
        self.write("user_info")?;
        let mut rows = self.rows();
        let id = rows.info.as_ref().map_or_else(Uuid::new_v4, |i| i.id);
        let row = PersonalInfo {
            id,
            fields: info.clone(),
        };
        rows.info = Some(row.clone());
        Ok(row)
    }

    async fn update_info(
        &self,
        id: Uuid,
        info: &InfoFields,
    ) -> anyhow::Result<Option<PersonalInfo>> {
        self.write("user_info")?;
        let mut rows = self.rows();
        Ok(rows.info.as_mut().filter(|i| i.id == id).map(|i| {
            i.fields = info.clone();
            i.clone()
        }))
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &UploadOptions,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            bail!("memory backend: upload {bucket}/{key} rejected");
        }
        let mut objects = self.objects();
        let slot = (bucket.to_string(), key.to_string());
        if !opts.overwrite && objects.contains_key(&slot) {
            bail!("memory backend: object {bucket}/{key} already exists");
        }
        objects.insert(
            slot,
            StoredObject {
                body,
                content_type: opts.content_type.clone(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects()
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .with_context(|| format!("memory backend: no object {bucket}/{key}"))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_public_url(&self.public_base_url, bucket, key)
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ObjectEntry>> {
        self.read(bucket)?;
        Ok(self
            .objects()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .take(limit)
            .map(|(_, k)| ObjectEntry { name: k.clone() })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_opts(overwrite: bool) -> UploadOptions {
        UploadOptions {
            overwrite,
            content_type: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn upload_without_overwrite_refuses_existing_key() {
        let mem = MemoryBackend::new("http://localhost/storage");
        mem.upload("b", "k.png", Bytes::from_static(b"1"), &upload_opts(false))
            .await
            .unwrap();
        let err = mem
            .upload("b", "k.png", Bytes::from_static(b"2"), &upload_opts(false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(mem.object("b", "k.png").unwrap().body, Bytes::from_static(b"1"));

        mem.upload("b", "k.png", Bytes::from_static(b"3"), &upload_opts(true))
            .await
            .unwrap();
        assert_eq!(mem.object("b", "k.png").unwrap().body, Bytes::from_static(b"3"));
    }

    #[tokio::test]
    async fn posts_list_newest_first() {
        let mem = MemoryBackend::new("http://localhost/storage");
        for text in ["one", "two", "three"] {
            mem.insert_post(&NewPost {
                name: "n".into(),
                text: text.into(),
                image_url: None,
            })
            .await
            .unwrap();
        }
        let texts: Vec<_> = mem
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, ["three", "two", "one"]);
    }

    #[tokio::test]
    async fn second_profile_insert_reuses_the_row() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let a = mem
            .insert_profile(&ProfilePatch {
                name: Some("A".into()),
                bio: None,
            })
            .await
            .unwrap();
        let b = mem
            .insert_profile(&ProfilePatch {
                name: None,
                bio: Some("hi".into()),
            })
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name.as_deref(), Some("A"));
        assert_eq!(b.bio.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn failure_switches_and_call_count() {
        let mem = MemoryBackend::new("http://localhost/storage");
        mem.fail_reads(true);
        assert!(mem.list_posts().await.is_err());
        mem.fail_reads(false);
        mem.fail_writes(true);
        assert!(mem.delete_post(Uuid::new_v4()).await.is_err());
        assert_eq!(mem.calls(), 2);
    }
}
