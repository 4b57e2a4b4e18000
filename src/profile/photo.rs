use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::backend::{ObjectStore, UploadOptions};
use crate::error::{Result, WallError};
use crate::wall::composer::{file_ext, unix_millis, ImageFile};

pub const PLACEHOLDER_PHOTO: &str = "/profile-placeholder.png";

struct CurrentPhoto {
    key: String,
    url: String,
}

/// The one profile photo, stored as `profile.{ext}` in its bucket.
#[derive(Clone)]
pub struct PhotoUploader {
    objects: Arc<dyn ObjectStore>,
    bucket: String,
    current: Arc<RwLock<Option<CurrentPhoto>>>,
}

impl PhotoUploader {
    pub fn new(objects: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            bucket: bucket.into(),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Finds an existing photo in the bucket.
    pub async fn load(&self) -> bool {
        match self.objects.list(&self.bucket, "", 1).await {
            Ok(entries) => match entries.first() {
                Some(entry) => {
                    let url = self.objects.public_url(&self.bucket, &entry.name);
                    debug!(%url, "profile photo found");
                    *self.current.write().await = Some(CurrentPhoto {
                        key: entry.name.clone(),
                        url,
                    });
                    true
                }
                None => false,
            },
            Err(e) => {
                warn!(error = %e, "listing profile photos failed");
                false
            }
        }
    }

    pub async fn current_url(&self) -> String {
        self.current
            .read()
            .await
            .as_ref()
            .map_or_else(|| PLACEHOLDER_PHOTO.to_string(), |p| p.url.clone())
    }

    /// Replaces the photo and returns a cache-busted URL for it.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    pub async fn replace(&self, file: ImageFile) -> Result<String> {
        if file.bytes.is_empty() {
            return Err(WallError::validation("No file selected."));
        }
        if !file.content_type.starts_with("image/") {
            return Err(WallError::validation("Please choose an image file."));
        }

        let key = format!("profile.{}", file_ext(&file.file_name, &file.content_type));
        let previous = self.current.read().await.as_ref().map(|p| p.key.clone());
        let mut stale = vec![key.clone()];
        stale.extend(previous.filter(|k| *k != key));
        for old in &stale {
            if let Err(e) = self.objects.remove(&self.bucket, old).await {
                debug!(error = %e, key = %old, "no previous profile photo removed");
            }
        }

        let opts = UploadOptions {
            overwrite: true,
            content_type: file.content_type.clone(),
        };
        self.objects
            .upload(&self.bucket, &key, file.bytes, &opts)
            .await
            .map_err(WallError::Upload)?;

        let url = format!(
            "{}?t={}",
            self.objects.public_url(&self.bucket, &key),
            unix_millis(OffsetDateTime::now_utc())
        );
        info!(%key, "profile photo replaced");
        *self.current.write().await = Some(CurrentPhoto {
            key,
            url: url.clone(),
        });
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use bytes::Bytes;

    const BUCKET: &str = "profile-photos";

    fn jpeg(bytes: &'static [u8]) -> ImageFile {
        ImageFile {
            file_name: "me.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn placeholder_until_uploaded() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let photo = PhotoUploader::new(mem.clone(), BUCKET);
        assert!(!photo.load().await);
        assert_eq!(photo.current_url().await, PLACEHOLDER_PHOTO);
    }

    #[tokio::test]
    async fn replace_overwrites_fixed_key_with_cache_buster() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let photo = PhotoUploader::new(mem.clone(), BUCKET);

        photo.replace(jpeg(b"one")).await.unwrap();
        let url = photo.replace(jpeg(b"two")).await.unwrap();

        assert!(url.starts_with("http://localhost/storage/profile-photos/profile.jpg?t="));
        assert_eq!(photo.current_url().await, url);
        assert_eq!(mem.object_keys(BUCKET), ["profile.jpg"]);
        let stored = mem.object(BUCKET, "profile.jpg").unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"two"));
        assert_eq!(stored.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn new_extension_replaces_the_old_object() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let photo = PhotoUploader::new(mem.clone(), BUCKET);
        photo.replace(jpeg(b"old")).await.unwrap();
        let png = ImageFile {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"new"),
        };
        photo.replace(png).await.unwrap();
        assert_eq!(mem.object_keys(BUCKET), ["profile.png"]);

        let fresh = PhotoUploader::new(mem.clone(), BUCKET);
        assert!(fresh.load().await);
        assert_eq!(
            fresh.current_url().await,
            "http://localhost/storage/profile-photos/profile.png"
        );
    }

    #[tokio::test]
    async fn upload_failure_is_surfaced() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let photo = PhotoUploader::new(mem.clone(), BUCKET);
        mem.fail_uploads(true);
        let err = photo.replace(jpeg(b"x")).await.unwrap_err();
        assert!(matches!(err, WallError::Upload(_)));
        assert_eq!(photo.current_url().await, PLACEHOLDER_PHOTO);
    }

    #[tokio::test]
    async fn rejects_non_images_without_a_call() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let photo = PhotoUploader::new(mem.clone(), BUCKET);
        let file = ImageFile {
            file_name: "notes.txt".into(),
            content_type: "text/plain".into(),
            bytes: Bytes::from_static(b"hi"),
        };
        assert!(matches!(photo.replace(file).await, Err(WallError::Validation(_))));
        assert_eq!(mem.calls(), 0);
    }

    #[tokio::test]
    async fn load_finds_existing_photo() {
        let mem = MemoryBackend::new("http://localhost/storage");
        PhotoUploader::new(mem.clone(), BUCKET)
            .replace(jpeg(b"x"))
            .await
            .unwrap();
        let fresh = PhotoUploader::new(mem.clone(), BUCKET);
        assert!(fresh.load().await);
        assert_eq!(
            fresh.current_url().await,
            "http://localhost/storage/profile-photos/profile.jpg"
        );
    }
}
