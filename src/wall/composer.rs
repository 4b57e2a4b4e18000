use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::feed::FeedSynchronizer;
use crate::backend::{Backend, NewPost, Post, UploadOptions, MESSAGES_TABLE};
use crate::confirm::{Confirmation, Outcome};
use crate::error::{Result, WallError, WriteError};

pub const MAX_POST_CHARS: usize = 280;

/// A file picked in the browser.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// What the composer currently holds. Cleared only after a successful post.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub text: String,
    pub image: Option<ImageFile>,
}

impl Draft {
    pub fn new(text: impl Into<String>, image: Option<ImageFile>) -> Self {
        Self {
            text: text.into(),
            image,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_none()
    }
}

/// Returns the trimmed text if it can be posted.
/// The cap applies to the text as typed, surrounding whitespace included.
pub fn validate_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WallError::validation("Please enter a message."));
    }
    if text.chars().count() > MAX_POST_CHARS {
        return Err(WallError::validation(format!(
            "Message must be {MAX_POST_CHARS} characters or less."
        )));
    }
    Ok(trimmed)
}

#[derive(Clone)]
pub struct Composer {
    backend: Backend,
    feed: FeedSynchronizer,
    bucket: String,
    display_name: String,
}

impl Composer {
    pub fn new(
        backend: Backend,
        feed: FeedSynchronizer,
        bucket: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            feed,
            bucket: bucket.into(),
            display_name: display_name.into(),
        }
    }

    /// Posts the draft. Validation happens before anything leaves the process; a
    /// failed image upload drops the image but still posts the text.
    #[instrument(skip(self, draft), fields(chars = draft.text.chars().count(), image = draft.image.is_some()))]
    pub async fn compose(
        &self,
        draft: &mut Draft,
        confirmation: Confirmation,
    ) -> Result<Outcome<Post>> {
        let text = validate_text(&draft.text)?.to_string();
        if !confirmation.granted() {
            return Ok(Outcome::Declined);
        }

        let uploaded = match &draft.image {
            Some(image) => self.upload_image(image).await,
            None => None,
        };

        let new_post = NewPost {
            name: self.display_name.clone(),
            text,
            image_url: uploaded.as_ref().map(|(_, url)| url.clone()),
        };
        let post = match self.backend.rows.insert_post(&new_post).await {
            Ok(post) => post,
            Err(e) => {
                if let Some((key, _)) = uploaded {
                    self.discard_orphan(&key).await;
                }
                return Err(WallError::PostFailed(WriteError::new(
                    MESSAGES_TABLE,
                    "insert",
                    e,
                )));
            }
        };

        info!(post_id = %post.id, has_image = post.image_url.is_some(), "post created");
        *draft = Draft::default();
        self.feed.refresh().await;
        Ok(Outcome::Applied(post))
    }

    /// Uploads under a fresh key. Returns the key and public URL, or `None` on failure.
    async fn upload_image(&self, image: &ImageFile) -> Option<(String, String)> {
        let key = object_key(
            &image.file_name,
            &image.content_type,
            unix_millis(OffsetDateTime::now_utc()),
            &random_suffix(),
        );
        let opts = UploadOptions {
            overwrite: false,
            content_type: image.content_type.clone(),
        };
        match self
            .backend
            .objects
            .upload(&self.bucket, &key, image.bytes.clone(), &opts)
            .await
        {
            Ok(()) => {
                let url = self.backend.objects.public_url(&self.bucket, &key);
                Some((key, url))
            }
            Err(e) => {
                warn!(error = %e, %key, "image upload failed; posting without image");
                None
            }
        }
    }

    async fn discard_orphan(&self, key: &str) {
        if let Err(e) = self.backend.objects.remove(&self.bucket, key).await {
            warn!(error = %e, %key, "could not remove image after failed insert");
        }
    }
}

pub(crate) fn unix_millis(at: OffsetDateTime) -> i128 {
    at.unix_timestamp_nanos() / 1_000_000
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/// `{millis}-{suffix}.{ext}`.
pub fn object_key(file_name: &str, content_type: &str, millis: i128, suffix: &str) -> String {
    format!("{millis}-{suffix}.{}", file_ext(file_name, content_type))
}

/// Extension from the file name, else from the content type, else `bin`.
pub(crate) fn file_ext(file_name: &str, content_type: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .or_else(|| ext_from_mime(content_type).map(String::from))
        .unwrap_or_else(|| "bin".into())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::RowStore;
    use std::sync::Arc;

    const BUCKET: &str = "wall-uploads";

    fn setup() -> (Arc<MemoryBackend>, FeedSynchronizer, Composer) {
        let mem = MemoryBackend::new("http://localhost/storage");
        let feed = FeedSynchronizer::new(mem.clone());
        let composer = Composer::new(mem.backend(), feed.clone(), BUCKET, "Wall Owner");
        (mem, feed, composer)
    }

    fn png() -> ImageFile {
        ImageFile {
            file_name: "cat.PNG".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn object_key_shape() {
        assert_eq!(object_key("cat.PNG", "image/png", 1700000000123, "ab12cd"), "1700000000123-ab12cd.png");
        assert_eq!(object_key("photo", "image/webp", 1, "zzzzzz"), "1-zzzzzz.webp");
        assert_eq!(object_key("weird.", "text/plain", 1, "zzzzzz"), "1-zzzzzz.bin");
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn text_length_bounds() {
        assert!(validate_text("a").is_ok());
        assert!(validate_text(&"x".repeat(MAX_POST_CHARS)).is_ok());
        assert_eq!(validate_text("  hi  ").unwrap(), "hi");
        assert!(matches!(validate_text(""), Err(WallError::Validation(_))));
        assert!(matches!(validate_text(" \n\t "), Err(WallError::Validation(_))));
        assert!(matches!(
            validate_text(&"x".repeat(MAX_POST_CHARS + 1)),
            Err(WallError::Validation(_))
        ));
        // characters, not bytes
        assert!(validate_text(&"é".repeat(MAX_POST_CHARS)).is_ok());
    }

    #[tokio::test]
    async fn padding_counts_toward_the_cap() {
        let (mem, _, composer) = setup();
        let padded = format!("{}{}", " ".repeat(20), "x".repeat(MAX_POST_CHARS));
        assert!(matches!(validate_text(&padded), Err(WallError::Validation(_))));

        let mut draft = Draft::new(padded.clone(), None);
        let err = composer
            .compose(&mut draft, Confirmation::Granted)
            .await
            .unwrap_err();
        assert!(matches!(err, WallError::Validation(_)));
        assert_eq!(draft.text, padded);
        assert_eq!(mem.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_text_issues_no_backend_call() {
        let (mem, _, composer) = setup();
        for text in ["   ".to_string(), "y".repeat(MAX_POST_CHARS + 1)] {
            let mut draft = Draft::new(text.clone(), Some(png()));
            let err = composer
                .compose(&mut draft, Confirmation::Granted)
                .await
                .unwrap_err();
            assert!(matches!(err, WallError::Validation(_)));
            assert_eq!(draft.text, text);
        }
        assert_eq!(mem.calls(), 0);
    }

    #[tokio::test]
    async fn declined_has_no_side_effect() {
        let (mem, _, composer) = setup();
        let mut draft = Draft::new("hello", Some(png()));
        let out = composer
            .compose(&mut draft, Confirmation::Declined)
            .await
            .unwrap();
        assert_eq!(out, Outcome::Declined);
        assert_eq!(mem.calls(), 0);
        assert_eq!(draft.text, "hello");
    }

    #[tokio::test]
    async fn text_post_shows_up_in_feed() {
        let (_, feed, composer) = setup();
        let mut draft = Draft::new("  hello ", None);
        let post = composer
            .compose(&mut draft, Confirmation::Granted)
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert!(draft.is_empty());

        let snap = feed.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id, post.id);
        assert_eq!(snap[0].text, "hello");
        assert_eq!(snap[0].name, "Wall Owner");
        assert_eq!(snap[0].image_url, None);
    }

    #[tokio::test]
    async fn image_is_uploaded_and_linked() {
        let (mem, _, composer) = setup();
        let mut draft = Draft::new("look", Some(png()));
        let post = composer
            .compose(&mut draft, Confirmation::Granted)
            .await
            .unwrap()
            .applied()
            .unwrap();

        let keys = mem.object_keys(BUCKET);
        assert_eq!(keys.len(), 1);
        assert!(keys[0].ends_with(".png"));
        let url = post.image_url.unwrap();
        assert_eq!(url, format!("http://localhost/storage/{BUCKET}/{}", keys[0]));
        assert_eq!(mem.object(BUCKET, &keys[0]).unwrap().content_type, "image/png");
    }

    #[tokio::test]
    async fn failed_upload_still_posts_text() {
        let (mem, feed, composer) = setup();
        mem.fail_uploads(true);
        let mut draft = Draft::new("no pic", Some(png()));
        let post = composer
            .compose(&mut draft, Confirmation::Granted)
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(post.image_url, None);
        assert_eq!(feed.snapshot().await.len(), 1);
        assert!(mem.object_keys(BUCKET).is_empty());
    }

    #[tokio::test]
    async fn failed_insert_keeps_draft_and_removes_upload() {
        let (mem, _, composer) = setup();
        mem.fail_writes(true);
        let mut draft = Draft::new("retry me", Some(png()));
        let err = composer
            .compose(&mut draft, Confirmation::Granted)
            .await
            .unwrap_err();
        assert!(matches!(err, WallError::PostFailed(_)));
        assert_eq!(draft.text, "retry me");
        assert!(draft.image.is_some());
        assert!(mem.object_keys(BUCKET).is_empty());

        mem.fail_writes(false);
        assert!(mem.list_posts().await.unwrap().is_empty());
    }
}
