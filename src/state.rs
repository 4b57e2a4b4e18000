use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::backend::memory::MemoryBackend;
use crate::backend::postgres::PgRowStore;
use crate::backend::s3::S3ObjectStore;
use crate::backend::{Backend, ObjectStore, RowStore};
use crate::config::{AppConfig, BackendConfig};
use crate::profile::{editor::ProfileEditor, info::InfoEditor, photo::PhotoUploader};
use crate::wall::{composer::Composer, editor::PostEditor, feed::FeedSynchronizer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Backend,
    pub feed: FeedSynchronizer,
    pub composer: Composer,
    pub editor: PostEditor,
    pub profile: ProfileEditor,
    pub info: InfoEditor,
    pub photo: PhotoUploader,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let backend = match &config.backend {
            BackendConfig::Postgres {
                database_url,
                storage,
            } => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    warn!(error = %e, "migration failed; continuing");
                }

                let objects = S3ObjectStore::new(storage).await?;
                Backend {
                    rows: Arc::new(PgRowStore::new(db)) as Arc<dyn RowStore>,
                    objects: Arc::new(objects) as Arc<dyn ObjectStore>,
                }
            }
            BackendConfig::Memory { public_base_url } => {
                info!("using in-memory backend; nothing will persist");
                MemoryBackend::new(public_base_url.clone()).backend()
            }
        };

        Ok(Self::from_parts(config, backend))
    }

    pub fn from_parts(config: Arc<AppConfig>, backend: Backend) -> Self {
        let feed = FeedSynchronizer::new(backend.rows.clone());
        let composer = Composer::new(
            backend.clone(),
            feed.clone(),
            config.buckets.wall_uploads.clone(),
            config.display_name.clone(),
        );
        let editor = PostEditor::new(backend.rows.clone(), feed.clone());
        let profile = ProfileEditor::new(
            backend.rows.clone(),
            config.display_name.clone(),
            config.bio_placeholder.clone(),
        );
        let info = InfoEditor::new(backend.rows.clone());
        let photo = PhotoUploader::new(
            backend.objects.clone(),
            config.buckets.profile_photos.clone(),
        );

        Self {
            config,
            backend,
            feed,
            composer,
            editor,
            profile,
            info,
            photo,
        }
    }

    /// First load of everything the page shows. Each part falls back on its own.
    pub async fn load(&self) {
        let (feed, profile, info, photo) = tokio::join!(
            self.feed.refresh(),
            self.profile.load(),
            self.info.load(),
            self.photo.load(),
        );
        info!(feed, profile, info, photo, "initial load finished");
    }

    #[cfg(test)]
    pub fn fake() -> (Self, Arc<MemoryBackend>) {
        let config = Arc::new(AppConfig::memory());
        let mem = match &config.backend {
            BackendConfig::Memory { public_base_url } => MemoryBackend::new(public_base_url.clone()),
            BackendConfig::Postgres { .. } => unreachable!("memory config"),
        };
        (Self::from_parts(config, mem.backend()), mem)
    }
}
