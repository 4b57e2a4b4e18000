use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_DISPLAY_NAME: &str = "Wall Owner";
pub const DEFAULT_BIO_PLACEHOLDER: &str = "Add a short bio or status...";

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base under which objects are publicly readable, e.g.
    /// `https://<project>.supabase.co/storage/v1/object/public`.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub enum BackendConfig {
    Postgres {
        database_url: String,
        storage: StorageConfig,
    },
    Memory {
        public_base_url: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Buckets {
    pub profile_photos: String,
    pub wall_uploads: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            profile_photos: "profile-photos".into(),
            wall_uploads: "wall-uploads".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub buckets: Buckets,
    /// Name stamped on every post and shown until a profile name is saved.
    pub display_name: String,
    pub bio_placeholder: String,
    pub poll_interval: Duration,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match env_or("WALL_BACKEND", "postgres").as_str() {
            "memory" => BackendConfig::Memory {
                public_base_url: env_or("STORAGE_PUBLIC_URL", "http://localhost:8080/storage"),
            },
            "postgres" => BackendConfig::Postgres {
                database_url: std::env::var("DATABASE_URL").context("DATABASE_URL")?,
                storage: StorageConfig {
                    endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT")?,
                    access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY")?,
                    secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY")?,
                    region: env_or("S3_REGION", "us-east-1"),
                    public_base_url: std::env::var("STORAGE_PUBLIC_URL")
                        .context("STORAGE_PUBLIC_URL")?,
                },
            },
            other => anyhow::bail!("unknown WALL_BACKEND {other:?}"),
        };

        Ok(Self {
            backend,
            buckets: Buckets::default(),
            display_name: env_or("WALL_DISPLAY_NAME", DEFAULT_DISPLAY_NAME),
            bio_placeholder: env_or("WALL_BIO_PLACEHOLDER", DEFAULT_BIO_PLACEHOLDER),
            poll_interval: poll_interval(env_parse("WALL_POLL_INTERVAL_MS", 2000))?,
            max_upload_bytes: env_parse("WALL_MAX_UPLOAD_MB", 20) * 1024 * 1024,
        })
    }

    /// In-memory configuration used by `AppState::fake()`.
    pub fn memory() -> Self {
        Self {
            backend: BackendConfig::Memory {
                public_base_url: "http://localhost:8080/storage".into(),
            },
            buckets: Buckets::default(),
            display_name: DEFAULT_DISPLAY_NAME.into(),
            bio_placeholder: DEFAULT_BIO_PLACEHOLDER.into(),
            poll_interval: Duration::from_secs(2),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

fn poll_interval(ms: u64) -> anyhow::Result<Duration> {
    if ms == 0 {
        anyhow::bail!("WALL_POLL_INTERVAL_MS must be greater than zero");
    }
    Ok(Duration::from_millis(ms))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config_defaults() {
        let cfg = AppConfig::memory();
        assert_eq!(cfg.buckets.profile_photos, "profile-photos");
        assert_eq!(cfg.buckets.wall_uploads, "wall-uploads");
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.bio_placeholder, DEFAULT_BIO_PLACEHOLDER);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        assert!(poll_interval(0).is_err());
        assert_eq!(poll_interval(2000).unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        assert_eq!(env_parse::<u64>("WALL_TEST_SURELY_UNSET_VAR", 7), 7);
    }
}
