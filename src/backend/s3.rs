use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use async_trait::async_trait;
use bytes::Bytes;

use super::{join_public_url, ObjectEntry, ObjectStore, UploadOptions};
use crate::config::StorageConfig;

/// S3-compatible object storage. Buckets are chosen per call; public URLs are
/// derived from the configured public base rather than presigned.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    public_base_url: String,
}

impl S3ObjectStore {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            public_base_url: cfg.public_base_url.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &UploadOptions,
    ) -> anyhow::Result<()> {
        let mut req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(&opts.content_type);
        if !opts.overwrite {
            // conditional write: the store answers 412 if the key exists
            req = req.if_none_match("*");
        }
        req.send()
            .await
            .with_context(|| format!("s3 put_object {bucket}/{key}"))?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {bucket}/{key}"))?;
        Ok(())
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
        let max_keys = i32::try_from(limit).unwrap_or(i32::MAX);
        let out = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .with_context(|| format!("s3 list_objects_v2 {bucket}/{prefix}"))?;

        Ok(out
            .contents()
            .iter()
            .filter_map(|o| o.key())
            .take(limit)
            .map(|k| ObjectEntry { name: k.to_string() })
            .collect())
    }
}
