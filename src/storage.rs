use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;

use crate::config::S3Config;

/// Object store holding poster images. Objects are publicly readable, so a
/// key maps to a stable URL without presigning.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    fn public_url(&self, key: &str) -> String;
    /// Inverse of `public_url`. `None` for URLs that do not point into this
    /// store.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    base_url: String,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ));
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            base_url: public_base_url(cfg),
        })
    }
}

/// Key of `url` when it is `<base>/<key>` with a single, non-empty key
/// segment.
pub(crate) fn key_under_base(base: &str, url: &str) -> Option<String> {
    let key = url.strip_prefix(base)?.strip_prefix('/')?;
    if key.is_empty() || key.contains(['/', '?', '#']) {
        return None;
    }
    Some(key.to_string())
}

/// `S3_PUBLIC_BASE_URL` wins; otherwise path-style endpoint URLs for
/// S3-compatible servers and virtual-hosted AWS URLs.
pub(crate) fn public_base_url(cfg: &S3Config) -> String {
    if let Some(base) = &cfg.public_base_url {
        return base.trim_end_matches('/').to_string();
    }
    match &cfg.endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), cfg.bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", cfg.bucket, cfg.region),
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_under_base(&self.base_url, url)
    }
}
