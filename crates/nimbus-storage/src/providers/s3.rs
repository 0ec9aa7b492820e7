//! S3-compatible object store (AWS S3, MinIO, Cloudflare R2).

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use nimbus_core::config::S3StorageConfig;
use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::{
    GrantMethod, ObjectBody, ObjectMeta, ObjectStore, PresignedGrant, PutOptions,
};

/// Characters left unescaped in an `x-amz-copy-source` path.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when both keys are set; otherwise the
    /// default AWS credential chain applies.
    pub async fn new(config: &S3StorageConfig) -> AppResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.access_key.is_empty() && !config.secret_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "nimbus-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(config.endpoint.clone());
        }

        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 object store"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    fn presigning(expires_in: Duration) -> AppResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in).map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Invalid grant lifetime", e)
        })
    }

    fn into_grant(
        request: PresignedRequest,
        method: GrantMethod,
        expires_in: Duration,
    ) -> PresignedGrant {
        let headers = request
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let ttl = chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::zero());
        PresignedGrant {
            url: request.uri().to_string(),
            method,
            headers,
            expires_at: Utc::now() + ttl,
        }
    }
}

fn upstream<E: std::error::Error>(context: String) -> impl FnOnce(E) -> AppError {
    move |e| AppError::upstream(format!("{context}: {}", DisplayErrorContext(&e)))
}

fn to_datetime(value: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn to_hash_map(metadata: &BTreeMap<String, String>) -> HashMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok())
    }

    async fn get(&self, key: &str) -> AppResult<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    AppError::not_found(format!("Object not found: {key}"))
                } else {
                    AppError::with_source(
                        ErrorKind::UpstreamFailure,
                        format!("Failed to read object: {key}"),
                        service,
                    )
                }
            })?;

        let meta = ObjectMeta {
            key: key.to_string(),
            size_bytes: output.content_length().unwrap_or_default().max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            last_modified: to_datetime(output.last_modified()),
        };
        let reader = output.body.into_async_read();
        Ok(ObjectBody {
            meta,
            stream: Box::pin(ReaderStream::new(reader)),
        })
    }

    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> AppResult<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(S3ByteStream::from(data))
            .set_content_type(options.content_type.clone())
            .set_metadata(Some(to_hash_map(&options.metadata)))
            .send()
            .await
            .map_err(upstream(format!("Failed to write object: {key}")))?;

        debug!(key, bytes = size, "Wrote object");
        Ok(())
    }

    async fn head(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size_bytes: output.content_length().unwrap_or_default().max(0) as u64,
                content_type: output.content_type().map(str::to_string),
                last_modified: to_datetime(output.last_modified()),
            })),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(None)
                } else {
                    Err(AppError::with_source(
                        ErrorKind::UpstreamFailure,
                        format!("Failed to stat object: {key}"),
                        service,
                    ))
                }
            }
        }
    }

    async fn copy(&self, from: &str, to: &str, options: &PutOptions) -> AppResult<()> {
        let source = format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(from, COPY_SOURCE)
        );
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(source)
            .key(to)
            .metadata_directive(MetadataDirective::Replace)
            .set_content_type(options.content_type.clone())
            .set_metadata(Some(to_hash_map(&options.metadata)))
            .send()
            .await
            .map_err(upstream(format!("Failed to copy {from} -> {to}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(upstream(format!("Failed to delete object: {key}")))?;
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        options: &PutOptions,
        expires_in: Duration,
    ) -> AppResult<PresignedGrant> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(options.content_type.clone())
            .set_metadata(Some(to_hash_map(&options.metadata)))
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(upstream(format!("Failed to presign upload: {key}")))?;
        Ok(Self::into_grant(request, GrantMethod::Put, expires_in))
    }

    async fn presign_get(
        &self,
        key: &str,
        content_disposition: &str,
        expires_in: Duration,
    ) -> AppResult<PresignedGrant> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(content_disposition)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(upstream(format!("Failed to presign download: {key}")))?;
        Ok(Self::into_grant(request, GrantMethod::Get, expires_in))
    }
}
