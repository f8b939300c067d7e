//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from sync-core.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, StorageClass};
use aws_smithy_types::byte_stream::Length;
use futures::stream::{self, StreamExt};

use sync_core::traits::FINGERPRINT_METADATA_KEY;
use sync_core::{
    CompletedPart, Config, Error, ObjectStore, PartUpload, RemoteSnapshot, Result, UploadTarget,
};

/// Error codes S3 uses for credential and permission problems
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

/// Connection settings for [`S3Client`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    /// Region override; the AWS environment decides when unset
    pub region: Option<String>,
    /// Endpoint override for S3-compatible services
    pub endpoint: Option<String>,
    /// Metadata requests in flight while listing
    pub list_concurrency: usize,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            list_concurrency: 10,
        }
    }
}

impl S3Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            list_concurrency: config.transfer.max_concurrency.max(1),
        }
    }
}

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    list_concurrency: usize,
}

impl S3Client {
    /// Create a client from the default AWS credential chain
    pub async fn new(settings: S3Settings) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        // Custom endpoints are usually S3-compatible servers without
        // virtual-host bucket addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        tracing::debug!(
            region = ?config.region(),
            endpoint = ?settings.endpoint,
            "S3 client ready"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            list_concurrency: settings.list_concurrency.max(1),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<(String, Option<String>)>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.inner.list_objects_v2().bucket(bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| classify_error(&e, &format!("listing bucket '{bucket}'")))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push((key.to_string(), object.e_tag().map(str::to_string)));
                }
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    /// Read the stored fingerprint of one object
    ///
    /// Returns `None` when the object disappeared after the listing.
    async fn fetch_fingerprint(
        &self,
        bucket: &str,
        key: String,
        etag: Option<String>,
    ) -> Result<Option<(String, Option<String>)>> {
        match self.inner.head_object().bucket(bucket).key(&key).send().await {
            Ok(response) => {
                let fingerprint = stored_fingerprint(response.metadata(), etag.as_deref());
                Ok(Some((key, fingerprint)))
            }
            Err(e) => match classify_error(&e, &format!("reading metadata of '{key}'")) {
                Error::NotFound(_) => {
                    tracing::debug!(key = %key, "object vanished during listing");
                    Ok(None)
                }
                other => Err(other),
            },
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_all(&self, bucket: &str, prefix: &str) -> Result<RemoteSnapshot> {
        let keys = self.list_keys(bucket, prefix).await?;
        tracing::debug!(bucket, prefix, objects = keys.len(), "listed objects");

        let results: Vec<Result<Option<(String, Option<String>)>>> = stream::iter(keys)
            .map(|(key, etag)| self.fetch_fingerprint(bucket, key, etag))
            .buffer_unordered(self.list_concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|result| result.transpose())
            .collect()
    }

    async fn put_object(&self, target: &UploadTarget, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::Upload {
                key: target.key.clone(),
                message: format!("cannot read {}: {e}", path.display()),
            })?;

        self.inner
            .put_object()
            .bucket(&target.bucket)
            .key(&target.key)
            .body(body)
            .set_metadata(Some(target.metadata.clone()))
            .set_storage_class(storage_class(target))
            .send()
            .await
            .map_err(|e| classify_error(&e, &format!("uploading '{}'", target.key)))?;

        tracing::debug!(key = %target.key, "object uploaded");
        Ok(())
    }

    async fn create_multipart(&self, target: &UploadTarget) -> Result<String> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .set_metadata(Some(target.metadata.clone()))
            .set_storage_class(storage_class(target))
            .send()
            .await
            .map_err(|e| classify_error(&e, &format!("starting upload of '{}'", target.key)))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Upload {
                key: target.key.clone(),
                message: "store returned no upload id".to_string(),
            })
    }

    async fn upload_part(&self, part: &PartUpload) -> Result<CompletedPart> {
        let body = ByteStream::read_from()
            .path(&part.path)
            .offset(part.offset)
            .length(Length::Exact(part.length))
            .build()
            .await
            .map_err(|e| Error::Upload {
                key: part.key.clone(),
                message: format!("cannot read part {}: {e}", part.part_number),
            })?;

        let response = self
            .inner
            .upload_part()
            .bucket(&part.bucket)
            .key(&part.key)
            .upload_id(&part.upload_id)
            .part_number(part.part_number)
            .content_length(part.length as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                classify_error(
                    &e,
                    &format!("uploading part {} of '{}'", part.part_number, part.key),
                )
            })?;

        let etag = response.e_tag().ok_or_else(|| Error::Upload {
            key: part.key.clone(),
            message: format!("store returned no ETag for part {}", part.part_number),
        })?;

        Ok(CompletedPart {
            part_number: part.part_number,
            etag: etag.to_string(),
        })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|p| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(p.etag)
                    .build()
            })
            .collect();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| classify_error(&e, &format!("completing upload of '{key}'")))?;

        Ok(())
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| classify_error(&e, &format!("aborting upload of '{key}'")))?;

        Ok(())
    }
}

fn storage_class(target: &UploadTarget) -> Option<StorageClass> {
    target.storage_class.as_deref().map(StorageClass::from)
}

/// Fingerprint stored for an object
///
/// The `md5` user metadata written by uploads wins. Without it, a
/// single-part ETag is the MD5 of the content; multipart ETags (with a `-`)
/// are not, so those objects have no usable fingerprint.
pub fn stored_fingerprint(
    metadata: Option<&HashMap<String, String>>,
    etag: Option<&str>,
) -> Option<String> {
    if let Some(value) = metadata.and_then(|m| m.get(FINGERPRINT_METADATA_KEY)) {
        return Some(value.clone());
    }
    etag.map(|e| e.trim_matches('"'))
        .filter(|e| !e.is_empty() && !e.contains('-'))
        .map(str::to_string)
}

/// Map an SDK error to the sync-core taxonomy
pub(crate) fn classify_error(err: &(dyn std::error::Error + 'static), context: &str) -> Error {
    let message = format!("{context}: {}", DisplayErrorContext(err));
    if AUTH_ERROR_CODES.iter().any(|code| message.contains(code)) {
        Error::Auth(message)
    } else if message.contains("NoSuchBucket")
        || message.contains("NoSuchUpload")
        || message.contains("NotFound")
    {
        Error::NotFound(message)
    } else {
        Error::Network(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error(message: &str) -> std::io::Error {
        std::io::Error::other(message.to_string())
    }

    #[test]
    fn test_metadata_fingerprint_wins() {
        let metadata = HashMap::from([("md5".to_string(), "abc".to_string())]);
        assert_eq!(
            stored_fingerprint(Some(&metadata), Some("\"etag\"")),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_single_part_etag_is_fallback() {
        assert_eq!(
            stored_fingerprint(None, Some("\"5eb63bbbe01eeed093cb22bb8f5acdc3\"")),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3".to_string())
        );
        assert_eq!(
            stored_fingerprint(Some(&HashMap::new()), Some("abc")),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_multipart_etag_is_not_a_fingerprint() {
        assert_eq!(stored_fingerprint(None, Some("\"abc-2\"")), None);
        assert_eq!(stored_fingerprint(None, None), None);
        assert_eq!(stored_fingerprint(None, Some("\"\"")), None);
    }

    #[test]
    fn test_classify_error() {
        let err = io_error("AccessDenied: Access Denied");
        assert!(matches!(classify_error(&err, "put"), Error::Auth(_)));

        let err = io_error("NoSuchBucket: The specified bucket does not exist");
        assert!(matches!(classify_error(&err, "list"), Error::NotFound(_)));

        let err = io_error("dispatch failure: connection refused");
        let mapped = classify_error(&err, "list");
        assert!(matches!(mapped, Error::Network(_)));
        assert!(mapped.to_string().contains("list: "));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            region: Some("eu-west-1".to_string()),
            endpoint: Some("http://localhost:9000".to_string()),
            ..Default::default()
        };
        let settings = S3Settings::from_config(&config);
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.list_concurrency, 10);
    }
}
