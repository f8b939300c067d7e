//! ObjectStore trait definition
//!
//! The sync engine only needs a narrow slice of an object store: a listing
//! of keys with their stored fingerprints, and single or multipart uploads.
//! The S3 adapter implements this trait; tests substitute fakes and mocks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::normalize_remote;

/// User-metadata key that carries the content fingerprint of an upload
pub const FINGERPRINT_METADATA_KEY: &str = "md5";

/// Point-in-time listing of remote keys and their stored fingerprints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    objects: HashMap<String, Option<String>>,
}

impl RemoteSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an object; `None` when the store has no usable fingerprint
    pub fn insert(&mut self, key: impl Into<String>, fingerprint: Option<String>) {
        self.objects.insert(key.into(), fingerprint);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Stored fingerprint with surrounding quotes removed
    ///
    /// Outer `None` means the key is absent; inner `None` means it exists
    /// without a fingerprint.
    pub fn fingerprint(&self, key: &str) -> Option<Option<&str>> {
        self.objects
            .get(key)
            .map(|fp| fp.as_deref().map(normalize_remote))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for RemoteSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

/// Destination and attributes of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    /// User metadata stored with the object
    pub metadata: HashMap<String, String>,
    /// Storage class hint, passed through to the store
    pub storage_class: Option<String>,
}

impl UploadTarget {
    /// Fingerprint carried in the metadata, if any
    pub fn fingerprint(&self) -> Option<&str> {
        self.metadata
            .get(FINGERPRINT_METADATA_KEY)
            .map(String::as_str)
    }
}

/// One part of a multipart upload: a byte range of a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    /// 1-based part number
    pub part_number: i32,
    pub path: PathBuf,
    pub offset: u64,
    pub length: u64,
}

/// A part acknowledged by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Trait for the object-store operations the sync engine needs
///
/// Uploads overwrite by key. A multipart upload becomes visible only after
/// [`ObjectStore::complete_multipart`], and its metadata is fixed at
/// [`ObjectStore::create_multipart`], so an aborted upload never shows up
/// in a later [`ObjectStore::list_all`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object under `prefix` with its stored fingerprint
    async fn list_all(&self, bucket: &str, prefix: &str) -> Result<RemoteSnapshot>;

    /// Upload a whole file in one request
    async fn put_object(&self, target: &UploadTarget, path: &Path) -> Result<()>;

    /// Start a multipart upload and return its upload id
    async fn create_multipart(&self, target: &UploadTarget) -> Result<String>;

    /// Upload one byte range of a file
    async fn upload_part(&self, part: &PartUpload) -> Result<CompletedPart>;

    /// Assemble uploaded parts into the final object
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    /// Discard an unfinished multipart upload
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;
}
