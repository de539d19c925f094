use std::fmt;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncBufRead;

use crate::errors::BucketError;

/// A stream over the body of a stored object.
pub type ObjectReader = Pin<Box<dyn AsyncBufRead + Send + 'static>>;

/// Identifies an in-progress multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadId(Arc<str>);

impl UploadId {
    /// The upload identifier as issued by the service.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UploadId {
    fn from(value: String) -> Self {
        UploadId(value.into())
    }
}

impl From<&str> for UploadId {
    fn from(value: &str) -> Self {
        UploadId(value.into())
    }
}

impl From<UploadId> for String {
    fn from(value: UploadId) -> Self {
        value.0.deref().to_owned()
    }
}

/// A part of a multipart upload, as acknowledged by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    part_number: i32,
    etag: String,
}

impl PartInfo {
    /// Describe an uploaded part.
    pub fn new(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }

    /// The 1-based part number.
    pub fn part_number(&self) -> i32 {
        self.part_number
    }

    /// The checksum the service returned for this part.
    pub fn etag(&self) -> &str {
        &self.etag
    }
}

/// A single entry of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    key: String,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
}

impl ObjectSummary {
    /// Describe a stored object.
    pub fn new(key: impl Into<String>, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified,
        }
    }

    /// The object key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The object size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// When the object was last written, if the service reports it.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }
}

/// The object-storage primitives of a single bucket.
///
/// Implementations are thin: every method is one logical service request,
/// with no caching and no retries.
#[async_trait::async_trait]
pub trait Bucket: fmt::Debug + Send + Sync {
    /// The name of the bucket.
    fn name(&self) -> &str;

    /// Open the body of the object at `key`.
    async fn get_object(&self, key: &str) -> Result<ObjectReader, BucketError>;

    /// Store `body` at `key` in a single request.
    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), BucketError>;

    /// List every object whose key starts with `prefix`, in key order.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, BucketError>;

    /// Copy the object at `source` to `dest`.
    async fn copy_object(&self, source: &str, dest: &str) -> Result<(), BucketError>;

    /// Delete the object at `key`. Deleting a missing key succeeds.
    async fn delete_object(&self, key: &str) -> Result<(), BucketError>;

    /// Start a multipart upload to `key`.
    async fn initiate_multipart_upload(&self, key: &str) -> Result<UploadId, BucketError>;

    /// Upload one part of a multipart upload.
    async fn upload_part(
        &self,
        key: &str,
        upload: &UploadId,
        part_number: i32,
        body: Bytes,
    ) -> Result<PartInfo, BucketError>;

    /// Assemble the uploaded `parts` into the object at `key`.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
        parts: &[PartInfo],
    ) -> Result<(), BucketError>;

    /// Discard a multipart upload and all of its parts.
    async fn abort_multipart_upload(&self, key: &str, upload: &UploadId)
        -> Result<(), BucketError>;
}

#[async_trait::async_trait]
impl<B> Bucket for Arc<B>
where
    B: ?Sized + Bucket,
{
    fn name(&self) -> &str {
        self.deref().name()
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader, BucketError> {
        self.deref().get_object(key).await
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), BucketError> {
        self.deref().put_object(key, body).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, BucketError> {
        self.deref().list_objects(prefix).await
    }

    async fn copy_object(&self, source: &str, dest: &str) -> Result<(), BucketError> {
        self.deref().copy_object(source, dest).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
        self.deref().delete_object(key).await
    }

    async fn initiate_multipart_upload(&self, key: &str) -> Result<UploadId, BucketError> {
        self.deref().initiate_multipart_upload(key).await
    }

    async fn upload_part(
        &self,
        key: &str,
        upload: &UploadId,
        part_number: i32,
        body: Bytes,
    ) -> Result<PartInfo, BucketError> {
        self.deref()
            .upload_part(key, upload, part_number, body)
            .await
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
        parts: &[PartInfo],
    ) -> Result<(), BucketError> {
        self.deref()
            .complete_multipart_upload(key, upload, parts)
            .await
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
    ) -> Result<(), BucketError> {
        self.deref().abort_multipart_upload(key, upload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_obj_safe!(Bucket);

    #[test]
    fn upload_id_round_trips_through_string() {
        let id = UploadId::from("a1b2c3");
        assert_eq!(id.as_str(), "a1b2c3");
        assert_eq!(id.to_string(), "a1b2c3");
        assert_eq!(String::from(id), "a1b2c3");
    }
}
