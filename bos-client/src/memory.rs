use std::collections::{BTreeMap, HashMap};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use sha1::Digest as _;
use tokio::sync::{Mutex, RwLock};

use crate::bucket::{Bucket, ObjectReader, ObjectSummary, PartInfo, UploadId};
use crate::errors::BucketError;

use super::{MAX_PART_NUMBER, MIN_PART_SIZE};

fn etag(data: &[u8]) -> String {
    hex::encode(sha1::Sha1::digest(data))
}

#[derive(Debug)]
struct MemoryObject {
    modified: DateTime<Utc>,
    data: Bytes,
}

impl From<Bytes> for MemoryObject {
    fn from(data: Bytes) -> Self {
        Self {
            modified: Utc::now(),
            data,
        }
    }
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    parts: BTreeMap<i32, (String, Bytes)>,
}

/// A bucket which keeps objects in memory.
///
/// Follows the same rules as the remote service for multipart uploads:
/// parts must be completed in contiguous ascending order starting at 1,
/// with matching checksums, and every part but the last must be at least
/// [`MIN_PART_SIZE`] bytes.
#[derive(Debug, Default)]
pub struct MemoryBucket {
    name: String,
    objects: RwLock<BTreeMap<String, MemoryObject>>,
    uploads: Mutex<HashMap<UploadId, PendingUpload>>,
}

impl MemoryBucket {
    /// Create an empty bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of multipart uploads which were neither completed nor aborted.
    pub async fn pending_uploads(&self) -> usize {
        self.uploads.lock().await.len()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the bucket holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

fn no_such_upload(upload: &UploadId) -> BucketError {
    BucketError::NoSuchUpload(upload.to_string())
}

#[async_trait::async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader, BucketError> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| BucketError::NoSuchKey(key.to_owned()))?;
        Ok(Box::pin(std::io::Cursor::new(object.data.clone())))
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), BucketError> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_owned(), body.into());
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, BucketError> {
        tracing::trace!(bucket = %self.name, %prefix, "list memory bucket");

        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| {
                ObjectSummary::new(key.as_str(), object.data.len() as u64, Some(object.modified))
            })
            .collect())
    }

    async fn copy_object(&self, source: &str, dest: &str) -> Result<(), BucketError> {
        let mut objects = self.objects.write().await;
        let data = objects
            .get(source)
            .ok_or_else(|| BucketError::NoSuchKey(source.to_owned()))?
            .data
            .clone();
        objects.insert(dest.to_owned(), data.into());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }

    async fn initiate_multipart_upload(&self, key: &str) -> Result<UploadId, BucketError> {
        let upload = UploadId::from(uuid::Uuid::new_v4().simple().to_string());
        let mut uploads = self.uploads.lock().await;
        uploads.insert(
            upload.clone(),
            PendingUpload {
                key: key.to_owned(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload: &UploadId,
        part_number: i32,
        body: Bytes,
    ) -> Result<PartInfo, BucketError> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(BucketError::InvalidPart(format!(
                "part number {part_number} out of range"
            )));
        }

        let mut uploads = self.uploads.lock().await;
        let pending = uploads
            .get_mut(upload)
            .filter(|pending| pending.key == key)
            .ok_or_else(|| no_such_upload(upload))?;

        let tag = etag(&body);
        pending.parts.insert(part_number, (tag.clone(), body));
        Ok(PartInfo::new(part_number, tag))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
        parts: &[PartInfo],
    ) -> Result<(), BucketError> {
        let mut uploads = self.uploads.lock().await;
        let pending = uploads
            .get(upload)
            .filter(|pending| pending.key == key)
            .ok_or_else(|| no_such_upload(upload))?;

        if parts.is_empty() {
            return Err(BucketError::InvalidPart("no parts to complete".into()));
        }

        let mut data = BytesMut::new();
        for (index, part) in parts.iter().enumerate() {
            let expected = index as i32 + 1;
            if part.part_number() != expected {
                return Err(BucketError::InvalidPart(format!(
                    "expected part {expected}, got part {}",
                    part.part_number()
                )));
            }

            let (tag, body) = pending
                .parts
                .get(&expected)
                .ok_or_else(|| BucketError::InvalidPart(format!("part {expected} not uploaded")))?;
            if tag != part.etag() {
                return Err(BucketError::InvalidPart(format!(
                    "part {expected} checksum mismatch"
                )));
            }

            let last = index + 1 == parts.len();
            if !last && body.len() < MIN_PART_SIZE {
                return Err(BucketError::InvalidPart(format!(
                    "part {expected} is smaller than the minimum part size"
                )));
            }

            data.extend_from_slice(body);
        }

        uploads.remove(upload);
        drop(uploads);

        let mut objects = self.objects.write().await;
        objects.insert(key.to_owned(), data.freeze().into());
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _key: &str,
        upload: &UploadId,
    ) -> Result<(), BucketError> {
        let mut uploads = self.uploads.lock().await;
        uploads
            .remove(upload)
            .map(|_| ())
            .ok_or_else(|| no_such_upload(upload))
    }
}
