use bytes::Bytes;
use camino::Utf8Path;
use http::Uri;
use tokio::io::AsyncReadExt as _;

use bos_client::{BosClient, Bucket, BucketError, PartInfo, UploadId, MIN_PART_SIZE};
use storage_driver::{
    is_root, FileInfo, Parameters, ReadStream, Reader, StorageDriver, StorageError,
    StorageErrorKind,
};

use crate::paths::{self, KeyMapper};
use crate::{BOS_DRIVER_NAME, DEFAULT_CHUNK_SIZE};

/// A storage driver which keeps registry content in an object-storage bucket.
///
/// Every registry path maps to one object key (see [`KeyMapper`]).
/// Directories are implicit, they exist while some key is stored below them.
#[derive(Debug)]
pub struct BosDriver<B = BosClient> {
    bucket: B,
    keys: KeyMapper,
    chunk_size: usize,
}

impl<B> BosDriver<B>
where
    B: Bucket,
{
    /// Create a driver storing content at the top of `bucket`, writing
    /// streams in [`DEFAULT_CHUNK_SIZE`] parts.
    pub fn with_bucket(bucket: B) -> Self {
        Self {
            bucket,
            keys: KeyMapper::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Store content below `root` in the bucket.
    pub fn root_directory(mut self, root: Option<&str>) -> Self {
        self.keys = KeyMapper::new(root);
        self
    }

    /// Set the part size used by [`StorageDriver::write_stream`].
    ///
    /// Sizes below [`MIN_PART_SIZE`] are raised to it.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(MIN_PART_SIZE);
        self
    }

    /// The underlying bucket.
    pub fn bucket(&self) -> &B {
        &self.bucket
    }

    fn bucket_error<'a>(
        &'a self,
        path: &'a Utf8Path,
        context: &'static str,
    ) -> impl FnOnce(BucketError) -> StorageError + 'a {
        move |error| {
            let kind = match &error {
                error if error.is_not_found() => StorageErrorKind::NotFound,
                BucketError::Io(_) => StorageErrorKind::Io,
                _ => StorageErrorKind::Transport,
            };

            StorageError::builder(BOS_DRIVER_NAME, kind, error)
                .bucket(self.bucket.name())
                .path(path.as_str())
                .context(context)
                .build()
        }
    }

    fn io_error<'a>(
        &'a self,
        path: &'a Utf8Path,
        context: &'static str,
    ) -> impl FnOnce(std::io::Error) -> StorageError + 'a {
        move |error| {
            StorageError::builder(BOS_DRIVER_NAME, StorageErrorKind::Io, error)
                .bucket(self.bucket.name())
                .path(path.as_str())
                .context(context)
                .build()
        }
    }

    /// Keys of every object at or below `key`.
    async fn keys_within(&self, path: &Utf8Path, key: &str) -> Result<Vec<String>, StorageError> {
        let objects = self
            .bucket
            .list_objects(key)
            .await
            .map_err(self.bucket_error(path, "list"))?;

        Ok(objects
            .into_iter()
            .filter(|object| paths::within(key, object.key()))
            .map(|object| object.key().to_owned())
            .collect())
    }
}

/// The parts uploaded so far in one `write_stream` call.
#[derive(Debug)]
struct UploadSession {
    upload: UploadId,
    parts: Vec<PartInfo>,
}

impl UploadSession {
    fn new(upload: UploadId) -> Self {
        Self {
            upload,
            parts: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn next_part_number(&self) -> i32 {
        self.parts.len() as i32 + 1
    }
}

/// Read up to `size` bytes, stopping early only at the end of `reader`.
async fn read_chunk(reader: &mut Reader<'_>, size: usize) -> std::io::Result<Bytes> {
    let mut buffer = Vec::with_capacity(size);
    (&mut *reader).take(size as u64).read_to_end(&mut buffer).await?;
    Ok(buffer.into())
}

#[async_trait::async_trait]
impl<B> StorageDriver for BosDriver<B>
where
    B: Bucket,
{
    fn name(&self) -> &'static str {
        BOS_DRIVER_NAME
    }

    async fn get_content(&self, path: &Utf8Path) -> Result<Bytes, StorageError> {
        let key = self.keys.key(path);
        let mut reader = self
            .bucket
            .get_object(&key)
            .await
            .map_err(self.bucket_error(path, "get object"))?;

        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .await
            .map_err(self.io_error(path, "read object"))?;
        Ok(content.into())
    }

    async fn put_content(&self, path: &Utf8Path, content: Bytes) -> Result<(), StorageError> {
        let key = self.keys.key(path);
        self.bucket
            .put_object(&key, content)
            .await
            .map_err(self.bucket_error(path, "put object"))
    }

    async fn reader(&self, path: &Utf8Path, offset: u64) -> Result<ReadStream, StorageError> {
        if offset != 0 {
            tracing::warn!(%path, offset, "Reader offset is not supported, reading from the start");
        }

        let key = self.keys.key(path);
        let reader = self
            .bucket
            .get_object(&key)
            .await
            .map_err(self.bucket_error(path, "get object"))?;
        Ok(Box::new(reader))
    }

    async fn write_stream(
        &self,
        path: &Utf8Path,
        offset: u64,
        reader: &mut Reader<'_>,
    ) -> Result<u64, StorageError> {
        if offset != 0 {
            tracing::warn!(%path, offset, "Writer offset is not supported, writing from the start");
        }

        let key = self.keys.key(path);
        let upload = self
            .bucket
            .initiate_multipart_upload(&key)
            .await
            .map_err(self.bucket_error(path, "initiate multipart upload"))?;
        let mut session = UploadSession::new(upload);
        let mut written = 0u64;

        loop {
            let chunk = read_chunk(reader, self.chunk_size)
                .await
                .map_err(self.io_error(path, "read source"))?;
            written += chunk.len() as u64;
            let last = chunk.len() < self.chunk_size;

            if last && session.is_empty() {
                tracing::trace!(size = chunk.len(), "Content fits in one chunk, using a single put");
                if let Err(error) = self
                    .bucket
                    .abort_multipart_upload(&key, &session.upload)
                    .await
                {
                    tracing::debug!(upload = %session.upload, "Failed to abort unused upload: {error}");
                }

                self.bucket
                    .put_object(&key, chunk)
                    .await
                    .map_err(self.bucket_error(path, "put object"))?;
                return Ok(written);
            }

            if chunk.is_empty() {
                break;
            }

            let part_number = session.next_part_number();
            let part = self
                .bucket
                .upload_part(&key, &session.upload, part_number, chunk)
                .await
                .map_err(|error| {
                    tracing::error!(upload = %session.upload, part_number, "Failed to upload part: {error}");
                    self.bucket_error(path, "upload part")(error)
                })?;
            session.parts.push(part);

            if last {
                break;
            }
        }

        self.bucket
            .complete_multipart_upload(&key, &session.upload, &session.parts)
            .await
            .map_err(self.bucket_error(path, "complete multipart upload"))?;

        tracing::debug!(parts = session.parts.len(), written, "Completed chunked write");
        Ok(written)
    }

    async fn stat(&self, path: &Utf8Path) -> Result<FileInfo, StorageError> {
        let key = self.keys.key(path);
        let objects = self
            .bucket
            .list_objects(&key)
            .await
            .map_err(self.bucket_error(path, "list"))?;

        let mut matches = objects
            .into_iter()
            .filter(|object| paths::within(&key, object.key()));

        match (matches.next(), matches.next()) {
            (None, _) => Err(StorageError::not_found(BOS_DRIVER_NAME, path.as_str())),
            (Some(object), None) if object.key() == key => {
                Ok(FileInfo::file(path, object.size()).with_modified(object.last_modified()))
            }
            _ => Ok(FileInfo::directory(path)),
        }
    }

    async fn list(&self, path: &Utf8Path) -> Result<Vec<String>, StorageError> {
        let prefix = self.keys.directory_prefix(path);
        let objects = self
            .bucket
            .list_objects(&prefix)
            .await
            .map_err(self.bucket_error(path, "list"))?;

        if objects.is_empty() && !is_root(path) {
            return Err(StorageError::not_found(BOS_DRIVER_NAME, path.as_str()));
        }

        Ok(paths::children(
            &prefix,
            objects.iter().map(|object| object.key()),
        ))
    }

    async fn move_path(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<(), StorageError> {
        let source_key = self.keys.key(source);
        let dest_key = self.keys.key(dest);

        self.bucket
            .copy_object(&source_key, &dest_key)
            .await
            .map_err(self.bucket_error(source, "copy object"))?;

        self.bucket
            .delete_object(&source_key)
            .await
            .map_err(self.bucket_error(source, "delete moved object"))
    }

    async fn delete(&self, path: &Utf8Path) -> Result<(), StorageError> {
        let key = self.keys.key(path);
        let keys = self.keys_within(path, &key).await?;
        if keys.is_empty() {
            tracing::debug!(%path, "Nothing to delete");
            return Ok(());
        }

        for key in &keys {
            self.bucket
                .delete_object(key)
                .await
                .map_err(self.bucket_error(path, "delete object"))?;
        }

        tracing::trace!(count = keys.len(), "Deleted objects");
        Ok(())
    }

    async fn url_for(&self, _path: &Utf8Path, _options: &Parameters) -> Result<Uri, StorageError> {
        Err(StorageError::unsupported(BOS_DRIVER_NAME, "url_for"))
    }
}
