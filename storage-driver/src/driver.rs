use std::{fmt, ops::Deref, sync::Arc};

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use http::Uri;
use tokio::io;

use crate::error::StorageError;
use crate::parameters::Parameters;

/// A source stream for content written to a driver.
pub type Reader<'r> = dyn io::AsyncRead + Unpin + Send + 'r;

/// A stream of stored content, returned by [`StorageDriver::reader`].
///
/// The stream holds any remote resources (e.g. an open response body) until
/// it is dropped.
pub type ReadStream = Box<dyn io::AsyncBufRead + Unpin + Send + 'static>;

/// Information about a stored path, as returned by [`StorageDriver::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInfo {
    path: Utf8PathBuf,
    size: Option<u64>,
    modified: Option<DateTime<Utc>>,
    is_dir: bool,
}

impl FileInfo {
    /// Describe a file of `size` bytes.
    pub fn file(path: impl Into<Utf8PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size: Some(size),
            modified: None,
            is_dir: false,
        }
    }

    /// Describe a directory. Directories have no size.
    pub fn directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
            modified: None,
            is_dir: true,
        }
    }

    /// Attach a modification time.
    pub fn with_modified(mut self, modified: Option<DateTime<Utc>>) -> Self {
        self.modified = modified;
        self
    }

    /// The path this information describes.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The size in bytes. `None` for directories.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The last modification time, when the backend reports one.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// Whether this path is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// A storage driver, the fixed set of capabilities a registry needs from a
/// storage backend.
///
/// Paths are `/`-separated registry paths such as
/// `/docker/registry/v2/blobs/sha256/ab/abcd/data`. Directories are implicit:
/// a directory exists while anything is stored below it.
#[async_trait::async_trait]
pub trait StorageDriver: fmt::Debug + Send + Sync {
    /// The name of the driver.
    fn name(&self) -> &'static str;

    /// Retrieve the full content stored at `path`.
    async fn get_content(&self, path: &Utf8Path) -> Result<Bytes, StorageError>;

    /// Store `content` at `path`, replacing anything already there.
    async fn put_content(&self, path: &Utf8Path, content: Bytes) -> Result<(), StorageError>;

    /// Open a stream of the content at `path`, starting at `offset`.
    async fn reader(&self, path: &Utf8Path, offset: u64) -> Result<ReadStream, StorageError>;

    /// Store the content of `reader` at `path`, returning the number of bytes consumed.
    async fn write_stream(
        &self,
        path: &Utf8Path,
        offset: u64,
        reader: &mut Reader<'_>,
    ) -> Result<u64, StorageError>;

    /// Retrieve information about `path`.
    async fn stat(&self, path: &Utf8Path) -> Result<FileInfo, StorageError>;

    /// List the names of the direct descendants of `path`.
    async fn list(&self, path: &Utf8Path) -> Result<Vec<String>, StorageError>;

    /// Move the object at `source` to `dest`, removing the original.
    async fn move_path(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<(), StorageError>;

    /// Recursively delete everything stored at `path` and below it.
    async fn delete(&self, path: &Utf8Path) -> Result<(), StorageError>;

    /// Get a URL from which the content at `path` can be retrieved directly.
    async fn url_for(&self, path: &Utf8Path, options: &Parameters) -> Result<Uri, StorageError>;
}

#[async_trait::async_trait]
impl<D> StorageDriver for Arc<D>
where
    D: ?Sized + StorageDriver,
{
    fn name(&self) -> &'static str {
        self.deref().name()
    }

    async fn get_content(&self, path: &Utf8Path) -> Result<Bytes, StorageError> {
        self.deref().get_content(path).await
    }

    async fn put_content(&self, path: &Utf8Path, content: Bytes) -> Result<(), StorageError> {
        self.deref().put_content(path, content).await
    }

    async fn reader(&self, path: &Utf8Path, offset: u64) -> Result<ReadStream, StorageError> {
        self.deref().reader(path, offset).await
    }

    async fn write_stream(
        &self,
        path: &Utf8Path,
        offset: u64,
        reader: &mut Reader<'_>,
    ) -> Result<u64, StorageError> {
        self.deref().write_stream(path, offset, reader).await
    }

    async fn stat(&self, path: &Utf8Path) -> Result<FileInfo, StorageError> {
        self.deref().stat(path).await
    }

    async fn list(&self, path: &Utf8Path) -> Result<Vec<String>, StorageError> {
        self.deref().list(path).await
    }

    async fn move_path(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<(), StorageError> {
        self.deref().move_path(source, dest).await
    }

    async fn delete(&self, path: &Utf8Path) -> Result<(), StorageError> {
        self.deref().delete(path).await
    }

    async fn url_for(&self, path: &Utf8Path, options: &Parameters) -> Result<Uri, StorageError> {
        self.deref().url_for(path, options).await
    }
}
