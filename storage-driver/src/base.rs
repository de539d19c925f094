//! Path validation shared by every driver.
//!
//! [`Checked`] wraps a driver so that backends only ever see well-formed
//! paths, and so each call is recorded in its own tracing span.

use bytes::Bytes;
use camino::Utf8Path;
use eyre::eyre;
use http::Uri;

use crate::driver::{FileInfo, ReadStream, Reader, StorageDriver};
use crate::error::{StorageError, StorageErrorKind};
use crate::parameters::Parameters;

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn invalid_path(engine: &'static str, path: &Utf8Path) -> StorageError {
    StorageError::builder(
        engine,
        StorageErrorKind::InvalidPath,
        eyre!("invalid path: {path:?}"),
    )
    .path(path.as_str())
    .build()
}

/// Whether `path` names the storage root.
pub fn is_root(path: &Utf8Path) -> bool {
    matches!(path.as_str(), "" | "/")
}

/// Whether `path` is a valid path to an object or directory.
///
/// Valid paths are one or more `/`-separated segments of ASCII letters,
/// digits, `.`, `_` and `-`, optionally starting with `/`.
pub fn is_valid(path: &Utf8Path) -> bool {
    let relative = path.as_str().strip_prefix('/').unwrap_or(path.as_str());
    !relative.is_empty()
        && relative
            .split('/')
            .all(|segment| !segment.is_empty() && segment.chars().all(is_segment_char))
}

/// A driver which rejects invalid paths before delegating to `D`.
#[derive(Debug, Clone)]
pub struct Checked<D> {
    inner: D,
}

impl<D> Checked<D>
where
    D: StorageDriver,
{
    /// Wrap `inner`.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// The wrapped driver.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    fn check(&self, path: &Utf8Path) -> Result<(), StorageError> {
        if is_valid(path) {
            Ok(())
        } else {
            Err(invalid_path(self.inner.name(), path))
        }
    }
}

#[async_trait::async_trait]
impl<D> StorageDriver for Checked<D>
where
    D: StorageDriver,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[tracing::instrument(skip(self), fields(driver = self.inner.name()))]
    async fn get_content(&self, path: &Utf8Path) -> Result<Bytes, StorageError> {
        self.check(path)?;
        self.inner.get_content(path).await
    }

    #[tracing::instrument(skip(self, content), fields(driver = self.inner.name(), size = content.len()))]
    async fn put_content(&self, path: &Utf8Path, content: Bytes) -> Result<(), StorageError> {
        self.check(path)?;
        self.inner.put_content(path, content).await
    }

    #[tracing::instrument(skip(self), fields(driver = self.inner.name()))]
    async fn reader(&self, path: &Utf8Path, offset: u64) -> Result<ReadStream, StorageError> {
        self.check(path)?;
        self.inner.reader(path, offset).await
    }

    #[tracing::instrument(skip(self, reader), fields(driver = self.inner.name()))]
    async fn write_stream(
        &self,
        path: &Utf8Path,
        offset: u64,
        reader: &mut Reader<'_>,
    ) -> Result<u64, StorageError> {
        self.check(path)?;
        self.inner.write_stream(path, offset, reader).await
    }

    #[tracing::instrument(skip(self), fields(driver = self.inner.name()))]
    async fn stat(&self, path: &Utf8Path) -> Result<FileInfo, StorageError> {
        self.check(path)?;
        self.inner.stat(path).await
    }

    #[tracing::instrument(skip(self), fields(driver = self.inner.name()))]
    async fn list(&self, path: &Utf8Path) -> Result<Vec<String>, StorageError> {
        if !is_root(path) {
            self.check(path)?;
        }
        self.inner.list(path).await
    }

    #[tracing::instrument(skip(self), fields(driver = self.inner.name()))]
    async fn move_path(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<(), StorageError> {
        self.check(source)?;
        self.check(dest)?;
        self.inner.move_path(source, dest).await
    }

    #[tracing::instrument(skip(self), fields(driver = self.inner.name()))]
    async fn delete(&self, path: &Utf8Path) -> Result<(), StorageError> {
        self.check(path)?;
        self.inner.delete(path).await
    }

    #[tracing::instrument(skip(self, options), fields(driver = self.inner.name()))]
    async fn url_for(&self, path: &Utf8Path, options: &Parameters) -> Result<Uri, StorageError> {
        self.check(path)?;
        self.inner.url_for(path, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_paths() {
        for path in [
            "a",
            "a/b.txt",
            "/docker/registry/v2/blobs/sha256/ab/abcdef/data",
            "/_uploads/0-1_2.x",
        ] {
            assert!(is_valid(Utf8Path::new(path)), "{path} should be valid");
        }
    }

    #[test]
    fn invalid_paths() {
        for path in ["", "/", "a//b", "a/b/", "//a", "a/b c", "a/b:c", "a/ü"] {
            assert!(!is_valid(Utf8Path::new(path)), "{path} should be invalid");
        }
    }

    #[test]
    fn root_paths() {
        assert!(is_root(Utf8Path::new("/")));
        assert!(is_root(Utf8Path::new("")));
        assert!(!is_root(Utf8Path::new("/a")));
    }
}
