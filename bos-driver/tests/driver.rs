use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bos_client::{
    Bucket, BucketError, MemoryBucket, ObjectReader, ObjectSummary, PartInfo, UploadId,
};
use bos_driver::{BosDriver, DEFAULT_CHUNK_SIZE};
use bytes::Bytes;
use camino::Utf8Path;
use storage_driver::{Checked, Parameters, StorageDriver, StorageErrorKind};
use tokio::io::AsyncReadExt;

type TestDriver = Checked<BosDriver<Arc<MemoryBucket>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn driver() -> (Arc<MemoryBucket>, TestDriver) {
    init_tracing();
    let bucket = Arc::new(MemoryBucket::new("registry"));
    let driver = Checked::new(BosDriver::with_bucket(bucket.clone()));
    (bucket, driver)
}

fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

async fn write(driver: &impl StorageDriver, path: &str, data: &[u8]) -> u64 {
    let mut source = data;
    driver
        .write_stream(Utf8Path::new(path), 0, &mut source)
        .await
        .unwrap()
}

async fn put(driver: &impl StorageDriver, path: &str, data: &'static [u8]) {
    driver
        .put_content(Utf8Path::new(path), Bytes::from_static(data))
        .await
        .unwrap();
}

async fn list(driver: &impl StorageDriver, path: &str) -> Vec<String> {
    driver.list(Utf8Path::new(path)).await.unwrap()
}

#[tokio::test]
async fn unwritten_paths_are_not_found() {
    let (_, driver) = driver();
    let path = Utf8Path::new("/never/written");

    let error = driver.get_content(path).await.unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);
    assert_eq!(error.path(), Some("/never/written"));

    let error = driver.reader(path, 0).await.err().unwrap();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);

    let error = driver.stat(path).await.unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);

    let error = driver.list(path).await.unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);
}

#[tokio::test]
async fn put_then_get_stat_and_list() {
    let (bucket, driver) = driver();
    put(&driver, "/a/b.txt", b"0123456789").await;

    let content = driver.get_content(Utf8Path::new("/a/b.txt")).await.unwrap();
    assert_eq!(&content[..], b"0123456789");

    let info = driver.stat(Utf8Path::new("/a/b.txt")).await.unwrap();
    assert!(!info.is_dir());
    assert_eq!(info.size(), Some(10));
    assert!(info.modified().is_some());

    let info = driver.stat(Utf8Path::new("/a")).await.unwrap();
    assert!(info.is_dir());
    assert_eq!(info.size(), None);

    assert_eq!(list(&driver, "/a").await, vec!["b.txt"]);
    assert_eq!(list(&driver, "/").await, vec!["a"]);

    // keys drop the leading slash
    assert!(bucket.get_object("a/b.txt").await.is_ok());
}

#[tokio::test]
async fn reader_streams_whole_object() {
    let (_, driver) = driver();
    put(&driver, "/blob", b"streamed content").await;

    for offset in [0, 3] {
        let mut reader = driver.reader(Utf8Path::new("/blob"), offset).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"streamed content");
    }
}

#[tokio::test]
async fn small_stream_uses_single_put() {
    let (bucket, driver) = driver();

    let written = write(&driver, "/small", b"0123456789").await;
    assert_eq!(written, 10);
    assert_eq!(bucket.pending_uploads().await, 0);

    let content = driver.get_content(Utf8Path::new("/small")).await.unwrap();
    assert_eq!(&content[..], b"0123456789");
}

#[tokio::test]
async fn empty_stream_stores_empty_object() {
    let (bucket, driver) = driver();

    assert_eq!(write(&driver, "/empty", b"").await, 0);
    assert_eq!(bucket.pending_uploads().await, 0);

    let info = driver.stat(Utf8Path::new("/empty")).await.unwrap();
    assert_eq!(info.size(), Some(0));
}

#[tokio::test]
async fn streams_round_trip_around_chunk_boundaries() {
    let (bucket, driver) = driver();

    for size in [
        DEFAULT_CHUNK_SIZE - 1,
        DEFAULT_CHUNK_SIZE,
        DEFAULT_CHUNK_SIZE + 1,
        6 << 20,
        2 * DEFAULT_CHUNK_SIZE,
    ] {
        let path = format!("/blobs/{size}");
        let data = payload(size);

        assert_eq!(write(&driver, &path, &data).await, size as u64);
        assert_eq!(bucket.pending_uploads().await, 0, "size {size}");

        let content = driver.get_content(Utf8Path::new(&path)).await.unwrap();
        assert_eq!(content.len(), size);
        assert!(content[..] == data[..], "content mismatch at size {size}");
    }
}

#[tokio::test]
async fn write_offset_is_ignored() {
    let (_, driver) = driver();
    let mut source: &[u8] = b"whole";
    let written = driver
        .write_stream(Utf8Path::new("/offset"), 42, &mut source)
        .await
        .unwrap();
    assert_eq!(written, 5);

    let content = driver.get_content(Utf8Path::new("/offset")).await.unwrap();
    assert_eq!(&content[..], b"whole");
}

#[tokio::test]
async fn list_files_before_directories_once() {
    let (_, driver) = driver();
    for path in ["/dir/other/c", "/dir/sub/a", "/dir/sub/b", "/dir/x", "/dir/y"] {
        put(&driver, path, b"").await;
    }

    assert_eq!(list(&driver, "/dir").await, vec!["x", "y", "other", "sub"]);
    assert_eq!(list(&driver, "/dir/sub").await, vec!["a", "b"]);
}

#[tokio::test]
async fn list_respects_segment_boundaries() {
    let (_, driver) = driver();
    put(&driver, "/a/b.txt", b"b").await;
    put(&driver, "/ab/c", b"c").await;

    assert_eq!(list(&driver, "/a").await, vec!["b.txt"]);
    assert_eq!(list(&driver, "/ab").await, vec!["c"]);
    assert_eq!(list(&driver, "/").await, vec!["a", "ab"]);
}

#[tokio::test]
async fn list_root() {
    let (_, driver) = driver();
    assert!(list(&driver, "/").await.is_empty());

    put(&driver, "/top", b"").await;
    put(&driver, "/nested/file", b"").await;
    assert_eq!(list(&driver, "/").await, vec!["top", "nested"]);
}

#[tokio::test]
async fn stat_respects_segment_boundaries() {
    let (_, driver) = driver();
    put(&driver, "/a/b.txt", b"b").await;
    put(&driver, "/a/b.txt.bak", b"backup").await;

    let info = driver.stat(Utf8Path::new("/a/b.txt")).await.unwrap();
    assert!(!info.is_dir());
    assert_eq!(info.size(), Some(1));

    put(&driver, "/only/child", b"").await;
    let info = driver.stat(Utf8Path::new("/only")).await.unwrap();
    assert!(info.is_dir());

    let error = driver.stat(Utf8Path::new("/a/b")).await.unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);
}

#[tokio::test]
async fn stat_with_several_objects_below_is_directory() {
    let (_, driver) = driver();
    put(&driver, "/d/x", b"x").await;
    put(&driver, "/d/y/z", b"z").await;

    let info = driver.stat(Utf8Path::new("/d")).await.unwrap();
    assert!(info.is_dir());
    assert_eq!(info.size(), None);
    assert_eq!(info.path(), "/d");

    let info = driver.stat(Utf8Path::new("/d/y")).await.unwrap();
    assert!(info.is_dir());
}

#[tokio::test]
async fn move_copies_then_deletes() {
    let (_, driver) = driver();
    put(&driver, "/uploads/tmp", b"layer").await;

    driver
        .move_path(Utf8Path::new("/uploads/tmp"), Utf8Path::new("/blobs/layer"))
        .await
        .unwrap();

    let content = driver.get_content(Utf8Path::new("/blobs/layer")).await.unwrap();
    assert_eq!(&content[..], b"layer");

    let error = driver
        .get_content(Utf8Path::new("/uploads/tmp"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);

    let error = driver
        .move_path(Utf8Path::new("/uploads/tmp"), Utf8Path::new("/blobs/other"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);
}

#[tokio::test]
async fn delete_removes_everything_below() {
    let (bucket, driver) = driver();
    for path in ["/repo/a", "/repo/b/c", "/repository"] {
        put(&driver, path, b"").await;
    }

    driver.delete(Utf8Path::new("/repo")).await.unwrap();

    let error = driver.stat(Utf8Path::new("/repo")).await.unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::NotFound);
    assert_eq!(bucket.len().await, 1);
    assert_eq!(list(&driver, "/").await, vec!["repository"]);

    // nothing left to delete
    driver.delete(Utf8Path::new("/repo")).await.unwrap();
}

#[tokio::test]
async fn url_for_is_unsupported() {
    let (_, driver) = driver();
    put(&driver, "/a/b.txt", b"b").await;

    for path in ["/a/b.txt", "/missing"] {
        let error = driver
            .url_for(Utf8Path::new(path), &Parameters::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::Unsupported);
    }
}

#[tokio::test]
async fn invalid_paths_are_rejected() {
    let (bucket, driver) = driver();

    for path in ["a//b", "/a/b/", "/a b"] {
        let error = driver
            .put_content(Utf8Path::new(path), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::InvalidPath, "{path}");
    }

    let error = driver.stat(Utf8Path::new("/")).await.unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::InvalidPath);
    assert!(bucket.is_empty().await);
}

#[tokio::test]
async fn root_directory_prefixes_keys() {
    init_tracing();
    let bucket = Arc::new(MemoryBucket::new("registry"));
    let driver = Checked::new(
        BosDriver::with_bucket(bucket.clone()).root_directory(Some("/docker/root/")),
    );

    put(&driver, "/a/b.txt", b"b").await;
    assert!(bucket.get_object("docker/root/a/b.txt").await.is_ok());

    assert_eq!(list(&driver, "/").await, vec!["a"]);
    assert_eq!(list(&driver, "/a").await, vec!["b.txt"]);
}

/// Fails every upload of one part number, otherwise delegates.
#[derive(Debug)]
struct FailingPart {
    inner: Arc<MemoryBucket>,
    part_number: i32,
    failed: AtomicBool,
}

#[async_trait::async_trait]
impl Bucket for FailingPart {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader, BucketError> {
        self.inner.get_object(key).await
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), BucketError> {
        self.inner.put_object(key, body).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, BucketError> {
        self.inner.list_objects(prefix).await
    }

    async fn copy_object(&self, source: &str, dest: &str) -> Result<(), BucketError> {
        self.inner.copy_object(source, dest).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
        self.inner.delete_object(key).await
    }

    async fn initiate_multipart_upload(&self, key: &str) -> Result<UploadId, BucketError> {
        self.inner.initiate_multipart_upload(key).await
    }

    async fn upload_part(
        &self,
        key: &str,
        upload: &UploadId,
        part_number: i32,
        body: Bytes,
    ) -> Result<PartInfo, BucketError> {
        if part_number == self.part_number {
            self.failed.store(true, Ordering::SeqCst);
            return Err(BucketError::service(std::io::Error::other("connection reset")));
        }
        self.inner.upload_part(key, upload, part_number, body).await
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
        parts: &[PartInfo],
    ) -> Result<(), BucketError> {
        self.inner.complete_multipart_upload(key, upload, parts).await
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
    ) -> Result<(), BucketError> {
        self.inner.abort_multipart_upload(key, upload).await
    }
}

#[tokio::test]
async fn failed_part_leaves_session_open() {
    init_tracing();
    let memory = Arc::new(MemoryBucket::new("registry"));
    let bucket = FailingPart {
        inner: memory.clone(),
        part_number: 2,
        failed: AtomicBool::new(false),
    };
    let driver = Checked::new(BosDriver::with_bucket(bucket));

    let data = payload(2 * DEFAULT_CHUNK_SIZE + 10);
    let mut source = &data[..];
    let error = driver
        .write_stream(Utf8Path::new("/blobs/big"), 0, &mut source)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), StorageErrorKind::Transport);
    assert!(error.is_retryable());
    assert_eq!(error.bucket(), Some("registry"));
    assert!(driver.inner().bucket().failed.load(Ordering::SeqCst));

    assert_eq!(memory.pending_uploads().await, 1);
    assert!(memory.is_empty().await);
}
