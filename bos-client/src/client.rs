//! Bucket access through the S3-compatible API of the object-storage service.

use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Object};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::bucket::{Bucket, ObjectReader, ObjectSummary, PartInfo, UploadId};
use crate::credentials::Credentials;
use crate::errors::{classify, BucketError};

use super::BOS_DEFAULT_REGION;

/// Connection settings for a [`BosClient`].
#[derive(Debug, Clone)]
pub struct BosConfig {
    credentials: Credentials,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl BosConfig {
    /// Settings for `bucket` in the default region, at the region's endpoint.
    pub fn new(credentials: Credentials, bucket: impl Into<String>) -> Self {
        Self {
            credentials,
            bucket: bucket.into(),
            region: BOS_DEFAULT_REGION.to_owned(),
            endpoint: None,
        }
    }

    /// Set the region used to sign requests.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Override the service endpoint. An empty endpoint keeps the region's endpoint.
    pub fn endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint.filter(|endpoint| !endpoint.is_empty());
        self
    }

    /// The endpoint requests are sent to, `https://s3.{region}.bcebos.com`
    /// unless overridden.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://s3.{}.bcebos.com", self.region),
        }
    }
}

/// Characters escaped in the key of a copy source. Keeps `/` and the
/// unreserved set.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE))
}

/// A [`Bucket`] backed by the remote object-storage service.
#[derive(Debug, Clone)]
pub struct BosClient {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl BosClient {
    /// Build a client. No requests are made until the first operation.
    pub fn new(config: BosConfig) -> Self {
        let endpoint = config.endpoint_url();
        let builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(aws_sdk_s3::config::Credentials::from(&config.credentials))
            .endpoint_url(&endpoint)
            .force_path_style(true);

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            %endpoint,
            "Connected"
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket,
        }
    }
}

fn summary(object: &Object) -> Option<ObjectSummary> {
    let key = object.key()?;
    let size = object
        .size()
        .and_then(|size| u64::try_from(size).ok())
        .unwrap_or_default();
    let last_modified = object
        .last_modified()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos()));
    Some(ObjectSummary::new(key, size, last_modified))
}

#[async_trait::async_trait]
impl Bucket for BosClient {
    fn name(&self) -> &str {
        &self.bucket
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get_object(&self, key: &str) -> Result<ObjectReader, BucketError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(key, err))?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    #[tracing::instrument(skip(self, body), fields(bucket = %self.bucket, size = body.len()))]
    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), BucketError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| classify(key, err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, BucketError> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(BucketError::service)?;

            objects.extend(output.contents().iter().filter_map(summary));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or_default() => {
                    continuation_token = Some(token.to_owned());
                }
                _ => break,
            }
        }

        tracing::trace!(count = objects.len(), "listed objects");
        Ok(objects)
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn copy_object(&self, source: &str, dest: &str) -> Result<(), BucketError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(dest)
            .copy_source(copy_source(&self.bucket, source))
            .send()
            .await
            .map_err(|err| classify(source, err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(key, err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn initiate_multipart_upload(&self, key: &str) -> Result<UploadId, BucketError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(key, err))?;

        let upload = output
            .upload_id()
            .map(UploadId::from)
            .ok_or(BucketError::MissingField("UploadId"))?;
        tracing::debug!(%upload, "initiated multipart upload");
        Ok(upload)
    }

    #[tracing::instrument(skip(self, body), fields(bucket = %self.bucket, size = body.len()))]
    async fn upload_part(
        &self,
        key: &str,
        upload: &UploadId,
        part_number: i32,
        body: Bytes,
    ) -> Result<PartInfo, BucketError> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload.as_str())
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| classify(upload.as_str(), err))?;

        let etag = output.e_tag().ok_or(BucketError::MissingField("ETag"))?;
        Ok(PartInfo::new(part_number, etag))
    }

    #[tracing::instrument(skip(self, parts), fields(bucket = %self.bucket, parts = parts.len()))]
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
        parts: &[PartInfo],
    ) -> Result<(), BucketError> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        CompletedPart::builder()
                            .part_number(part.part_number())
                            .e_tag(part.etag())
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload.as_str())
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|err| classify(upload.as_str(), err))?;

        tracing::debug!(%upload, "completed multipart upload");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload: &UploadId,
    ) -> Result<(), BucketError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload.as_str())
            .send()
            .await
            .map_err(|err| classify(upload.as_str(), err))?;

        tracing::debug!(%upload, "aborted multipart upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_follows_region() {
        let config = BosConfig::new(Credentials::new("ak", "sk"), "registry");
        assert_eq!(config.region, BOS_DEFAULT_REGION);
        assert_eq!(config.endpoint_url(), "https://s3.bj.bcebos.com");

        let config = config.region("gz");
        assert_eq!(config.endpoint_url(), "https://s3.gz.bcebos.com");
    }

    #[test]
    fn empty_endpoint_uses_default() {
        let config = BosConfig::new(Credentials::new("ak", "sk"), "registry")
            .endpoint(Some(String::new()));
        assert!(config.endpoint.is_none());
        assert_eq!(config.endpoint_url(), "https://s3.bj.bcebos.com");

        let config = config.endpoint(Some("https://bj.bcebos.com".into()));
        assert_eq!(config.endpoint_url(), "https://bj.bcebos.com");
    }

    #[test]
    fn copy_source_escapes_key() {
        assert_eq!(
            copy_source("registry", "docker/registry/v2/blobs/data"),
            "registry/docker/registry/v2/blobs/data"
        );
        assert_eq!(
            copy_source("registry", "a b/c+d?.txt"),
            "registry/a%20b/c%2Bd%3F.txt"
        );
    }

    #[test]
    fn summary_requires_a_key() {
        let object = Object::builder().size(10).build();
        assert!(summary(&object).is_none());

        let object = Object::builder().key("a/b.txt").size(10).build();
        let summary = summary(&object).unwrap();
        assert_eq!(summary.key(), "a/b.txt");
        assert_eq!(summary.size(), 10);
        assert_eq!(summary.last_modified(), None);
    }

    #[tokio::test]
    async fn client_reports_bucket_name() {
        let client = BosClient::new(BosConfig::new(Credentials::new("ak", "sk"), "registry"));
        assert_eq!(client.name(), "registry");
    }
}
