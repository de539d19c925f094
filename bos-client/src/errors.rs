use std::error::Error as StdError;

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// An error returned by a bucket primitive.
#[derive(Debug, Error)]
pub enum BucketError {
    /// No object is stored at the key.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// The multipart upload does not exist, or was already completed or aborted.
    #[error("no such upload: {0}")]
    NoSuchUpload(String),

    /// A multipart upload part was rejected.
    #[error("invalid part: {0}")]
    InvalidPart(String),

    /// The service response was missing a required field.
    #[error("response missing {0}")]
    MissingField(&'static str),

    /// An io error occurred while reading a response body.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure reported by the service or the transport.
    #[error("service: {message}")]
    Service {
        /// The full error report, including the error's sources.
        message: String,

        /// The underlying SDK error.
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl BucketError {
    /// Wrap an opaque service or transport error.
    pub fn service<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        BucketError::Service {
            message: DisplayErrorContext(&error).to_string(),
            source: Box::new(error),
        }
    }

    /// Whether this error indicates that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BucketError::NoSuchKey(_))
    }
}

/// Classify an SDK error using the error code from the service response.
///
/// `subject` names the key (or upload) the request was about.
pub(crate) fn classify<E>(subject: &str, error: SdkError<E>) -> BucketError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
{
    match error.code() {
        Some("NoSuchKey") => BucketError::NoSuchKey(subject.to_owned()),
        Some("NoSuchUpload") => BucketError::NoSuchUpload(subject.to_owned()),
        _ => BucketError::service(error),
    }
}
