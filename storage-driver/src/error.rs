use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes storage errors by their meaning to the registry, independent
/// of the backend which produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// No object exists at the requested path.
    ///
    /// **Caller action:** treat the path as absent.
    NotFound,

    /// The path is not a valid registry storage path.
    ///
    /// **Caller action:** fix the path; the request never reached the backend.
    InvalidPath,

    /// The driver does not implement the requested capability.
    ///
    /// **Caller action:** fall back to another strategy (e.g. proxy the content
    /// instead of redirecting to a URL).
    Unsupported,

    /// The driver could not be constructed from its parameters.
    ///
    /// **Caller action:** fix the configuration.
    Configuration,

    /// The remote storage service failed the request.
    ///
    /// **Caller action:** inspect the source error. Drivers never retry.
    Transport,

    /// Reading a caller-provided stream, or a response body, failed.
    Io,
}

impl StorageErrorKind {
    /// Returns whether this error kind may succeed if the operation is repeated.
    ///
    /// This is advisory only, drivers themselves never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageErrorKind::Transport | StorageErrorKind::Io)
    }

    /// Returns whether this error was caused by the caller's request.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            StorageErrorKind::InvalidPath
                | StorageErrorKind::Unsupported
                | StorageErrorKind::Configuration
        )
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorKind::NotFound => write!(f, "not found"),
            StorageErrorKind::InvalidPath => write!(f, "invalid path"),
            StorageErrorKind::Unsupported => write!(f, "unsupported operation"),
            StorageErrorKind::Configuration => write!(f, "configuration error"),
            StorageErrorKind::Transport => write!(f, "transport error"),
            StorageErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

#[derive(Debug)]
struct ErrorTrace {
    /// Span context at the point where the error was created.
    span_trace: SpanTrace,
}

impl ErrorTrace {
    fn capture() -> Self {
        ErrorTrace {
            span_trace: SpanTrace::capture(),
        }
    }
}

/// An error returned by a storage driver.
///
/// Carries:
/// - the semantic [`StorageErrorKind`]
/// - the engine (driver name) which produced it
/// - optional bucket, path and context
/// - the underlying error as its `source`
/// - a `tracing_error::SpanTrace` of the spans active when it was built
///
/// # Example
///
/// ```rust
/// use storage_driver::{StorageError, StorageErrorKind};
///
/// let error = StorageError::builder(
///     "bos",
///     StorageErrorKind::NotFound,
///     std::io::Error::new(std::io::ErrorKind::NotFound, "no such key"),
/// )
/// .bucket("registry")
/// .path("/docker/registry/v2/blobs")
/// .build();
///
/// assert!(error.is_not_found());
/// ```
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,
    engine: &'static str,
    bucket: Option<String>,
    path: Option<String>,
    context: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
    traces: Box<ErrorTrace>,
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl StorageError {
    /// Create a new storage error with the minimum required information.
    ///
    /// For more context, use [`StorageError::builder`].
    pub fn new<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            kind,
            engine,
            bucket: None,
            path: None,
            context: None,
            source: error.into(),
            traces: Box::new(ErrorTrace::capture()),
        }
    }

    /// Create a builder for a storage error with bucket, path or context attached.
    pub fn builder<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> StorageErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        StorageErrorBuilder {
            engine,
            kind,
            source: error.into(),
            bucket: None,
            path: None,
            context: None,
        }
    }

    /// A `NotFound` error for `path`.
    pub fn not_found(engine: &'static str, path: impl Into<String>) -> Self {
        let path = path.into();
        StorageError::builder(
            engine,
            StorageErrorKind::NotFound,
            format!("Path not found: {path}"),
        )
        .path(path)
        .build()
    }

    /// An `Unsupported` error for the named operation.
    pub fn unsupported(engine: &'static str, operation: &'static str) -> Self {
        StorageError::builder(
            engine,
            StorageErrorKind::Unsupported,
            format!("{engine}: unsupported method"),
        )
        .context(operation)
        .build()
    }

    /// Returns the error kind.
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Returns whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }

    /// Returns the storage engine name.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Returns the bucket name, if available.
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Returns the path, if available.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns additional context, if available.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns whether this error is likely retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns the tracing span context captured when this error was created.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.traces.span_trace
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage error [{}] from {}", self.kind, self.engine)?;

        if let Some(bucket) = &self.bucket {
            write!(f, " (bucket: {})", bucket)?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }

        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }

        write!(f, ": {}", self.source)
    }
}

/// Builder for a [`StorageError`] with optional context fields.
#[derive(Debug)]
pub struct StorageErrorBuilder {
    kind: StorageErrorKind,
    engine: &'static str,
    source: Box<dyn StdError + Send + Sync + 'static>,
    bucket: Option<String>,
    path: Option<String>,
    context: Option<String>,
}

impl StorageErrorBuilder {
    /// Set the bucket name.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set the path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set additional context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build the `StorageError`.
    pub fn build(self) -> StorageError {
        StorageError {
            kind: self.kind,
            engine: self.engine,
            bucket: self.bucket,
            path: self.path,
            context: self.context,
            source: self.source,
            traces: Box::new(ErrorTrace::capture()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let error = StorageError::builder("bos", StorageErrorKind::Transport, "connection reset")
            .bucket("registry")
            .path("a/b.txt")
            .context("put object")
            .build();

        assert_eq!(
            error.to_string(),
            "Storage error [transport error] from bos (bucket: registry) (path: a/b.txt) (put object): connection reset"
        );
        assert!(error.is_retryable());
        assert!(!error.is_not_found());
    }

    #[test]
    fn not_found_records_path() {
        let error = StorageError::not_found("memory", "/missing");
        assert!(error.is_not_found());
        assert_eq!(error.path(), Some("/missing"));
        assert_eq!(error.engine(), "memory");
    }

    #[test]
    fn unsupported_is_client_fault() {
        let error = StorageError::unsupported("bos", "url_for");
        assert_eq!(error.kind(), StorageErrorKind::Unsupported);
        assert!(error.kind().is_client_fault());
        assert_eq!(error.context(), Some("url_for"));
    }

    #[test]
    fn span_trace_records_active_span() {
        use tracing_error::{ErrorLayer, SpanTraceStatus};
        use tracing_subscriber::layer::SubscriberExt as _;

        let subscriber = tracing_subscriber::registry().with(ErrorLayer::default());
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("stat", path = "/missing");
            let _entered = span.enter();

            let error = StorageError::not_found("bos", "/missing");
            assert_eq!(error.span_trace().status(), SpanTraceStatus::CAPTURED);
            assert!(error.span_trace().to_string().contains("stat"));
        });
    }
}
