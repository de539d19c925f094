//! Client for the object-storage buckets backing the `bos` storage driver.
//!
//! [`Bucket`] is the set of primitives the driver needs. [`BosClient`]
//! implements them against the service's S3-compatible API, and
//! [`MemoryBucket`] implements them in memory.

mod bucket;
mod client;
mod credentials;
mod errors;
mod memory;

/// Region used to sign requests when none is configured.
const BOS_DEFAULT_REGION: &str = "bj";

/// Provider name attached to static credentials.
const BOS_CREDENTIALS_PROVIDER: &str = "bos";

/// The smallest part the service accepts, except for the last part of an upload.
pub const MIN_PART_SIZE: usize = 5 << 20;

/// The largest part number the service accepts.
pub const MAX_PART_NUMBER: i32 = 10_000;

pub use crate::bucket::{Bucket, ObjectReader, ObjectSummary, PartInfo, UploadId};
pub use crate::client::{BosClient, BosConfig};
pub use crate::credentials::{Credentials, Secret};
pub use crate::errors::BucketError;
pub use crate::memory::MemoryBucket;
