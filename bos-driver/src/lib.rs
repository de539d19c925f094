//! # BOS storage driver
//!
//! A [`StorageDriver`](storage_driver::StorageDriver) which keeps registry
//! content in a Baidu Object Storage bucket. Registry paths map directly to
//! object keys and directories are reconstructed from prefix listings.
//!
//! ```no_run
//! # fn main() -> Result<(), storage_driver::StorageError> {
//! use storage_driver::{DriverRegistry, Parameters};
//!
//! let mut registry = DriverRegistry::new();
//! bos_driver::register(&mut registry)?;
//!
//! let parameters = Parameters::new()
//!     .with("accesskeyid", "ak")
//!     .with("accesskeysecret", "sk")
//!     .with("bucket", "registry");
//! let driver = registry.create("bos", &parameters)?;
//! # let _ = driver;
//! # Ok(())
//! # }
//! ```

mod driver;
mod factory;
pub mod paths;

/// The name the driver is registered under.
pub const BOS_DRIVER_NAME: &str = "bos";

/// Part size for streamed writes when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = bos_client::MIN_PART_SIZE;

pub use crate::driver::BosDriver;
pub use crate::factory::{register, BosDriverFactory, DriverParameters};
