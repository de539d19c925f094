//! # Storage drivers
//!
//! The contract between a container registry and the backends which store its
//! content, plus the pieces every backend shares: errors, parameters, path
//! validation and a registry of named driver factories.

mod base;
mod driver;
mod error;
mod factory;
mod parameters;

pub use base::{is_root, is_valid, Checked};
pub use driver::{FileInfo, ReadStream, Reader, StorageDriver};
pub use error::{StorageError, StorageErrorBuilder, StorageErrorKind};
pub use factory::{ArcDriver, DriverFactory, DriverRegistry};
pub use parameters::Parameters;
