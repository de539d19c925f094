//! Construction of drivers by name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use eyre::eyre;

use crate::driver::StorageDriver;
use crate::error::{StorageError, StorageErrorKind};
use crate::parameters::Parameters;

const REGISTRY_ENGINE: &str = "registry";

/// A shared, dynamically dispatched driver.
pub type ArcDriver = Arc<dyn StorageDriver>;

/// Constructs a driver from its parameters.
pub trait DriverFactory: fmt::Debug + Send + Sync {
    /// Create a new driver.
    fn create(&self, parameters: &Parameters) -> Result<ArcDriver, StorageError>;
}

/// A set of named driver factories.
///
/// Build one at startup, register every available backend, and pass it to
/// whatever reads the storage configuration.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, Box<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    ///
    /// Each name may only be registered once.
    pub fn register<F>(&mut self, name: &'static str, factory: F) -> Result<(), StorageError>
    where
        F: DriverFactory + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(StorageError::builder(
                REGISTRY_ENGINE,
                StorageErrorKind::Configuration,
                eyre!("Driver already registered: {name}"),
            )
            .context(name)
            .build());
        }

        tracing::debug!(driver = name, "Registered storage driver");
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Create a driver using the factory registered under `name`.
    #[tracing::instrument(skip(self, parameters))]
    pub fn create(&self, name: &str, parameters: &Parameters) -> Result<ArcDriver, StorageError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            StorageError::builder(
                REGISTRY_ENGINE,
                StorageErrorKind::Configuration,
                eyre!("StorageDriver not registered: {name}"),
            )
            .context(name.to_owned())
            .build()
        })?;

        factory.create(parameters)
    }

    /// The names of all registered drivers, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Whether a driver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use camino::Utf8Path;
    use http::Uri;

    use crate::driver::{FileInfo, ReadStream, Reader};

    use super::*;

    #[derive(Debug)]
    struct Unavailable;

    #[async_trait::async_trait]
    impl StorageDriver for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        async fn get_content(&self, path: &Utf8Path) -> Result<Bytes, StorageError> {
            Err(StorageError::not_found(self.name(), path.as_str()))
        }

        async fn put_content(&self, _: &Utf8Path, _: Bytes) -> Result<(), StorageError> {
            Err(StorageError::unsupported(self.name(), "put_content"))
        }

        async fn reader(&self, path: &Utf8Path, _: u64) -> Result<ReadStream, StorageError> {
            Err(StorageError::not_found(self.name(), path.as_str()))
        }

        async fn write_stream(
            &self,
            _: &Utf8Path,
            _: u64,
            _: &mut Reader<'_>,
        ) -> Result<u64, StorageError> {
            Err(StorageError::unsupported(self.name(), "write_stream"))
        }

        async fn stat(&self, path: &Utf8Path) -> Result<FileInfo, StorageError> {
            Err(StorageError::not_found(self.name(), path.as_str()))
        }

        async fn list(&self, _: &Utf8Path) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }

        async fn move_path(&self, source: &Utf8Path, _: &Utf8Path) -> Result<(), StorageError> {
            Err(StorageError::not_found(self.name(), source.as_str()))
        }

        async fn delete(&self, _: &Utf8Path) -> Result<(), StorageError> {
            Ok(())
        }

        async fn url_for(&self, _: &Utf8Path, _: &Parameters) -> Result<Uri, StorageError> {
            Err(StorageError::unsupported(self.name(), "url_for"))
        }
    }

    #[derive(Debug)]
    struct UnavailableFactory;

    impl DriverFactory for UnavailableFactory {
        fn create(&self, _: &Parameters) -> Result<ArcDriver, StorageError> {
            Ok(Arc::new(Unavailable))
        }
    }

    #[test]
    fn create_registered_driver() {
        let mut registry = DriverRegistry::new();
        registry.register("unavailable", UnavailableFactory).unwrap();

        let driver = registry
            .create("unavailable", &Parameters::new())
            .unwrap();
        assert_eq!(driver.name(), "unavailable");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["unavailable"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = DriverRegistry::new();
        registry.register("unavailable", UnavailableFactory).unwrap();

        let error = registry
            .register("unavailable", UnavailableFactory)
            .unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::Configuration);
    }

    #[test]
    fn unknown_driver_is_a_configuration_error() {
        let registry = DriverRegistry::new();
        let error = registry.create("bos", &Parameters::new()).unwrap_err();

        assert_eq!(error.kind(), StorageErrorKind::Configuration);
        assert!(error.to_string().contains("StorageDriver not registered: bos"));
        assert!(!registry.contains("bos"));
    }
}
