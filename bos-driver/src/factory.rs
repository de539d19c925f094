//! Construction of the driver from registry configuration.

use std::sync::Arc;

use eyre::{eyre, WrapErr as _};

use bos_client::{BosClient, BosConfig, Credentials, MIN_PART_SIZE};
use storage_driver::{
    ArcDriver, Checked, DriverFactory, DriverRegistry, Parameters, StorageError, StorageErrorKind,
};

use crate::driver::BosDriver;
use crate::{BOS_DRIVER_NAME, DEFAULT_CHUNK_SIZE};

const BUCKET_NAME_ENV: &str = "BUCKET_NAME";
const ENDPOINT_ENV: &str = "ENDPOINT";

fn configuration_error(error: eyre::Report, key: &str) -> StorageError {
    StorageError::builder(BOS_DRIVER_NAME, StorageErrorKind::Configuration, error)
        .context(key.to_owned())
        .build()
}

/// Settings for a [`BosDriver`].
#[derive(Debug, Clone)]
pub struct DriverParameters {
    credentials: Credentials,
    bucket: String,
    endpoint: Option<String>,
    region: Option<String>,
    root_directory: Option<String>,
    chunk_size: usize,
}

impl DriverParameters {
    /// Settings for `bucket` with every optional setting at its default.
    pub fn new(credentials: Credentials, bucket: impl Into<String>) -> Self {
        Self {
            credentials,
            bucket: bucket.into(),
            endpoint: None,
            region: None,
            root_directory: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Read the settings from registry configuration.
    ///
    /// `accesskeyid`, `accesskeysecret` and `bucket` are required. `endpoint`,
    /// `region`, `rootdirectory` and `chunksize` are optional.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, StorageError> {
        let access_key_id = parameters.require(BOS_DRIVER_NAME, "accesskeyid")?;
        let secret_access_key = parameters.require(BOS_DRIVER_NAME, "accesskeysecret")?;
        let bucket = parameters.require(BOS_DRIVER_NAME, "bucket")?;

        let chunk_size = match parameters.get_non_empty("chunksize") {
            Some(value) => parse_chunk_size(&value)?,
            None => DEFAULT_CHUNK_SIZE,
        };

        Ok(Self {
            credentials: Credentials::new(access_key_id, secret_access_key),
            bucket,
            endpoint: parameters.get_non_empty("endpoint"),
            region: parameters.get_non_empty("region"),
            root_directory: parameters.get_non_empty("rootdirectory"),
            chunk_size,
        })
    }

    /// Read the settings from `ACCESS_KEY_ID`, `SECRET_ACCESS_KEY`,
    /// `BUCKET_NAME` and the optional `ENDPOINT`.
    pub fn from_env() -> Result<Self, StorageError> {
        let credentials = Credentials::from_env()
            .wrap_err("ACCESS_KEY_ID and SECRET_ACCESS_KEY must be set")
            .map_err(|error| configuration_error(error, "accesskeyid"))?;
        let bucket = std::env::var(BUCKET_NAME_ENV)
            .wrap_err_with(|| format!("{BUCKET_NAME_ENV} must be set"))
            .map_err(|error| configuration_error(error, "bucket"))?;
        let endpoint = std::env::var(ENDPOINT_ENV).ok();

        Ok(Self::new(credentials, bucket).endpoint(endpoint))
    }

    /// Override the service endpoint. An empty endpoint keeps the region's endpoint.
    pub fn endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint.filter(|endpoint| !endpoint.is_empty());
        self
    }

    /// Set the signing region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Store content below `root` in the bucket.
    pub fn root_directory(mut self, root: impl Into<String>) -> Self {
        self.root_directory = Some(root.into());
        self
    }

    /// Set the part size for streamed writes.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// The bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn config(&self) -> BosConfig {
        let config = BosConfig::new(self.credentials.clone(), self.bucket.clone())
            .endpoint(self.endpoint.clone());
        match &self.region {
            Some(region) => config.region(region.clone()),
            None => config,
        }
    }
}

fn parse_chunk_size(value: &str) -> Result<usize, StorageError> {
    let chunk_size: usize = value
        .parse()
        .wrap_err_with(|| format!("chunksize parameter must be an integer, got {value:?}"))
        .map_err(|error| configuration_error(error, "chunksize"))?;

    if chunk_size < MIN_PART_SIZE {
        return Err(configuration_error(
            eyre!("chunksize {chunk_size} must be at least {MIN_PART_SIZE}"),
            "chunksize",
        ));
    }

    Ok(chunk_size)
}

impl BosDriver<BosClient> {
    /// Connect a driver to the configured bucket.
    pub fn new(parameters: DriverParameters) -> Self {
        let client = BosClient::new(parameters.config());
        BosDriver::with_bucket(client)
            .root_directory(parameters.root_directory.as_deref())
            .chunk_size(parameters.chunk_size)
    }

    /// Connect a driver using registry configuration.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, StorageError> {
        DriverParameters::from_parameters(parameters).map(BosDriver::new)
    }
}

/// Creates [`BosDriver`]s, with path validation applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct BosDriverFactory;

impl DriverFactory for BosDriverFactory {
    fn create(&self, parameters: &Parameters) -> Result<ArcDriver, StorageError> {
        let driver = BosDriver::from_parameters(parameters)?;
        Ok(Arc::new(Checked::new(driver)))
    }
}

/// Register the driver under the name `bos`.
pub fn register(registry: &mut DriverRegistry) -> Result<(), StorageError> {
    registry.register(BOS_DRIVER_NAME, BosDriverFactory)
}
