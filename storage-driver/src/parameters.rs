//! Named driver parameters, as provided by the registry configuration.

use eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageErrorKind};

/// A mapping of parameter names to values used to construct a driver.
///
/// Values are arbitrary configuration scalars. Drivers usually read them as
/// text via [`Parameters::get`], which formats numbers and booleans the way
/// they were written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, returning the parameters for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a parameter as text.
    ///
    /// Returns `None` when the parameter is absent or null. Arrays and
    /// objects are rendered as JSON.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Get a parameter as text, treating an empty value as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Get a required parameter, failing with a configuration error that
    /// names the parameter when it is missing or empty.
    pub fn require(&self, engine: &'static str, key: &str) -> Result<String, StorageError> {
        self.get_non_empty(key).ok_or_else(|| {
            StorageError::builder(
                engine,
                StorageErrorKind::Configuration,
                eyre!("No {key} parameter provided"),
            )
            .context(key.to_owned())
            .build()
        })
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_are_read_as_text() {
        let parameters = Parameters::new()
            .with("bucket", "registry")
            .with("chunksize", 5242880)
            .with("secure", true)
            .with("endpoint", Value::Null);

        assert_eq!(parameters.get("bucket").as_deref(), Some("registry"));
        assert_eq!(parameters.get("chunksize").as_deref(), Some("5242880"));
        assert_eq!(parameters.get("secure").as_deref(), Some("true"));
        assert_eq!(parameters.get("endpoint"), None);
        assert_eq!(parameters.get("missing"), None);
    }

    #[test]
    fn require_names_the_missing_parameter() {
        let parameters = Parameters::new().with("bucket", "");

        let error = parameters.require("bos", "bucket").unwrap_err();
        assert_eq!(error.kind(), StorageErrorKind::Configuration);
        assert!(error.to_string().contains("No bucket parameter provided"));

        let error = parameters.require("bos", "accesskeyid").unwrap_err();
        assert!(error.to_string().contains("No accesskeyid parameter provided"));
    }

    #[test]
    fn deserialize_from_map() {
        let parameters: Parameters = serde_json::from_value(json!({
            "bucket": "registry",
            "endpoint": "bj.bcebos.com",
        }))
        .unwrap();

        assert_eq!(parameters.get("endpoint").as_deref(), Some("bj.bcebos.com"));
        assert!(!parameters.is_empty());
    }
}
