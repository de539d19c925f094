use std::{borrow::Cow, env::VarError, fmt, ops::Deref};

use zeroize::Zeroize;

const ACCESS_KEY_ID_ENV: &str = "ACCESS_KEY_ID";
const SECRET_ACCESS_KEY_ENV: &str = "SECRET_ACCESS_KEY";

/// A credential value.
///
/// The value never appears in `Debug` output and is zeroed when dropped.
/// Use [Secret::revealed] to get the underlying value.
#[derive(Clone)]
pub struct Secret(Cow<'static, str>);

impl Secret {
    /// Read a secret from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, VarError> {
        let value = std::env::var(var)?;
        Ok(Secret(value.into()))
    }

    /// Expose the underlying value.
    pub fn revealed(&self) -> &str {
        self.0.deref()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        if let Cow::Owned(ref mut s) = self.0 {
            s.zeroize()
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value.into())
    }
}

impl From<&'static str> for Secret {
    fn from(value: &'static str) -> Self {
        Secret(value.into())
    }
}

/// An access key pair for the object-storage account.
#[derive(Debug, Clone)]
pub struct Credentials {
    access_key_id: Secret,
    secret_access_key: Secret,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(access_key_id: impl Into<Secret>, secret_access_key: impl Into<Secret>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Load the credentials from `ACCESS_KEY_ID` and `SECRET_ACCESS_KEY`.
    pub fn from_env() -> Result<Self, VarError> {
        let access_key_id = Secret::from_env(ACCESS_KEY_ID_ENV)?;
        let secret_access_key = Secret::from_env(SECRET_ACCESS_KEY_ENV)?;
        Ok(Credentials::new(access_key_id, secret_access_key))
    }

    /// The access key id, the less secret part of the pair.
    pub fn access_key_id(&self) -> &Secret {
        &self.access_key_id
    }

    /// The secret access key.
    pub fn secret_access_key(&self) -> &Secret {
        &self.secret_access_key
    }
}

impl From<&Credentials> for aws_sdk_s3::config::Credentials {
    fn from(value: &Credentials) -> Self {
        aws_sdk_s3::config::Credentials::new(
            value.access_key_id.revealed(),
            value.secret_access_key.revealed(),
            None,
            None,
            crate::BOS_CREDENTIALS_PROVIDER,
        )
    }
}
