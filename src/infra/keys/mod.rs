//! Backend credential resolution.
//!
//! [`KeyStore`] is the async trait for looking up a named secret.
//! [`EnvKeyStore`] reads process environment variables (after `.env` has been
//! loaded); [`StaticKeyStore`] serves a fixed map.
//! [`ProjectFile`] reads the project id persisted by a previous setup run.

mod config;

pub use config::ProjectFile;

use anyhow::Result;
use std::collections::HashMap;

/// Resolves a secret by name. `Ok(None)` means "not configured".
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>>;
}

/// Reads secrets from environment variables. Empty values count as unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvKeyStore;

#[async_trait::async_trait]
impl KeyStore for EnvKeyStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        match std::env::var(name) {
            Ok(v) if v.trim().is_empty() => Ok(None),
            Ok(v) => Ok(Some(v)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("environment variable {name}: {e}")),
        }
    }
}

/// Fixed name → value map.
#[derive(Debug, Default, Clone)]
pub struct StaticKeyStore {
    entries: HashMap<String, String>,
}

impl StaticKeyStore {
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }
}

#[async_trait::async_trait]
impl KeyStore for StaticKeyStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.entries.get(name).cloned())
    }
}

/// How requests to the backend are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Exchanged for a short-lived bearer token at connect time.
    RefreshToken(String),
    /// Sent as the `key` query parameter on every request.
    ApiKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticKeyStore::default().with("A", "1");
        assert_eq!(store.get("A").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.get("B").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_env_store_missing_var() {
        let value = EnvKeyStore
            .get("SAR_DROUGHT_TEST_DEFINITELY_UNSET_VARIABLE")
            .await
            .unwrap();
        assert_eq!(value, None);
    }
}
