//! Engine configuration from the environment.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `SAR_BACKEND_URL` | Compute gateway base URL; unset disables the real-data path |
//! | `SAR_BACKEND_PROJECT` | Project id |
//! | `SAR_BACKEND_PROJECT_FILE` | File holding the project id (default `.backend_project`) |
//! | `SAR_BACKEND_REFRESH_TOKEN` | Exchanged for a bearer token |
//! | `SAR_BACKEND_API_KEY` | Sent as `key` query parameter when no refresh token is set |
//! | `SAR_BACKEND_TOKEN_URL` | Token exchange endpoint (default `<base>/v1/tokens`) |
//! | `SAR_BACKEND_TIMEOUT_SECS` | Budget for one real-data attempt (default 60) |
//! | `SAR_BASELINES_CSV` | Optional historical baseline table |

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::infra::keys::{Credentials, EnvKeyStore, KeyStore, ProjectFile};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PROJECT_FILE: &str = ".backend_project";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub project: String,
    pub token_url: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `None` when the real-data path is not configured.
    pub backend: Option<BackendConfig>,
    pub timeout: Duration,
    pub baselines_csv: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            baselines_csv: None,
        }
    }
}

impl EngineConfig {
    pub async fn from_env() -> Result<Self> {
        Self::load(&EnvKeyStore).await
    }

    /// Reads every setting through `store`. A partially configured backend
    /// (URL without project or credentials) is logged and disabled.
    pub async fn load(store: &dyn KeyStore) -> Result<Self> {
        let timeout_secs = match store.get("SAR_BACKEND_TIMEOUT_SECS").await? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("SAR_BACKEND_TIMEOUT_SECS is not a number: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let baselines_csv = store.get("SAR_BASELINES_CSV").await?.map(PathBuf::from);
        let backend = load_backend(store).await?;

        info!(
            backend_configured = backend.is_some(),
            timeout_secs,
            historical_baselines = baselines_csv.is_some(),
            "Engine configuration loaded"
        );

        Ok(Self {
            backend,
            timeout: Duration::from_secs(timeout_secs),
            baselines_csv,
        })
    }
}

async fn load_backend(store: &dyn KeyStore) -> Result<Option<BackendConfig>> {
    let Some(base_url) = store.get("SAR_BACKEND_URL").await? else {
        debug!("SAR_BACKEND_URL not set, real-data path disabled");
        return Ok(None);
    };
    let base_url = base_url.trim_end_matches('/').to_string();

    let Some(project) = resolve_project(store).await? else {
        warn!("Backend URL set but no project id found, real-data path disabled");
        return Ok(None);
    };

    let credentials = if let Some(token) = store.get("SAR_BACKEND_REFRESH_TOKEN").await? {
        Credentials::RefreshToken(token)
    } else if let Some(key) = store.get("SAR_BACKEND_API_KEY").await? {
        Credentials::ApiKey(key)
    } else {
        warn!("Backend URL set but no credentials found, real-data path disabled");
        return Ok(None);
    };

    let token_url = store
        .get("SAR_BACKEND_TOKEN_URL")
        .await?
        .unwrap_or_else(|| format!("{base_url}/v1/tokens"));

    Ok(Some(BackendConfig {
        base_url,
        project,
        token_url,
        credentials,
    }))
}

/// Explicit `SAR_BACKEND_PROJECT`, else the project file.
async fn resolve_project(store: &dyn KeyStore) -> Result<Option<String>> {
    if let Some(project) = store.get("SAR_BACKEND_PROJECT").await? {
        return Ok(Some(project.trim().to_string()));
    }

    let path = store
        .get("SAR_BACKEND_PROJECT_FILE")
        .await?
        .unwrap_or_else(|| DEFAULT_PROJECT_FILE.to_string());

    match ProjectFile::load(&path) {
        Ok(file) => Ok(Some(file.into_project())),
        Err(e) => {
            debug!(path = %path, error = %e, "No usable project file");
            Ok(None)
        }
    }
}
