//! Real-data-first estimation with a deterministic fallback.
//!
//! Each call tries the remote estimator once (when a backend is configured)
//! under a timeout, and falls back to the synthetic estimator on any error,
//! timeout, or non-REALTIME result. Nothing is carried between calls.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::baselines::{BaselineProvider, HistoricalBaselines};
use crate::config::{DEFAULT_TIMEOUT_SECS, EngineConfig};
use crate::error::EstimationError;
use crate::estimate::DroughtEstimate;
use crate::geometry::Polygon;
use crate::infra::compute::ComputeClient;
use crate::parser::{AnalysisMode, AnalysisRequest, DateWindow};
use crate::remote_sensing::{RemoteOutcome, RemoteSensingEstimator};
use crate::services::geospatial_api::GeospatialBackend;
use crate::synthetic::SyntheticEstimator;
use crate::vegetation::{OpticalEstimator, OpticalIndex, VegetationEstimate, synthetic_vegetation};

#[derive(Clone)]
pub struct EstimationOrchestrator {
    backend: Option<Arc<dyn GeospatialBackend>>,
    baselines: Option<Arc<dyn BaselineProvider>>,
    timeout: Duration,
}

impl EstimationOrchestrator {
    pub fn new(backend: Option<Arc<dyn GeospatialBackend>>, timeout: Duration) -> Self {
        Self {
            backend,
            baselines: None,
            timeout,
        }
    }

    /// Synthetic-only orchestrator.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_baselines(mut self, baselines: Arc<dyn BaselineProvider>) -> Self {
        self.baselines = Some(baselines);
        self
    }

    /// Connects the configured backend and loads historical baselines.
    /// Either failing is logged and leaves that piece disabled.
    pub async fn from_config(config: &EngineConfig) -> Self {
        let backend: Option<Arc<dyn GeospatialBackend>> = match &config.backend {
            Some(backend_config) => match ComputeClient::connect(backend_config, config.timeout).await {
                Ok(client) => Some(Arc::new(client) as Arc<dyn GeospatialBackend>),
                Err(e) => {
                    let e = EstimationError::BackendUnavailable(format!("{e:#}"));
                    warn!(error = %e, "Continuing with synthetic estimates only");
                    None
                }
            },
            None => None,
        };

        let mut orchestrator = Self::new(backend, config.timeout);
        if let Some(path) = &config.baselines_csv {
            match HistoricalBaselines::load(path) {
                Ok(store) => orchestrator = orchestrator.with_baselines(Arc::new(store)),
                Err(e) => warn!(path = %path.display(), error = %e, "Historical baselines unavailable"),
            }
        }
        orchestrator
    }

    pub fn is_backend_ready(&self) -> bool {
        self.backend.is_some()
    }

    fn synthetic(&self) -> SyntheticEstimator {
        match &self.baselines {
            Some(b) => SyntheticEstimator::with_baselines(b.clone()),
            None => SyntheticEstimator::new(),
        }
    }

    pub async fn estimate_request(&self, request: &AnalysisRequest) -> DroughtEstimate {
        self.estimate(&request.polygon, &request.date_window, &request.mode)
            .await
    }

    /// Always returns a complete estimate: REALTIME when the backend
    /// delivered one, SIMULATED otherwise.
    #[tracing::instrument(skip_all, fields(start = %date_window.start, polarization = %mode.polarization))]
    pub async fn estimate(
        &self,
        polygon: &Polygon,
        date_window: &DateWindow,
        mode: &AnalysisMode,
    ) -> DroughtEstimate {
        if let Some(estimate) = self.attempt_remote(polygon, date_window, mode).await {
            info!(severity = %estimate.severity, scene_count = estimate.scene_count, "Real-data estimate");
            return estimate;
        }

        let estimate = self.synthetic().estimate(polygon, date_window, mode);
        info!(severity = %estimate.severity, "Synthetic estimate");
        estimate
    }

    async fn attempt_remote(
        &self,
        polygon: &Polygon,
        date_window: &DateWindow,
        mode: &AnalysisMode,
    ) -> Option<DroughtEstimate> {
        let Some(backend) = &self.backend else {
            debug!("Backend not configured");
            return None;
        };

        let mut remote = RemoteSensingEstimator::new(backend.clone());
        if let Some(b) = &self.baselines {
            remote = remote.with_baselines(b.clone());
        }

        let attempt = tokio::time::timeout(self.timeout, remote.estimate(polygon, date_window, mode));
        match attempt.await {
            Err(_) => {
                let e = EstimationError::Timeout(self.timeout.as_secs());
                warn!(error = %e, "Falling back to synthetic estimate");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Falling back to synthetic estimate");
                None
            }
            Ok(Ok(RemoteOutcome::Complete(estimate))) if estimate.is_realtime() => Some(estimate),
            Ok(Ok(outcome)) => {
                info!(quality_flag = %outcome.quality_flag(), "No real-data result, falling back");
                None
            }
        }
    }

    /// Optical index with the same fallback chain as [`Self::estimate`].
    #[tracing::instrument(skip_all, fields(index = %index))]
    pub async fn estimate_vegetation(
        &self,
        polygon: &Polygon,
        date_window: &DateWindow,
        index: OpticalIndex,
    ) -> VegetationEstimate {
        if let Some(backend) = &self.backend {
            let optical = OpticalEstimator::new(backend.clone());
            let attempt =
                tokio::time::timeout(self.timeout, optical.estimate(polygon, date_window, index));
            match attempt.await {
                Ok(Ok(RemoteOutcome::Complete(estimate))) => return estimate,
                Ok(Ok(RemoteOutcome::Unavailable { quality_flag, reason, .. })) => {
                    info!(%quality_flag, reason = %reason, "No optical result, falling back");
                }
                Ok(Err(e)) => warn!(error = %e, "Optical estimate failed, falling back"),
                Err(_) => {
                    let e = EstimationError::Timeout(self.timeout.as_secs());
                    warn!(error = %e, "Optical estimate timed out, falling back");
                }
            }
        }

        synthetic_vegetation(polygon, date_window, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::QualityFlag;

    #[tokio::test]
    async fn test_offline_orchestrator_is_synthetic() {
        let orchestrator = EstimationOrchestrator::offline();
        assert!(!orchestrator.is_backend_ready());

        let polygon = Polygon::rectangle(-5.6, 37.9, -5.4, 38.1);
        let window = DateWindow::new("2023-07-01", "2023-07-31");
        let est = orchestrator
            .estimate(&polygon, &window, &AnalysisMode::default())
            .await;
        assert_eq!(est.quality_flag, QualityFlag::Simulated);
        assert_eq!(
            est,
            SyntheticEstimator::new().estimate(&polygon, &window, &AnalysisMode::default())
        );
    }

    #[tokio::test]
    async fn test_from_default_config() {
        let orchestrator = EstimationOrchestrator::from_config(&EngineConfig::default()).await;
        assert!(!orchestrator.is_backend_ready());
    }

    #[tokio::test]
    async fn test_offline_vegetation() {
        let polygon = Polygon::rectangle(14.9, 48.9, 15.1, 49.1);
        let window = DateWindow::new("2023-07-01", "2023-07-31");
        let v = EstimationOrchestrator::offline()
            .estimate_vegetation(&polygon, &window, OpticalIndex::Ndwi)
            .await;
        assert_eq!(v.quality_flag, QualityFlag::Simulated);
        assert!(v.water_percentage.is_some());
    }
}
