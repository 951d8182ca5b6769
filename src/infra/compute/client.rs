use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::fetch::auth::{ApiKey, UrlParam};
use crate::fetch::{BasicClient, HttpClient, post_json};
use crate::infra::keys::Credentials;
use crate::services::geospatial_api::{
    BandStatistics, CollectionQuery, GeospatialBackend, RegionReduction, ValueUnits,
};

#[derive(Serialize)]
struct TokenRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct AreaRequest<'a> {
    geometry: &'a geojson::Geometry,
}

#[derive(Deserialize)]
struct AreaResponse {
    area_m2: f64,
}

#[derive(Serialize)]
struct SizeRequest<'a> {
    query: &'a CollectionQuery,
}

#[derive(Deserialize)]
struct SizeResponse {
    count: u64,
}

#[derive(Serialize)]
struct ReduceRequest<'a> {
    query: &'a CollectionQuery,
    reduction: &'a RegionReduction,
}

#[derive(Deserialize)]
struct ReduceResponse {
    #[serde(default)]
    values: HashMap<String, Option<f64>>,
    #[serde(default)]
    units: ValueUnits,
}

/// REST client for the compute gateway in front of the earth-observation
/// platform.
pub struct ComputeClient {
    base_url: String,
    project: String,
    http: Box<dyn HttpClient>,
}

impl ComputeClient {
    /// Builds an authenticated client. A refresh token is exchanged for a
    /// bearer token up front, so bad credentials fail here rather than
    /// mid-analysis.
    pub async fn connect(config: &BackendConfig, timeout: Duration) -> Result<Self> {
        let http: Box<dyn HttpClient> = match &config.credentials {
            Credentials::RefreshToken(refresh_token) => {
                let access_token =
                    Self::exchange_token(&config.token_url, refresh_token, timeout).await?;
                Box::new(ApiKey::bearer(BasicClient::with_timeout(timeout)?, &access_token)?)
            }
            Credentials::ApiKey(key) => Box::new(UrlParam::new(
                BasicClient::with_timeout(timeout)?,
                "key",
                key.as_str(),
            )),
        };

        info!(base_url = %config.base_url, project = %config.project, "Compute backend connected");
        Ok(Self::with_http(&config.base_url, &config.project, http))
    }

    /// Client over an already-authenticated transport.
    pub fn with_http(base_url: &str, project: &str, http: Box<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            http,
        }
    }

    async fn exchange_token(token_url: &str, refresh_token: &str, timeout: Duration) -> Result<String> {
        let client = BasicClient::with_timeout(timeout)?;
        let response: TokenResponse = post_json(&client, token_url, &TokenRequest { refresh_token })
            .await
            .context("token exchange failed")?;
        Ok(response.access_token)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/projects/{}/{}", self.base_url, self.project, method)
    }
}

#[async_trait]
impl GeospatialBackend for ComputeClient {
    #[tracing::instrument(skip_all)]
    async fn geodesic_area_m2(&self, geometry: &geojson::Geometry) -> Result<f64> {
        let resp: AreaResponse =
            post_json(&*self.http, &self.endpoint("geometry:area"), &AreaRequest { geometry }).await?;
        debug!(area_m2 = resp.area_m2, "Geodesic area");
        Ok(resp.area_m2)
    }

    #[tracing::instrument(skip_all, fields(collection = %query.collection))]
    async fn collection_size(&self, query: &CollectionQuery) -> Result<u64> {
        let resp: SizeResponse =
            post_json(&*self.http, &self.endpoint("collections:size"), &SizeRequest { query }).await?;
        debug!(count = resp.count, "Collection size");
        Ok(resp.count)
    }

    #[tracing::instrument(skip_all, fields(collection = %query.collection))]
    async fn reduce_region(
        &self,
        query: &CollectionQuery,
        reduction: &RegionReduction,
    ) -> Result<BandStatistics> {
        let resp: ReduceResponse = post_json(
            &*self.http,
            &self.endpoint("collections:reduceRegion"),
            &ReduceRequest { query, reduction },
        )
        .await?;
        debug!(keys = resp.values.len(), units = ?resp.units, "Region reduced");
        Ok(BandStatistics::from_values(
            query.band.output_name(),
            &resp.values,
            resp.units,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoints() {
        let client = ComputeClient::with_http(
            "https://gateway.example.com/",
            "drought-demo",
            Box::new(BasicClient::new()),
        );
        assert_eq!(
            client.endpoint("collections:reduceRegion"),
            "https://gateway.example.com/v1/projects/drought-demo/collections:reduceRegion"
        );
    }

    #[test]
    fn test_reduce_response_decoding() {
        let resp: ReduceResponse = serde_json::from_value(json!({
            "values": {"VV_mean": -13.2, "VV_stdDev": 2.0, "VV_median": null},
            "units": "db"
        }))
        .unwrap();
        assert_eq!(resp.units, ValueUnits::Decibel);
        let stats = BandStatistics::from_values("VV", &resp.values, resp.units);
        assert_eq!(stats.mean, Some(-13.2));
        assert_eq!(stats.median, None);

        let bare: ReduceResponse = serde_json::from_value(json!({})).unwrap();
        assert!(bare.values.is_empty());
        assert_eq!(bare.units, ValueUnits::Linear);
    }
}
