use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, CarrierEndpointsCache, ContainerDetails, SearchResult, TrackingApi};
use crate::tracking::models::Container;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Discovery document served at `{base}/v1/endpoints`.
#[derive(Deserialize, Debug)]
struct EndpointsDoc {
    endpoints: HashMap<String, String>,
}

/// Production [`TrackingApi`] implementation over the carrier's REST
/// API. Endpoint URLs are resolved once per session through the shared
/// [`CarrierEndpointsCache`].
pub struct CarrierApiClient {
    http: Client,
    base_url: String,
    endpoints: Arc<CarrierEndpointsCache>,
}

impl CarrierApiClient {
    pub fn new(base_url: impl Into<String>, endpoints: Arc<CarrierEndpointsCache>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints,
        })
    }

    /// Looks up a named endpoint, fetching the discovery document on a
    /// cache miss.
    async fn endpoint_url(&self, name: &str) -> Result<String, ApiError> {
        if let Some(url) = self.endpoints.get(name) {
            return Ok(url);
        }

        let discovery_url = format!("{}/v1/endpoints", self.base_url);
        debug!(url = %discovery_url, "Resolving carrier endpoints.");
        let response = self.http.get(&discovery_url).send().await?;
        let doc: EndpointsDoc = check_status(response).await?.json().await?;
        for (endpoint_name, endpoint_url) in doc.endpoints {
            self.endpoints.insert(endpoint_name, endpoint_url);
        }

        self.endpoints
            .get(name)
            .ok_or_else(|| ApiError::UnknownEndpoint(name.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TrackingApi for CarrierApiClient {
    async fn list_containers(&self) -> Result<Vec<Container>, ApiError> {
        let tracking = self.endpoint_url("tracking").await?;
        let url = format!("{}/containers", tracking.trim_end_matches('/'));
        debug!(url = %url, "Fetching container list.");
        let response = self.http.get(&url).send().await?;
        let containers = check_status(response).await?.json().await?;
        Ok(containers)
    }

    async fn container_details(&self, container_number: &str) -> Result<ContainerDetails, ApiError> {
        let tracking = self.endpoint_url("tracking").await?;
        let url = format!(
            "{}/containers/{}/details",
            tracking.trim_end_matches('/'),
            container_number
        );
        debug!(container_number = %container_number, "Fetching container details.");
        let response = self.http.get(&url).send().await?;
        let details = check_status(response).await?.json().await?;
        Ok(details)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let search = self.endpoint_url("search").await?;
        debug!(query = %query, "Issuing search query.");
        let response = self.http.get(&search).query(&[("q", query)]).send().await?;
        let results = check_status(response).await?.json().await?;
        Ok(results)
    }
}
