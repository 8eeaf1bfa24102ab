use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracking::models::{CfsLotDetail, Container};

pub mod client;
pub mod endpoints;

pub use client::CarrierApiClient;
pub use endpoints::CarrierEndpointsCache;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("carrier API returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("endpoint not advertised by carrier API: {0}")]
    UnknownEndpoint(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Extended per-container data returned by the detail endpoint. Both
/// lists may be empty when the carrier has nothing on file.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDetails {
    #[serde(default)]
    pub cfs_lot_details: Vec<CfsLotDetail>,
    #[serde(default)]
    pub container_attachments: Vec<String>,
}

/// A lightweight hit from the free-text search endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub reference: String,
    #[serde(rename = "type")]
    pub result_type: String,
    pub status: String,
    pub customer: Option<String>,
}

/// The remote tracking backend as seen by the store and the search
/// service. Production uses [`CarrierApiClient`]; tests substitute a
/// mock to observe call counts.
#[async_trait]
pub trait TrackingApi: Send + Sync {
    /// Fetches the full set of tracked containers.
    async fn list_containers(&self) -> Result<Vec<Container>, ApiError>;

    /// Fetches extended lot/attachment data for one container, keyed by
    /// container number.
    async fn container_details(&self, container_number: &str) -> Result<ContainerDetails, ApiError>;

    /// Free-text search across containers and shipments.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError>;
}
