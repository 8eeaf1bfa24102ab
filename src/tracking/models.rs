use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A status/date pair used for the customs, freight-release and
/// last-free-day sub-statuses of a shipment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: String,
    pub date: Option<DateTime<Utc>>,
}

/// A single cargo movement associated with a container.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: String,
    pub bill_of_lading: Option<String>,
    pub house_bill_of_lading: Option<String>,
    pub customer: Option<String>,
    pub customs: Option<StatusRecord>,
    pub freight_release: Option<StatusRecord>,
    pub last_free_day: Option<StatusRecord>,
}

/// One lot of cargo at a Container Freight Station, returned by the
/// carrier detail endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CfsLotDetail {
    pub lot_number: String,
    pub pieces: Option<i32>,
    pub weight_kg: Option<f64>,
    pub location: Option<String>,
    pub available_at: Option<DateTime<Utc>>,
}

/// A tracked shipping container as it is sent to the frontend.
///
/// `cfs_lot_details` and `container_attachments` stay `None` until a
/// detail fetch for this container completes successfully; they are
/// never partially populated. `is_loading_details` and `details_error`
/// are transient UI state owned by the store.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub container_number: String,
    pub status: String,
    pub location: Option<String>,
    pub vessel: Option<String>,
    pub carrier: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    pub cfs_lot_details: Option<Vec<CfsLotDetail>>,
    pub container_attachments: Option<Vec<String>>,
    #[serde(default)]
    pub is_loading_details: bool,
    pub details_error: Option<String>,
}

impl Container {
    /// A bare container row as it arrives from the listing endpoint,
    /// before any detail fetch.
    pub fn new(id: impl Into<String>, container_number: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            container_number: container_number.into(),
            status: status.into(),
            location: None,
            vessel: None,
            carrier: None,
            eta: None,
            shipments: Vec::new(),
            cfs_lot_details: None,
            container_attachments: None,
            is_loading_details: false,
            details_error: None,
        }
    }
}
