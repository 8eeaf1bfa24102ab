use serde::{Deserialize, Serialize};

use crate::tracking::models::{Container, StatusRecord};

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContainerListPush {
    pub containers: Vec<Container>,
}

/// Messages pushed to dashboard WebSocket clients.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum WsMessage {
    FullContainerList(ContainerListPush),
    ContainerUpdate(Box<Container>),
    SearchState(crate::search::SearchState),
}

/// Body of the shipment-update intake route; the event id is assigned
/// server-side.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentUpdateRequest {
    pub container_id: String,
    pub shipment_id: String,
    pub customs: Option<StatusRecord>,
    pub freight_release: Option<StatusRecord>,
    pub last_free_day: Option<StatusRecord>,
}
