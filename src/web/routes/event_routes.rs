use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::tracking::ShipmentUpdate;
use crate::web::models::ShipmentUpdateRequest;
use crate::web::{AppError, AppState};

/// Intake for carrier-pushed shipment status changes. The update is
/// published on the shipment event bus; the store's listener applies it.
pub async fn shipment_update_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ShipmentUpdateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if payload.customs.is_none()
        && payload.freight_release.is_none()
        && payload.last_free_day.is_none()
    {
        return Err(AppError::InvalidInput(
            "Shipment update carries no status changes.".to_string(),
        ));
    }

    let event_id = Uuid::new_v4().to_string();
    info!(
        event_id = %event_id,
        container_id = %payload.container_id,
        shipment_id = %payload.shipment_id,
        "Accepted shipment status update."
    );

    app_state.shipment_bus.publish(ShipmentUpdate {
        event_id: event_id.clone(),
        container_id: payload.container_id,
        shipment_id: payload.shipment_id,
        customs: payload.customs,
        freight_release: payload.freight_release,
        last_free_day: payload.last_free_day,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "eventId": event_id })),
    ))
}
