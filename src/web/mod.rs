use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::cors::{Any, CorsLayer};

use crate::api::TrackingApi;
use crate::config::ServerConfig;
use crate::search::SearchState;
use crate::tracking::{ContainerStore, ShipmentEventBus};
use crate::web::models::WsMessage;

pub mod error;
pub mod models;
pub mod routes;
pub mod websocket_handler;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ContainerStore>,
    pub api: Arc<dyn TrackingApi>,
    pub shipment_bus: ShipmentEventBus,
    pub push_tx: broadcast::Sender<WsMessage>,
    pub search_input_tx: mpsc::Sender<String>,
    pub search_state_rx: watch::Receiver<SearchState>,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/containers", routes::container_routes::container_router())
        .route("/api/search", get(routes::search_routes::search_handler))
        .route(
            "/api/events/shipments",
            axum::routing::post(routes::event_routes::shipment_update_handler),
        )
        .route("/ws/containers", get(websocket_handler::websocket_handler))
        .layer(cors)
        .with_state(app_state)
}
