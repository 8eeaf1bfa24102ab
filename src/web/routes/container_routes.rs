use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::tracking::models::Container;
use crate::tracking::pagination::PageView;
use crate::web::{AppError, AppState};

// --- Request/Response Structs ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListContainersQuery {
    page: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContainerListResponse {
    #[serde(flatten)]
    pub page: PageView<Container>,
    pub loading: bool,
    pub load_error: Option<String>,
}

// --- Route Handlers ---

async fn list_containers_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListContainersQuery>,
) -> Result<Json<ContainerListResponse>, AppError> {
    if query.page_size == Some(0) {
        return Err(AppError::InvalidInput(
            "pageSize must be at least 1".to_string(),
        ));
    }

    let store = &app_state.store;
    // Page size first: changing it resets to page 1, which an explicit
    // page parameter in the same request then overrides.
    if let Some(page_size) = query.page_size {
        store.set_page_size(page_size).await;
    }
    if let Some(page) = query.page {
        store.set_current_page(page).await;
    }

    Ok(Json(ContainerListResponse {
        page: store.page_view().await,
        loading: store.is_loading().await,
        load_error: store.load_error().await,
    }))
}

async fn reload_containers_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ContainerListResponse>, AppError> {
    let store = &app_state.store;
    store.load().await;
    Ok(Json(ContainerListResponse {
        page: store.page_view().await,
        loading: store.is_loading().await,
        load_error: store.load_error().await,
    }))
}

async fn get_container_handler(
    State(app_state): State<Arc<AppState>>,
    Path(container_id): Path<String>,
) -> Result<Json<Container>, AppError> {
    app_state
        .store
        .container(&container_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Container '{container_id}' is not tracked.")))
}

async fn expand_container_handler(
    State(app_state): State<Arc<AppState>>,
    Path(container_id): Path<String>,
) -> Result<Json<Container>, AppError> {
    app_state
        .store
        .toggle_expand(&container_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Container '{container_id}' is not tracked.")))
}

pub fn container_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_containers_handler))
        .route("/reload", post(reload_containers_handler))
        .route("/{container_id}", get(get_container_handler))
        .route("/{container_id}/expand", post(expand_container_handler))
}
