use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::SearchResult;
use crate::search::MIN_QUERY_LEN;
use crate::web::{AppError, AppState};

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    q: String,
}

/// One-shot search for callers that do their own debouncing; the
/// typeahead path goes through the WebSocket and the debounced search
/// service instead.
pub async fn search_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    let q = query.q.trim();
    if q.chars().count() < MIN_QUERY_LEN {
        return Err(AppError::InvalidInput(format!(
            "Search query must be at least {MIN_QUERY_LEN} characters."
        )));
    }
    let results = app_state.api.search(q).await?;
    Ok(Json(results))
}
