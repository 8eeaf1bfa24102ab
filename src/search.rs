//! Debounced free-text search against the remote tracking API.
//!
//! Keystrokes arrive on an mpsc channel; a query is issued only once the
//! input has been idle for the debounce window, and only for inputs of
//! at least [`MIN_QUERY_LEN`] characters. The latest outcome is
//! published on a watch channel for consumers (the WebSocket handler)
//! to forward.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::{SearchResult, TrackingApi};

pub const MIN_QUERY_LEN: usize = 3;
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Capacity of the keystroke channel; typing faster than the service
/// drains is back-pressured, not dropped.
const INPUT_BUFFER: usize = 64;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchState {
    /// No query pending; also the state after the input drops below the
    /// minimum length.
    Idle,
    Searching { query: String },
    Results { query: String, results: Vec<SearchResult> },
    Failed { query: String, error: String },
}

pub struct SearchService {
    api: Arc<dyn TrackingApi>,
}

impl SearchService {
    pub fn new(api: Arc<dyn TrackingApi>) -> Self {
        Self { api }
    }

    /// Spawns the debounce loop. Returns the keystroke sender, the
    /// state receiver, and the task handle. The loop exits when every
    /// sender is dropped.
    pub fn spawn(self) -> (mpsc::Sender<String>, watch::Receiver<SearchState>, JoinHandle<()>) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
        let (state_tx, state_rx) = watch::channel(SearchState::Idle);
        let handle = tokio::spawn(self.run(input_rx, state_tx));
        (input_tx, state_rx, handle)
    }

    async fn run(self, mut input: mpsc::Receiver<String>, state: watch::Sender<SearchState>) {
        let mut pending: Option<String> = None;
        loop {
            tokio::select! {
                // Keystrokes take priority over the timer so a burst of
                // input restarts the debounce window instead of racing it.
                biased;

                received = input.recv() => {
                    match received {
                        Some(raw) => {
                            let query = raw.trim().to_string();
                            if query.chars().count() >= MIN_QUERY_LEN {
                                pending = Some(query);
                            } else {
                                // Too short to ever query.
                                pending = None;
                                let _ = state.send(SearchState::Idle);
                            }
                        }
                        None => {
                            debug!("Search input channel closed, search service exiting.");
                            return;
                        }
                    }
                }
                _ = tokio::time::sleep(DEBOUNCE), if pending.is_some() => {
                    let query = pending.take().unwrap_or_default();
                    let _ = state.send(SearchState::Searching { query: query.clone() });
                    match self.api.search(&query).await {
                        Ok(results) => {
                            debug!(query = %query, hits = results.len(), "Search completed.");
                            let _ = state.send(SearchState::Results { query, results });
                        }
                        Err(e) => {
                            warn!(query = %query, error = %e, "Search failed.");
                            let _ = state.send(SearchState::Failed {
                                query,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::{timeout, Instant};

    use super::*;
    use crate::api::{ApiError, ContainerDetails};
    use crate::tracking::models::Container;

    struct MockApi {
        search_calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                search_calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl TrackingApi for MockApi {
        async fn list_containers(&self) -> Result<Vec<Container>, ApiError> {
            Ok(Vec::new())
        }

        async fn container_details(&self, _container_number: &str) -> Result<ContainerDetails, ApiError> {
            Ok(ContainerDetails::default())
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail {
                return Err(ApiError::Transport("search backend down".to_string()));
            }
            Ok(vec![SearchResult {
                id: "R1".to_string(),
                reference: query.to_string(),
                result_type: "container".to_string(),
                status: "In Transit".to_string(),
                customer: None,
            }])
        }
    }

    async fn wait_for_terminal_state(rx: &mut watch::Receiver<SearchState>) -> SearchState {
        loop {
            rx.changed().await.unwrap();
            let current = rx.borrow().clone();
            match current {
                SearchState::Results { .. } | SearchState::Failed { .. } => return current,
                _ => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_never_queries() {
        let api = Arc::new(MockApi::new());
        let (input_tx, mut state_rx, handle) = SearchService::new(api.clone()).spawn();

        input_tx.send("AB".to_string()).await.unwrap();
        let changed = timeout(Duration::from_millis(500), state_rx.changed()).await;
        // Only transition is to Idle; no query ever fires.
        assert!(changed.is_ok());
        assert_eq!(*state_rx.borrow(), SearchState::Idle);
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);

        drop(input_tx);
        handle.await.unwrap();
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_fires_after_debounce_window() {
        let api = Arc::new(MockApi::new());
        let (input_tx, mut state_rx, handle) = SearchService::new(api.clone()).spawn();

        let started = Instant::now();
        input_tx.send("ABC".to_string()).await.unwrap();
        let state = wait_for_terminal_state(&mut state_rx).await;

        assert!(started.elapsed() >= DEBOUNCE);
        match state {
            SearchState::Results { query, results } => {
                assert_eq!(query, "ABC");
                assert_eq!(results.len(), 1);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 1);

        drop(input_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_keystrokes_collapse_to_one_query() {
        let api = Arc::new(MockApi::new());
        let (input_tx, mut state_rx, handle) = SearchService::new(api.clone()).spawn();

        input_tx.send("ABC".to_string()).await.unwrap();
        input_tx.send("ABCD".to_string()).await.unwrap();
        input_tx.send("ABCDE".to_string()).await.unwrap();
        wait_for_terminal_state(&mut state_rx).await;

        assert_eq!(api.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.queries.lock().unwrap().as_slice(), ["ABCDE"]);

        drop(input_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_failure_is_surfaced_not_fatal() {
        let mut api = MockApi::new();
        api.fail = true;
        let api = Arc::new(api);
        let (input_tx, mut state_rx, handle) = SearchService::new(api.clone()).spawn();

        input_tx.send("MSCU".to_string()).await.unwrap();
        let state = wait_for_terminal_state(&mut state_rx).await;
        match state {
            SearchState::Failed { query, error } => {
                assert_eq!(query, "MSCU");
                assert!(error.contains("search backend down"));
            }
            other => panic!("unexpected state: {other:?}"),
        }

        // The service survives a failed query and handles the next one.
        input_tx.send("HLCU".to_string()).await.unwrap();
        wait_for_terminal_state(&mut state_rx).await;
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 2);

        drop(input_tx);
        handle.await.unwrap();
    }
}
