use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::TrackingApi;
use crate::tracking::events::{ShipmentEventBus, ShipmentUpdate};
use crate::tracking::models::Container;
use crate::tracking::pagination::{self, PageView};
use crate::web::models::{ContainerListPush, WsMessage};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Default)]
struct StoreState {
    containers: Vec<Container>,
    /// Rows whose detail panel is currently open.
    expanded: HashSet<String>,
    /// Container ids whose detail fetch completed successfully. Entries
    /// are added only on success so a failed fetch is retried on the
    /// next expand.
    fetched: HashSet<String>,
    page: usize,
    page_size: usize,
    loading: bool,
    load_error: Option<String>,
}

/// Owns the in-memory list of tracked containers, the pagination state
/// derived from it, and the at-most-one-fetch-per-container detail
/// loading.
///
/// All mutation goes through the store's methods; completed mutations
/// are pushed to WebSocket clients through `push_tx`.
pub struct ContainerStore {
    api: Arc<dyn TrackingApi>,
    state: RwLock<StoreState>,
    push_tx: broadcast::Sender<WsMessage>,
}

impl ContainerStore {
    pub fn new(api: Arc<dyn TrackingApi>, push_tx: broadcast::Sender<WsMessage>) -> Self {
        Self {
            api,
            state: RwLock::new(StoreState {
                page: 1,
                page_size: DEFAULT_PAGE_SIZE,
                ..StoreState::default()
            }),
            push_tx,
        }
    }

    /// Replaces the container list with the result of a remote listing
    /// call. On failure the list is left empty and the error surfaced
    /// as store-level state; nothing is thrown to the caller.
    pub async fn load(&self) {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.load_error = None;
        }

        let result = self.api.list_containers().await;

        let push = {
            let mut state = self.state.write().await;
            state.loading = false;
            match result {
                Ok(containers) => {
                    info!(count = containers.len(), "Loaded container list.");
                    state.containers = containers;
                    state.expanded.clear();
                    state.fetched.clear();
                    state.page = 1;
                    Some(state.containers.clone())
                }
                Err(e) => {
                    error!(error = %e, "Failed to load container list.");
                    state.containers.clear();
                    state.page = 1;
                    state.load_error = Some(e.to_string());
                    None
                }
            }
        };

        if let Some(containers) = push {
            self.push(WsMessage::FullContainerList(ContainerListPush { containers }));
        }
    }

    /// Populates the list from caller-supplied data instead of a remote
    /// call, e.g. when the parent screen already holds the rows.
    pub async fn load_from(&self, containers: Vec<Container>) {
        let push = {
            let mut state = self.state.write().await;
            state.containers = containers;
            state.expanded.clear();
            state.fetched.clear();
            state.page = 1;
            state.loading = false;
            state.load_error = None;
            state.containers.clone()
        };
        self.push(WsMessage::FullContainerList(ContainerListPush { containers: push }));
    }

    /// Flips a container's detail panel open or closed. Opening a row
    /// whose detail has not yet been fetched triggers the fetch; rows
    /// already fetched (or with a fetch in flight) are not re-fetched.
    /// Returns the row's current state, or `None` for an unknown id.
    pub async fn toggle_expand(&self, id: &str) -> Option<Container> {
        let should_fetch = {
            let mut state = self.state.write().await;
            let container = state.containers.iter().find(|c| c.id == id)?;
            let loading_details = container.is_loading_details;
            if state.expanded.contains(id) {
                state.expanded.remove(id);
                false
            } else {
                state.expanded.insert(id.to_string());
                !state.fetched.contains(id) && !loading_details
            }
        };

        if should_fetch {
            self.fetch_details(id).await;
        }
        self.container(id).await
    }

    /// Fetches extended detail for one container and merges it into the
    /// matching row. Failures become a per-row error string; other rows
    /// are unaffected and the fetched-set is not updated, so the next
    /// expand retries.
    pub async fn fetch_details(&self, id: &str) {
        let container_number = {
            let mut state = self.state.write().await;
            if state.fetched.contains(id) {
                return;
            }
            let Some(container) = state.containers.iter_mut().find(|c| c.id == id) else {
                warn!(container_id = %id, "Detail fetch requested for unknown container.");
                return;
            };
            if container.is_loading_details {
                debug!(container_id = %id, "Detail fetch already in flight, skipping.");
                return;
            }
            container.is_loading_details = true;
            container.details_error = None;
            container.container_number.clone()
        };

        let result = self.api.container_details(&container_number).await;

        let updated = {
            let mut state = self.state.write().await;
            let fetched_ok = result.is_ok();
            let Some(container) = state.containers.iter_mut().find(|c| c.id == id) else {
                // List was reloaded while the fetch was in flight.
                return;
            };
            container.is_loading_details = false;
            match result {
                Ok(details) => {
                    container.cfs_lot_details = Some(details.cfs_lot_details);
                    container.container_attachments = Some(details.container_attachments);
                    debug!(container_id = %id, "Merged container details.");
                }
                Err(e) => {
                    warn!(container_id = %id, error = %e, "Detail fetch failed.");
                    container.details_error = Some(e.to_string());
                }
            }
            let updated = container.clone();
            if fetched_ok {
                state.fetched.insert(id.to_string());
            }
            updated
        };

        self.push(WsMessage::ContainerUpdate(Box::new(updated)));
    }

    /// Changing the page size always resets to the first page.
    pub async fn set_page_size(&self, page_size: usize) {
        let mut state = self.state.write().await;
        state.page_size = page_size.max(1);
        state.page = 1;
    }

    /// Out-of-range pages are clamped to the last page so the view
    /// never points past the list.
    pub async fn set_current_page(&self, page: usize) {
        let mut state = self.state.write().await;
        let last = pagination::page_count(state.containers.len(), state.page_size);
        state.page = page.clamp(1, last);
    }

    /// The current page slice plus derived totals.
    pub async fn page_view(&self) -> PageView<Container> {
        let state = self.state.read().await;
        pagination::page_view(&state.containers, state.page, state.page_size)
    }

    pub async fn container(&self, id: &str) -> Option<Container> {
        let state = self.state.read().await;
        state.containers.iter().find(|c| c.id == id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<Container> {
        self.state.read().await.containers.clone()
    }

    pub async fn is_fetched(&self, id: &str) -> bool {
        self.state.read().await.fetched.contains(id)
    }

    pub async fn is_expanded(&self, id: &str) -> bool {
        self.state.read().await.expanded.contains(id)
    }

    pub async fn load_error(&self) -> Option<String> {
        self.state.read().await.load_error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn current_page(&self) -> usize {
        self.state.read().await.page
    }

    /// Applies one pushed shipment update to the owning container's
    /// shipment, like any other store mutation.
    pub async fn apply_update(&self, update: ShipmentUpdate) {
        let updated = {
            let mut state = self.state.write().await;
            let Some(container) = state
                .containers
                .iter_mut()
                .find(|c| c.id == update.container_id)
            else {
                debug!(container_id = %update.container_id, "Shipment update for untracked container, ignoring.");
                return;
            };
            let Some(shipment) = container
                .shipments
                .iter_mut()
                .find(|s| s.id == update.shipment_id)
            else {
                debug!(
                    container_id = %update.container_id,
                    shipment_id = %update.shipment_id,
                    "Shipment update for unknown shipment, ignoring."
                );
                return;
            };
            if let Some(customs) = update.customs {
                shipment.customs = Some(customs);
            }
            if let Some(freight_release) = update.freight_release {
                shipment.freight_release = Some(freight_release);
            }
            if let Some(last_free_day) = update.last_free_day {
                shipment.last_free_day = Some(last_free_day);
            }
            container.clone()
        };

        self.push(WsMessage::ContainerUpdate(Box::new(updated)));
    }

    /// Subscribes the store to a shipment event bus and applies every
    /// update until the bus is dropped. The subscription ends (and
    /// unsubscribes) when the returned task is aborted or the bus
    /// closes.
    pub fn run_update_listener(self: &Arc<Self>, bus: &ShipmentEventBus) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut subscription = bus.subscribe();
        tokio::spawn(async move {
            while let Some(update) = subscription.recv().await {
                store.apply_update(update).await;
            }
            info!("Shipment event bus closed, update listener exiting.");
        })
    }

    fn push(&self, message: WsMessage) {
        if self.push_tx.receiver_count() > 0 && self.push_tx.send(message).is_err() {
            debug!("Push failed: receivers dropped between check and send.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::{ApiError, ContainerDetails, SearchResult, TrackingApi};
    use crate::tracking::models::{CfsLotDetail, Shipment, StatusRecord};

    struct MockApi {
        containers: Vec<Container>,
        fail_list: AtomicBool,
        fail_details_for: Mutex<HashSet<String>>,
        /// When set, `container_details` blocks until the gate is
        /// notified, keeping the fetch in flight.
        detail_gate: Option<Arc<Notify>>,
        list_calls: AtomicUsize,
        detail_calls: AtomicUsize,
    }

    impl MockApi {
        fn new(containers: Vec<Container>) -> Self {
            Self {
                containers,
                fail_list: AtomicBool::new(false),
                fail_details_for: Mutex::new(HashSet::new()),
                detail_gate: None,
                list_calls: AtomicUsize::new(0),
                detail_calls: AtomicUsize::new(0),
            }
        }

        fn failing_details(self, container_number: &str) -> Self {
            self.fail_details_for
                .lock()
                .unwrap()
                .insert(container_number.to_string());
            self
        }
    }

    #[async_trait]
    impl TrackingApi for MockApi {
        async fn list_containers(&self) -> Result<Vec<Container>, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ApiError::Transport("connection refused".to_string()));
            }
            Ok(self.containers.clone())
        }

        async fn container_details(&self, container_number: &str) -> Result<ContainerDetails, ApiError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.detail_gate {
                gate.notified().await;
            }
            if self.fail_details_for.lock().unwrap().contains(container_number) {
                return Err(ApiError::Status {
                    status: 503,
                    message: "carrier unavailable".to_string(),
                });
            }
            Ok(ContainerDetails {
                cfs_lot_details: vec![CfsLotDetail {
                    lot_number: format!("LOT-{container_number}"),
                    pieces: Some(12),
                    weight_kg: Some(840.0),
                    location: Some("CFS Oakland".to_string()),
                    available_at: None,
                }],
                container_attachments: vec!["https://docs.example.com/delivery-order.pdf".to_string()],
            })
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn containers(count: usize) -> Vec<Container> {
        (1..=count)
            .map(|i| Container::new(format!("C{i}"), format!("MSCU100{i:04}"), "In Transit"))
            .collect()
    }

    fn store_with(api: MockApi) -> (Arc<ContainerStore>, Arc<MockApi>) {
        let api = Arc::new(api);
        let (push_tx, _) = broadcast::channel(32);
        let store = Arc::new(ContainerStore::new(api.clone(), push_tx));
        (store, api)
    }

    #[tokio::test]
    async fn test_load_populates_list() {
        let (store, api) = store_with(MockApi::new(containers(3)));
        store.load().await;
        assert_eq!(store.snapshot().await.len(), 3);
        assert_eq!(store.load_error().await, None);
        assert!(!store.is_loading().await);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_sets_error_and_empties_list() {
        let api = MockApi::new(containers(3));
        api.fail_list.store(true, Ordering::SeqCst);
        let (store, _) = store_with(api);
        store.load().await;
        assert!(store.snapshot().await.is_empty());
        assert!(store.load_error().await.unwrap().contains("connection refused"));
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn test_failed_reload_resets_page() {
        let (store, api) = store_with(MockApi::new(containers(25)));
        store.load().await;
        store.set_current_page(3).await;

        api.fail_list.store(true, Ordering::SeqCst);
        store.load().await;
        assert!(store.snapshot().await.is_empty());
        assert_eq!(store.current_page().await, 1);
        assert_eq!(store.page_view().await.total_pages, 1);
    }

    #[tokio::test]
    async fn test_expand_fetches_details_once() {
        let (store, api) = store_with(MockApi::new(containers(2)));
        store.load().await;

        let row = store.toggle_expand("C1").await.unwrap();
        assert_eq!(row.cfs_lot_details.as_ref().unwrap().len(), 1);
        assert!(!row.is_loading_details);
        assert!(store.is_fetched("C1").await);
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);

        // Collapse and re-expand: already fetched, no second call.
        store.toggle_expand("C1").await;
        assert!(!store.is_expanded("C1").await);
        store.toggle_expand("C1").await;
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_in_flight_fetch_is_not_duplicated() {
        let gate = Arc::new(Notify::new());
        let mut api = MockApi::new(containers(1));
        api.detail_gate = Some(gate.clone());
        let (store, api) = store_with(api);
        store.load().await;

        let expander = tokio::spawn({
            let store = store.clone();
            async move { store.toggle_expand("C1").await }
        });

        // Let the spawned fetch reach the gate.
        let mut in_flight = false;
        for _ in 0..200 {
            tokio::task::yield_now().await;
            if store.container("C1").await.unwrap().is_loading_details {
                in_flight = true;
                break;
            }
        }
        assert!(in_flight);
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);

        // Collapse and re-expand while the fetch is still blocked: no
        // second call is issued for the row.
        store.toggle_expand("C1").await;
        let row = store.toggle_expand("C1").await.unwrap();
        assert!(row.is_loading_details);
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let row = expander.await.unwrap().unwrap();
        assert_eq!(row.cfs_lot_details.as_ref().unwrap().len(), 1);
        assert!(!row.is_loading_details);
        assert!(store.is_fetched("C1").await);
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_is_retryable() {
        let api = MockApi::new(containers(2)).failing_details("MSCU1000002");
        let (store, api) = store_with(api);
        store.load().await;

        let row = store.toggle_expand("C2").await.unwrap();
        assert!(row.details_error.as_ref().unwrap().contains("503"));
        assert!(row.cfs_lot_details.is_none());
        assert!(!store.is_fetched("C2").await);
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);

        // Re-expand retries the fetch: second network call observed.
        store.toggle_expand("C2").await;
        store.toggle_expand("C2").await;
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_successful_retry_clears_error_and_marks_fetched() {
        let api = MockApi::new(containers(1)).failing_details("MSCU1000001");
        let (store, api) = store_with(api);
        store.load().await;

        store.toggle_expand("C1").await;
        assert!(!store.is_fetched("C1").await);

        api.fail_details_for.lock().unwrap().clear();
        store.toggle_expand("C1").await;
        let row = store.toggle_expand("C1").await.unwrap();
        assert_eq!(row.details_error, None);
        assert!(store.is_fetched("C1").await);
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_toggle_unknown_id() {
        let (store, _) = store_with(MockApi::new(containers(1)));
        store.load().await;
        assert!(store.toggle_expand("C99").await.is_none());
    }

    #[tokio::test]
    async fn test_pagination_scenario_25_items() {
        let (store, _) = store_with(MockApi::new(containers(25)));
        store.load().await;

        let page = store.page_view().await;
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id, "C1");
        assert_eq!(page.items[9].id, "C10");

        store.set_current_page(3).await;
        let page = store.page_view().await;
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].id, "C21");
        assert_eq!(page.items[4].id, "C25");
    }

    #[tokio::test]
    async fn test_changing_page_size_resets_to_first_page() {
        let (store, _) = store_with(MockApi::new(containers(25)));
        store.load().await;
        store.set_current_page(3).await;
        assert_eq!(store.current_page().await, 3);
        store.set_page_size(5).await;
        assert_eq!(store.current_page().await, 1);
        assert_eq!(store.page_view().await.total_pages, 5);
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_clamped() {
        let (store, _) = store_with(MockApi::new(containers(25)));
        store.load().await;
        store.set_current_page(99).await;
        assert_eq!(store.current_page().await, 3);
        store.set_current_page(0).await;
        assert_eq!(store.current_page().await, 1);
    }

    #[tokio::test]
    async fn test_load_from_resets_fetched_set() {
        let (store, api) = store_with(MockApi::new(containers(2)));
        store.load().await;
        store.toggle_expand("C1").await;
        assert!(store.is_fetched("C1").await);

        store.load_from(containers(2)).await;
        assert!(!store.is_fetched("C1").await);
        store.toggle_expand("C1").await;
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 2);
    }

    fn container_with_shipment() -> Container {
        let mut container = Container::new("C1", "MSCU1000001", "Discharged");
        container.shipments.push(Shipment {
            id: "S1".to_string(),
            bill_of_lading: Some("MBL-123".to_string()),
            house_bill_of_lading: Some("HBL-456".to_string()),
            customer: Some("Acme Imports".to_string()),
            customs: None,
            freight_release: None,
            last_free_day: None,
        });
        container
    }

    #[tokio::test]
    async fn test_apply_update_merges_status_pairs() {
        let (store, _) = store_with(MockApi::new(vec![container_with_shipment()]));
        store.load().await;

        store
            .apply_update(ShipmentUpdate {
                event_id: "evt-1".to_string(),
                container_id: "C1".to_string(),
                shipment_id: "S1".to_string(),
                customs: Some(StatusRecord {
                    status: "Released".to_string(),
                    date: None,
                }),
                freight_release: None,
                last_free_day: None,
            })
            .await;

        let row = store.container("C1").await.unwrap();
        let shipment = &row.shipments[0];
        assert_eq!(shipment.customs.as_ref().unwrap().status, "Released");
        assert_eq!(shipment.freight_release, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_update_listener_applies_bus_events() {
        let (store, _) = store_with(MockApi::new(vec![container_with_shipment()]));
        store.load().await;

        let bus = ShipmentEventBus::new(8);
        let listener = store.run_update_listener(&bus);

        bus.publish(ShipmentUpdate {
            event_id: "evt-2".to_string(),
            container_id: "C1".to_string(),
            shipment_id: "S1".to_string(),
            customs: None,
            freight_release: Some(StatusRecord {
                status: "Released".to_string(),
                date: None,
            }),
            last_free_day: None,
        });

        let mut applied = false;
        for _ in 0..200 {
            tokio::task::yield_now().await;
            let row = store.container("C1").await.unwrap();
            if row.shipments[0].freight_release.is_some() {
                applied = true;
                break;
            }
        }
        assert!(applied);
        listener.abort();
    }
}
