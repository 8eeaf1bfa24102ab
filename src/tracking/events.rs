//! Push-style shipment status updates, modeled as a broadcast channel
//! rather than a hidden callback registration. An external event source
//! (carrier webhook intake, polling task) publishes updates; the store
//! subscribes and applies them like any other mutation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::models::StatusRecord;

/// One pushed change to a shipment's sub-statuses. Only the `Some`
/// fields are applied.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentUpdate {
    pub event_id: String,
    pub container_id: String,
    pub shipment_id: String,
    pub customs: Option<StatusRecord>,
    pub freight_release: Option<StatusRecord>,
    pub last_free_day: Option<StatusRecord>,
}

/// Fan-out point for shipment updates. Cloneable; all clones share the
/// same underlying channel.
#[derive(Clone, Debug)]
pub struct ShipmentEventBus {
    tx: broadcast::Sender<ShipmentUpdate>,
}

impl ShipmentEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an update to all current subscribers. A push with no
    /// subscribers is dropped; status pushes are fire-and-forget.
    pub fn publish(&self, update: ShipmentUpdate) {
        if self.tx.receiver_count() == 0 {
            debug!(event_id = %update.event_id, "No subscribers for shipment update, dropping.");
            return;
        }
        // send only fails when every receiver dropped between the check
        // and the send.
        let _ = self.tx.send(update);
    }

    /// Subscribes to future updates. Dropping the returned subscription
    /// unsubscribes; there is no explicit teardown call to forget.
    pub fn subscribe(&self) -> ShipmentSubscription {
        ShipmentSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ShipmentEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// A live subscription to the shipment event bus.
pub struct ShipmentSubscription {
    rx: broadcast::Receiver<ShipmentUpdate>,
}

impl ShipmentSubscription {
    /// Waits for the next update. Returns `None` once the bus is gone
    /// or this subscriber lagged past the channel capacity.
    pub async fn recv(&mut self) -> Option<ShipmentUpdate> {
        match self.rx.recv().await {
            Ok(update) => Some(update),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Shipment subscription lagged, resuming at oldest retained event.");
                match self.rx.recv().await {
                    Ok(update) => Some(update),
                    Err(_) => None,
                }
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
