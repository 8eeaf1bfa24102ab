use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::web::models::{ContainerListPush, WsMessage};
use crate::web::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn send_message(socket: &mut WebSocket, message: &WsMessage) -> Result<(), ()> {
    match serde_json::to_string(message) {
        Ok(json_data) => socket
            .send(Message::Text(Utf8Bytes::from(json_data)))
            .await
            .map_err(|_| ()),
        Err(e) => {
            warn!(error = %e, "Failed to serialize WebSocket message.");
            Ok(())
        }
    }
}

/// Pushes the container list snapshot, then forwards store pushes and
/// search-state changes until the client disconnects. Incoming text
/// frames are treated as search keystrokes and fed to the debounced
/// search service.
async fn handle_socket(mut socket: WebSocket, app_state: Arc<AppState>) {
    debug!("WebSocket connection established.");

    // 1. Initial data snapshot.
    let snapshot = WsMessage::FullContainerList(ContainerListPush {
        containers: app_state.store.snapshot().await,
    });
    if send_message(&mut socket, &snapshot).await.is_err() {
        debug!("Error sending initial WebSocket snapshot, closing connection.");
        return;
    }

    // 2. Subscribe to store pushes; dropping the receiver on disconnect
    // unsubscribes.
    let mut push_rx = app_state.push_tx.subscribe();
    let mut search_rx = app_state.search_state_rx.clone();

    // 3. Forward updates and client keystrokes until either side closes.
    loop {
        tokio::select! {
            received = push_rx.recv() => {
                match received {
                    Ok(message) => {
                        if send_message(&mut socket, &message).await.is_err() {
                            debug!("Error sending WebSocket update, closing connection.");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "WebSocket push subscriber lagged.");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            changed = search_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = search_rx.borrow_and_update().clone();
                if send_message(&mut socket, &WsMessage::SearchState(state)).await.is_err() {
                    break;
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if app_state.search_input_tx.send(text.to_string()).await.is_err() {
                            warn!("Search service is gone, ignoring keystroke.");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error, closing connection.");
                        break;
                    }
                }
            }
        }
    }
}
