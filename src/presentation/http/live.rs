use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

use super::state::AppState;
use crate::application::services::live_registry::LiveSubscriberRegistry;

/// `GET /ws/alarms`: upgrade and stream alarms as JSON text frames.
pub async fn live_alarms(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_alarms(socket, state.registry))
}

async fn stream_alarms(mut socket: WebSocket, registry: Arc<LiveSubscriberRegistry>) {
    // Unregisters on drop, whichever branch ends the loop.
    let mut subscription = registry.subscribe();
    let subscriber = subscription.id();
    tracing::info!(subscriber, "live subscriber connected");

    loop {
        tokio::select! {
            alert = subscription.recv() => {
                // None: the registry dropped us for lagging.
                let Some(alert) = alert else { break };
                let text = match serde_json::to_string(alert.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(subscriber, "cannot encode live alert: {e}");
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(text.into())).await {
                    tracing::debug!(subscriber, "live send failed: {e}");
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(subscriber, "live read failed: {e}");
                    break;
                }
                // Client frames carry no meaning here.
                Some(Ok(_)) => {}
            }
        }
    }

    drop(subscription);
    tracing::info!(subscriber, "live subscriber disconnected");
}
