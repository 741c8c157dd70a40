//! Alert output stream
//!
//! Pushes every tone, vibration, and visual output as JSON to connected
//! dashboards. Slow clients skip outputs rather than stall delivery.

use alerting::ChannelOutput;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::SharedState;

/// Upgrade to an alert output stream
pub async fn alert_socket(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    let outputs = state.read().await.alert_outputs.subscribe();
    ws.on_upgrade(move |socket| stream_alerts(socket, outputs))
}

async fn stream_alerts(mut socket: WebSocket, mut outputs: broadcast::Receiver<ChannelOutput>) {
    info!("Alert stream subscriber connected");

    loop {
        tokio::select! {
            output = outputs.recv() => {
                let output = match output {
                    Ok(output) => output,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Alert stream subscriber lagged, skipped {} outputs", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let text = match serde_json::to_string(&output) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize alert output: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("Alert stream socket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    info!("Alert stream subscriber disconnected");
}
