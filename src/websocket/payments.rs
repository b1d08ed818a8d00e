use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, timeout, Duration};

use crate::{
    api::AppState,
    constants::{WS_CLIENT_TIMEOUT_SECS, WS_HEARTBEAT_INTERVAL_SECS},
    services::PaymentEvent,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFilter {
    pub invoice_id: Option<String>,
}

impl StreamFilter {
    fn matches(&self, event: &PaymentEvent) -> bool {
        match self.invoice_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => event.invoice_id() == id,
            _ => true,
        }
    }
}

fn connected_payload(filter: &StreamFilter) -> String {
    serde_json::json!({
        "type": "connected",
        "message": "Connected to payment stream",
        "invoiceId": filter.invoice_id,
    })
    .to_string()
}

/// WebSocket handler streaming invoice watch progress
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(filter): Query<StreamFilter>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: AppState, filter: StreamFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscriptions.subscribe();

    if sender
        .send(Message::Text(connected_payload(&filter).into()))
        .await
        .is_err()
    {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if !filter.matches(&event) {
                                continue;
                            }
                            let json = match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(err) => {
                                    tracing::error!(error = %err, "failed to encode payment event");
                                    continue;
                                }
                            };
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "payment stream subscriber lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        loop {
            let next_msg = timeout(Duration::from_secs(WS_CLIENT_TIMEOUT_SECS), receiver.next()).await;
            let msg = match next_msg {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_) => {
                    tracing::info!("payment stream client timeout");
                    break;
                }
            };

            match msg {
                Message::Text(text) => tracing::debug!("Received: {}", text),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!("payment stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(invoice_id: &str) -> PaymentEvent {
        PaymentEvent::Attempt {
            invoice_id: invoice_id.to_string(),
            attempt: 1,
            max_attempts: 60,
            state: None,
            error: None,
        }
    }

    #[test]
    fn filter_limits_stream_to_one_invoice() {
        let filter = StreamFilter {
            invoice_id: Some("inv_abc123".into()),
        };
        assert!(filter.matches(&attempt("inv_abc123")));
        assert!(!filter.matches(&attempt("inv_xyz789")));

        let blank = StreamFilter {
            invoice_id: Some("  ".into()),
        };
        assert!(blank.matches(&attempt("inv_xyz789")));
        assert!(StreamFilter::default().matches(&attempt("inv_xyz789")));
    }

    #[test]
    fn connected_payload_has_type() {
        let payload = connected_payload(&StreamFilter::default());
        assert!(payload.contains("\"type\":\"connected\""));
    }
}
