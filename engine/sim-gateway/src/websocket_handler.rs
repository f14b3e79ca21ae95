//! WebSocket connection handler for the SimGateway

use crate::error::{GatewayError, GatewayResult};
use crate::messages::{encode_event, parse_command, Message as ApiMessage};

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use sync_coordinator::{SessionId, SyncCoordinator};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// Serves one viewer connection as one coordinator session
pub struct WebSocketHandler {
    peer_addr: SocketAddr,
    coordinator: Arc<SyncCoordinator>,
    reply_queue_capacity: usize,
}

impl WebSocketHandler {
    pub fn new(
        peer_addr: SocketAddr,
        coordinator: Arc<SyncCoordinator>,
        reply_queue_capacity: usize,
    ) -> Self {
        Self { peer_addr, coordinator, reply_queue_capacity: reply_queue_capacity.max(1) }
    }

    /// Handle the WebSocket connection until either side closes it
    pub async fn handle(&self, stream: TcpStream) -> GatewayResult<()> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (session_id, mut events) = self.coordinator.connect();
        info!(peer = %self.peer_addr, session_id = %session_id, "WebSocket session opened");

        // Replies to this connection's own requests. A peer that stops reading fills it.
        let (tx, mut rx) = mpsc::channel::<WsMessage>(self.reply_queue_capacity);

        let sender_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => match encode_event(&event) {
                            Ok(text) => WsMessage::Text(text),
                            Err(e) => {
                                error!(event = event.name(), error = %e, "Failed to encode event");
                                continue;
                            }
                        },
                        // Session dropped by the coordinator or shutting down
                        None => WsMessage::Close(None),
                    },
                    reply = rx.recv() => match reply {
                        Some(reply) => reply,
                        None => break,
                    },
                };

                let closing = matches!(message, WsMessage::Close(_));
                if let Err(e) = ws_sender.send(message).await {
                    debug!(error = %e, "Failed to send WebSocket message");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(WsMessage::Close(_)) => {
                    debug!(peer = %self.peer_addr, "Received close message");
                    break;
                }
                Ok(message) => {
                    if let Some(reply) = self.handle_message(session_id, message) {
                        match tx.try_send(reply) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                warn!(
                                    peer = %self.peer_addr,
                                    session_id = %session_id,
                                    capacity = self.reply_queue_capacity,
                                    "Reply queue full, closing slow connection"
                                );
                                metrics::counter!("orrery_gateway_slow_connections_closed_total", 1);
                                break;
                            }
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                }
                Err(e) => {
                    warn!(peer = %self.peer_addr, error = %e, "WebSocket error");
                    break;
                }
            }
        }

        self.coordinator.disconnect(session_id);
        drop(tx);
        sender_task.abort();

        info!(peer = %self.peer_addr, session_id = %session_id, "WebSocket session closed");
        Ok(())
    }

    /// Handle one incoming frame, returning the frame to send back if any
    fn handle_message(&self, session_id: SessionId, message: WsMessage) -> Option<WsMessage> {
        match message {
            WsMessage::Text(text) => {
                debug!(session_id = %session_id, "Received text message: {}", text);
                let response = self.handle_text_message(session_id, &text);
                match serde_json::to_string(&response) {
                    Ok(json) => Some(WsMessage::Text(json)),
                    Err(e) => {
                        error!(error = %e, "Failed to encode response");
                        None
                    }
                }
            }
            WsMessage::Binary(_) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
                None
            }
            WsMessage::Ping(data) => Some(WsMessage::Pong(data)),
            WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => None,
        }
    }

    /// Parse and submit one request. Failures become error responses; the clock is untouched.
    fn handle_text_message(&self, session_id: SessionId, text: &str) -> ApiMessage {
        let request: ApiMessage = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => return ApiMessage::failure(None, &e.into()),
        };

        let result = parse_command(&request, self.coordinator.catalog())
            .and_then(|command| {
                self.coordinator.submit(session_id, command).map_err(GatewayError::from)
            });

        match result {
            Ok(()) => ApiMessage::accepted(request.id),
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Request failed");
                metrics::counter!("orrery_gateway_request_errors_total", 1);
                ApiMessage::failure(request.id, &e)
            }
        }
    }
}
