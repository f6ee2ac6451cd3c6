//! WebSocket server implementation.
//!
//! Accepts WebSocket connections at `/ws`. Each category a client subscribes
//! to gets its own forwarder task that owns the ledger subscription and
//! writes tally frames to the shared socket sink. A client disconnecting
//! aborts only its own forwarders.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ballot_ledger::{TallySubscription, VoteLedger};
use ballot_types::CategoryId;

use crate::subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage};

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared state for the WebSocket server.
pub struct WsState {
    pub ledger: Arc<VoteLedger>,
}

impl WsState {
    pub fn new(ledger: Arc<VoteLedger>) -> Self {
        Self { ledger }
    }
}

/// The `/ws` route over `state`.
pub fn router(state: Arc<WsState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// The WebSocket server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    pub fn new(port: u16, ledger: Arc<VoteLedger>) -> Self {
        Self::with_state(port, Arc::new(WsState::new(ledger)))
    }

    pub fn with_state(port: u16, state: Arc<WsState>) -> Self {
        Self { port, state }
    }

    /// Start listening for WebSocket connections. Runs until the server
    /// fails or `shutdown` resolves.
    pub async fn start(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), WsError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| WsError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("WebSocket server listening on {}", addr);
        axum::serve(listener, router(Arc::clone(&self.state)))
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection until the client goes away.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSink = Arc::new(Mutex::new(ws_sender));
    let mut subs = ClientSubscriptions::new();

    debug!("New WebSocket client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_text_message(&text, &state, &mut subs, &ws_sender).await;
            }
            Message::Close(_) => {
                debug!("Client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    debug!(subscriptions = subs.len(), "WebSocket client disconnected");
    subs.clear();
}

/// Process a text frame from the client.
async fn handle_text_message(
    text: &str,
    state: &Arc<WsState>,
    subs: &mut ClientSubscriptions,
    ws_sender: &WsSink,
) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            send(
                ws_sender,
                &ServerMessage::Error {
                    message: format!("Invalid message: {}", e),
                },
            )
            .await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Subscribe { category_id } => {
            let ledger = Arc::clone(&state.ledger);
            let opened =
                tokio::task::spawn_blocking(move || ledger.subscribe(category_id)).await;
            let subscription = match opened {
                Ok(Ok(subscription)) => subscription,
                Ok(Err(e)) => {
                    send(ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "subscribe task failed");
                    send(
                        ws_sender,
                        &ServerMessage::Error {
                            message: "subscription failed".to_string(),
                        },
                    )
                    .await;
                    return;
                }
            };

            // Ack first so the initial tally frame follows it.
            send(
                ws_sender,
                &ServerMessage::Ack {
                    action: "subscribe".to_string(),
                    category_id,
                },
            )
            .await;
            let handle = tokio::spawn(forward_tallies(subscription, Arc::clone(ws_sender)));
            subs.insert(category_id, handle);
            debug!(category = %category_id, "client subscribed");
        }
        ClientMessage::Unsubscribe { category_id } => {
            let reply = if subs.remove(category_id) {
                ServerMessage::Ack {
                    action: "unsubscribe".to_string(),
                    category_id,
                }
            } else {
                ServerMessage::Error {
                    message: format!("Not subscribed to category {}", category_id),
                }
            };
            send(ws_sender, &reply).await;
            debug!(category = %category_id, "client unsubscribed");
        }
        ClientMessage::Ping => {
            send(ws_sender, &ServerMessage::Pong).await;
        }
    }
}

/// Forwarder task: writes every snapshot the subscription yields to the
/// client. Coalescing happens in the subscription, so a slow client gets
/// fewer, newer frames rather than a backlog.
async fn forward_tallies(mut subscription: TallySubscription, ws_sender: WsSink) {
    let category: CategoryId = subscription.category();
    let mut last_sequence: Option<u64> = None;
    while let Some(snapshot) = subscription.next().await {
        if let Some(last) = last_sequence {
            let skipped = snapshot.sequence.saturating_sub(last).saturating_sub(1);
            if skipped > 0 {
                debug!(category = %category, skipped, "slow client, tally updates coalesced");
            }
        }
        last_sequence = Some(snapshot.sequence);
        if !send(&ws_sender, &ServerMessage::Tally { snapshot }).await {
            debug!(category = %category, "client gone, stopping forwarder");
            return;
        }
    }
    send(&ws_sender, &ServerMessage::Closed { category_id: category }).await;
    debug!(category = %category, "tally channel closed");
}

/// Serialize and send a frame. Returns `false` if the client is gone.
async fn send(ws_sender: &WsSink, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode server message");
            return true;
        }
    };
    let mut sender = ws_sender.lock().await;
    sender.send(Message::Text(text)).await.is_ok()
}
