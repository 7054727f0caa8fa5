use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use foosball_shared::protocol::{ClientMsg, PeerId, ServerMsg};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::relay::{Delivery, RelayCommand};
use crate::session::Seat;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub relay_tx: mpsc::Sender<RelayCommand>,
    pub delivery_tx: broadcast::Sender<Delivery>,
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

/// What to do with one inbound frame.
enum Frame {
    Msg(ClientMsg),
    Skip,
    Close,
}

/// Per-connection guard against oversized and unparsable frames.
struct FrameGuard {
    max_message_bytes: usize,
    max_parse_errors: u32,
    parse_errors: u32,
}

impl FrameGuard {
    fn new(app_state: &AppState) -> Self {
        Self {
            max_message_bytes: app_state.max_message_bytes,
            max_parse_errors: app_state.max_parse_errors,
            parse_errors: 0,
        }
    }

    fn inspect(&mut self, peer: &PeerId, msg: Option<Result<Message, axum::Error>>) -> Frame {
        match msg {
            Some(Ok(Message::Text(text))) => {
                if text.len() > self.max_message_bytes {
                    tracing::warn!(
                        "Peer {} sent {} bytes (limit {}), closing",
                        peer,
                        text.len(),
                        self.max_message_bytes
                    );
                    return Frame::Close;
                }
                match serde_json::from_str::<ClientMsg>(text.as_str()) {
                    Ok(msg) => Frame::Msg(msg),
                    Err(e) => {
                        self.parse_errors += 1;
                        tracing::warn!("Peer {} sent malformed message: {}", peer, e);
                        if self.parse_errors >= self.max_parse_errors {
                            tracing::warn!("Peer {} hit the parse error limit, closing", peer);
                            Frame::Close
                        } else {
                            Frame::Skip
                        }
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => Frame::Close,
            Some(Err(e)) => {
                tracing::debug!("Peer {} socket error: {}", peer, e);
                Frame::Close
            }
            Some(Ok(_)) => Frame::Skip, // Ignore ping/pong/binary
        }
    }
}

async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode {:?}: {}", msg, e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before joining so nothing fanned out after the join is missed.
    let delivery_rx = app_state.delivery_tx.subscribe();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .relay_tx
        .send(RelayCommand::Join { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let outcome = match resp_rx.await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!("Failed to receive join outcome");
            return;
        }
    };
    let my_id = outcome.id.clone();
    tracing::info!("Peer {} connected", my_id);

    let mut greeted = send_msg(&mut sink, &outcome.greeting).await;
    if let (true, Some(catch_up)) = (greeted, &outcome.catch_up) {
        greeted = send_msg(&mut sink, catch_up).await;
    }
    if greeted {
        match outcome.seat {
            Seat::Side(_) => {
                relay_loop(&my_id, &mut sink, &mut stream, delivery_rx, &app_state).await
            }
            Seat::Spectator => {
                drop(delivery_rx);
                spectator_loop(&my_id, &mut stream, &app_state).await
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;

    // Cleanup on disconnect
    let _ = app_state
        .relay_tx
        .send(RelayCommand::Leave { id: my_id.clone() })
        .await;
    tracing::info!("Peer {} disconnected", my_id);
}

async fn relay_loop(
    my_id: &PeerId,
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    mut delivery_rx: broadcast::Receiver<Delivery>,
    app_state: &AppState,
) {
    let mut guard = FrameGuard::new(app_state);

    loop {
        tokio::select! {
            // Client -> Relay
            msg = stream.next() => {
                match guard.inspect(my_id, msg) {
                    Frame::Msg(msg) => {
                        tracing::trace!("Peer {} -> {}", my_id, msg.kind());
                        let cmd = RelayCommand::Inbound { from: my_id.clone(), msg };
                        if app_state.relay_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Frame::Skip => {}
                    Frame::Close => break,
                }
            }

            // Relay -> Client
            result = delivery_rx.recv() => {
                match result {
                    Ok(delivery) => {
                        if !delivery.is_for(my_id) {
                            continue;
                        }
                        if !send_msg(sink, &delivery.msg).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Peer {} lagged by {} messages", my_id, n);
                        // Later updates supersede the dropped ones
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Spectators get nothing after their greeting; just wait for them to leave.
async fn spectator_loop(my_id: &PeerId, stream: &mut SplitStream<WebSocket>, app_state: &AppState) {
    let mut guard = FrameGuard::new(app_state);
    loop {
        match guard.inspect(my_id, stream.next().await) {
            Frame::Msg(msg) => tracing::debug!("Ignoring {} from spectator {}", msg.kind(), my_id),
            Frame::Skip => {}
            Frame::Close => break,
        }
    }
}
