use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use foosball_shared::protocol::{ClientMsg, ServerMsg, PROTOCOL_VERSION};

#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Connected,
    Disconnected,
    Message(ServerMsg),
    ProtocolMismatch { server: u32, client: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

type CmdSender = tokio::sync::mpsc::UnboundedSender<ClientMsg>;

/// WebSocket link to the relay, driven from a background thread.
///
/// The frame loop stays synchronous: outgoing messages are queued with
/// `send`, incoming ones collected with `poll_events`. A dropped link is
/// reported once and not retried.
pub struct ServerConnection {
    state: ConnectionState,
    protocol_mismatch: bool,
    event_rx: Mutex<Receiver<NetEvent>>,
    cmd_tx: Option<CmdSender>,
}

impl ServerConnection {
    pub fn connect(url: &url::Url) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<NetEvent>();
        let cmd_tx = spawn_network_thread(url.to_string(), event_tx);

        Self {
            state: ConnectionState::Connecting,
            protocol_mismatch: false,
            event_rx: Mutex::new(event_rx),
            cmd_tx: Some(cmd_tx),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn protocol_mismatch(&self) -> bool {
        self.protocol_mismatch
    }

    pub fn poll_events(&mut self) -> Vec<NetEvent> {
        let mut out = Vec::new();
        if let Ok(rx) = self.event_rx.lock() {
            while let Ok(evt) = rx.try_recv() {
                out.push(evt);
            }
        }
        for evt in &out {
            match evt {
                NetEvent::Connected => self.state = ConnectionState::Connected,
                NetEvent::Disconnected => self.state = ConnectionState::Disconnected,
                NetEvent::ProtocolMismatch { .. } => self.protocol_mismatch = true,
                NetEvent::Message(_) => {}
            }
        }
        out
    }

    /// Queue a message. Silently dropped once the link is gone.
    pub fn send(&self, msg: ClientMsg) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(msg);
        }
    }

    /// Close the socket and stop the network thread.
    pub fn close(&mut self) {
        self.cmd_tx = None;
    }
}

fn spawn_network_thread(url: String, event_tx: Sender<NetEvent>) -> CmdSender {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<ClientMsg>();

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to start network runtime: {}", e);
                let _ = event_tx.send(NetEvent::Disconnected);
                return;
            }
        };

        rt.block_on(async move {
            let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok(x) => x,
                Err(e) => {
                    tracing::warn!("Could not connect to {}: {}", url, e);
                    let _ = event_tx.send(NetEvent::Disconnected);
                    return;
                }
            };
            tracing::info!("Connected to {}", url);
            let _ = event_tx.send(NetEvent::Connected);

            let (mut write, mut read) = ws_stream.split();

            loop {
                tokio::select! {
                    biased;

                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else {
                            let _ = write.close().await;
                            break;
                        };
                        match serde_json::to_string(&cmd) {
                            Ok(text) => {
                                if write.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!("Failed to encode {}: {}", cmd.kind(), e),
                        }
                    }

                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(txt))) => {
                                let server_msg = match serde_json::from_str::<ServerMsg>(&txt) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        tracing::debug!("Ignoring unreadable message: {}", e);
                                        continue;
                                    }
                                };
                                if let ServerMsg::Init(init) = &server_msg {
                                    if init.protocol_version != PROTOCOL_VERSION {
                                        let _ = event_tx.send(NetEvent::ProtocolMismatch {
                                            server: init.protocol_version,
                                            client: PROTOCOL_VERSION,
                                        });
                                        let _ = write.close().await;
                                        break;
                                    }
                                }
                                let _ = event_tx.send(NetEvent::Message(server_msg));
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("Connection error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }

            tracing::info!("Disconnected from {}", url);
            let _ = event_tx.send(NetEvent::Disconnected);
        });
    });

    cmd_tx
}
