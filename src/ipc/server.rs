//! # Observer Server
//!
//! Unix socket server for observers: subscriptions to live session updates
//! plus a small set of control commands routed through the controller.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.4.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Control commands answered with `command_response`
//! - 1.0.0: Subscribe/unsubscribe/ping over length-prefixed JSON

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::core::DebateError;
use crate::features::debate::DebateController;
use crate::ipc::broadcaster::{ChannelConnection, ObserverConnection};
use crate::ipc::protocol::{frame, read_frame, ObserverCommand, ObserverEvent};

/// Maximum number of connected observers
pub const MAX_CLIENTS: usize = 32;

pub struct ObserverServer {
    controller: DebateController,
    socket_path: String,
    client_count: AtomicUsize,
}

impl ObserverServer {
    pub fn new(controller: DebateController, socket_path: impl Into<String>) -> Self {
        Self {
            controller,
            socket_path: socket_path.into(),
            client_count: AtomicUsize::new(0),
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }

    /// Bind the socket and run the accept loop in a background task
    pub async fn start(self: Arc<Self>) -> Result<()> {
        // Remove a stale socket left by a previous run
        if std::path::Path::new(&self.socket_path).exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("Observer server listening on {}", self.socket_path);

        let server = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let count = server.client_count.load(Ordering::SeqCst);
                        if count >= MAX_CLIENTS {
                            warn!("Maximum observers reached ({}), rejecting connection", MAX_CLIENTS);
                            continue;
                        }
                        server.client_count.fetch_add(1, Ordering::SeqCst);
                        info!("Observer connected (total: {})", count + 1);

                        let handler = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handler.clone().handle_client(stream).await {
                                debug!("Observer handler ended: {}", e);
                            }
                            handler.client_count.fetch_sub(1, Ordering::SeqCst);
                            info!("Observer disconnected");
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept observer connection: {}", e);
                    }
                }
            }
        });

        Ok(())
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("Could not remove socket {}: {}", self.socket_path, e);
        }
    }

    async fn handle_client(self: Arc<Self>, stream: UnixStream) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let conn = Arc::new(ChannelConnection::new(tx));

        // Replies and broadcast events share one ordered outbound queue
        let write_handle = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let data = match frame(payload.as_bytes()) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to frame event: {}", e);
                        continue;
                    }
                };
                if let Err(e) = writer.write_all(&data).await {
                    debug!("Failed to write to observer: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    debug!("Failed to flush to observer: {}", e);
                    break;
                }
            }
        });

        let outcome = loop {
            let buf = match read_frame(&mut reader).await {
                Ok(Some(buf)) => buf,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let reply = match serde_json::from_slice::<ObserverCommand>(&buf) {
                Ok(cmd) => {
                    debug!("Observer {} sent {:?}", conn.id(), cmd);
                    self.handle_command(cmd, &conn).await
                }
                Err(e) => {
                    warn!("Malformed observer command: {}", e);
                    ObserverEvent::error(None, "Invalid message format")
                }
            };
            if send(conn.as_ref(), &reply).is_err() {
                break Ok(());
            }
        };

        self.controller.broadcaster().remove_connection(conn.id());
        write_handle.abort();
        outcome
    }

    async fn handle_command(
        &self,
        cmd: ObserverCommand,
        conn: &Arc<ChannelConnection>,
    ) -> ObserverEvent {
        let broadcaster = self.controller.broadcaster();
        match cmd {
            ObserverCommand::Subscribe { session_id } => {
                broadcaster.subscribe(&session_id, conn.clone());
                ObserverEvent::Subscribed { session_id }
            }
            ObserverCommand::Unsubscribe { session_id } => {
                broadcaster.unsubscribe(&session_id, conn.id());
                ObserverEvent::Unsubscribed { session_id }
            }
            ObserverCommand::Ping => ObserverEvent::Pong {
                timestamp: Utc::now().timestamp_millis(),
            },
            ObserverCommand::StartSession {
                request_id,
                session_id,
            } => respond(request_id, "Session started", self.controller.start(&session_id).await),
            ObserverCommand::PauseSession {
                request_id,
                session_id,
            } => respond(request_id, "Session paused", self.controller.pause(&session_id).await),
            ObserverCommand::StopSession {
                request_id,
                session_id,
            } => respond(request_id, "Session stopped", self.controller.stop(&session_id).await),
            ObserverCommand::GetStatus {
                request_id,
                session_id,
            } => respond(request_id, "Session status", self.controller.status(&session_id).await),
        }
    }
}

fn send(conn: &dyn ObserverConnection, event: &ObserverEvent) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    conn.send(&payload)
}

fn respond<T: Serialize>(
    request_id: Option<String>,
    ok_message: &str,
    outcome: Result<T, DebateError>,
) -> ObserverEvent {
    match outcome {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => ObserverEvent::CommandResponse {
                request_id,
                success: true,
                message: Some(ok_message.to_string()),
                data: Some(data),
            },
            Err(e) => ObserverEvent::CommandResponse {
                request_id,
                success: false,
                message: Some(format!("Failed to encode response: {}", e)),
                data: None,
            },
        },
        Err(e) => ObserverEvent::CommandResponse {
            request_id,
            success: false,
            message: Some(e.to_string()),
            data: None,
        },
    }
}
