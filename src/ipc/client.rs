//! # Observer Client
//!
//! Unix socket client used by the `watch` binary and tests.

use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use crate::ipc::protocol::{encode_message, read_frame, ObserverCommand, ObserverEvent};

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ObserverClient {
    event_rx: mpsc::Receiver<ObserverEvent>,
    command_tx: mpsc::Sender<ObserverCommand>,
    connected: Arc<AtomicBool>,
}

impl ObserverClient {
    pub async fn connect(socket_path: &str) -> Result<Self> {
        info!("Connecting to observer server at {}", socket_path);

        let stream = timeout(CONNECT_TIMEOUT, UnixStream::connect(socket_path))
            .await
            .map_err(|_| anyhow!("Connection timeout"))?
            .map_err(|e| anyhow!("Failed to connect: {}", e))?;

        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::connection_loop(
            stream,
            event_tx,
            command_rx,
            connected.clone(),
        ));

        Ok(ObserverClient {
            event_rx,
            command_tx,
            connected,
        })
    }

    /// Reads events and writes commands until either side closes
    async fn connection_loop(
        stream: UnixStream,
        event_tx: mpsc::Sender<ObserverEvent>,
        mut command_rx: mpsc::Receiver<ObserverCommand>,
        connected: Arc<AtomicBool>,
    ) {
        let (mut reader, mut writer) = stream.into_split();

        let write_connected = connected.clone();
        let write_handle = tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                let data = match encode_message(&cmd) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to encode command: {}", e);
                        continue;
                    }
                };
                if let Err(e) = writer.write_all(&data).await {
                    error!("Failed to write command: {}", e);
                    write_connected.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        loop {
            let buf = match read_frame(&mut reader).await {
                Ok(Some(buf)) => buf,
                Ok(None) => break,
                Err(e) => {
                    error!("Read error: {}", e);
                    break;
                }
            };

            match serde_json::from_slice::<ObserverEvent>(&buf) {
                Ok(event) => {
                    if event_tx.send(event).await.is_err() {
                        debug!("Event receiver closed");
                        break;
                    }
                }
                Err(e) => warn!("Failed to parse event: {}", e),
            }
        }

        connected.store(false, Ordering::SeqCst);
        write_handle.abort();
        info!("Observer connection closed");
    }

    pub fn try_recv(&mut self) -> Option<ObserverEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Next event; `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<ObserverEvent> {
        self.event_rx.recv().await
    }

    pub async fn send(&self, cmd: ObserverCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|e| anyhow!("Failed to send command: {}", e))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn ping(&self) -> Result<()> {
        self.send(ObserverCommand::Ping).await
    }

    pub async fn subscribe(&self, session_id: &str) -> Result<()> {
        self.send(ObserverCommand::Subscribe {
            session_id: session_id.to_string(),
        })
        .await
    }

    pub async fn unsubscribe(&self, session_id: &str) -> Result<()> {
        self.send(ObserverCommand::Unsubscribe {
            session_id: session_id.to_string(),
        })
        .await
    }

    /// Control commands return the request id echoed in the `command_response`
    pub async fn start_session(&self, session_id: &str) -> Result<String> {
        let request_id = new_request_id();
        self.send(ObserverCommand::StartSession {
            request_id: Some(request_id.clone()),
            session_id: session_id.to_string(),
        })
        .await?;
        Ok(request_id)
    }

    pub async fn pause_session(&self, session_id: &str) -> Result<String> {
        let request_id = new_request_id();
        self.send(ObserverCommand::PauseSession {
            request_id: Some(request_id.clone()),
            session_id: session_id.to_string(),
        })
        .await?;
        Ok(request_id)
    }

    pub async fn stop_session(&self, session_id: &str) -> Result<String> {
        let request_id = new_request_id();
        self.send(ObserverCommand::StopSession {
            request_id: Some(request_id.clone()),
            session_id: session_id.to_string(),
        })
        .await?;
        Ok(request_id)
    }

    pub async fn get_status(&self, session_id: &str) -> Result<String> {
        let request_id = new_request_id();
        self.send(ObserverCommand::GetStatus {
            request_id: Some(request_id.clone()),
            session_id: session_id.to_string(),
        })
        .await?;
        Ok(request_id)
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Try to connect with retries
pub async fn connect_with_retry(
    socket_path: &str,
    max_attempts: u32,
    delay: Duration,
) -> Result<ObserverClient> {
    let mut last_error = anyhow!("no connection attempts made");
    for attempt in 1..=max_attempts {
        match ObserverClient::connect(socket_path).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                if attempt < max_attempts {
                    warn!(
                        "Connection attempt {} failed: {}. Retrying in {:?}...",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = e;
            }
        }
    }
    Err(anyhow!(
        "Failed to connect after {} attempts: {}",
        max_attempts,
        last_error
    ))
}
