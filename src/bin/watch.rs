//! # Agora Watch
//!
//! Follows one debate session from the terminal.
//!
//! Usage: `watch <session-id> [start|pause|stop|status]`

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use log::info;
use std::time::Duration;

use agora::core::Config;
use agora::ipc::{connect_with_retry, ObserverEvent};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = std::env::args().skip(1);
    let session_id = args
        .next()
        .ok_or_else(|| anyhow!("usage: watch <session-id> [start|pause|stop|status]"))?;
    let action = args.next();

    let mut client = connect_with_retry(&config.socket_path, 3, Duration::from_secs(2)).await?;
    info!("Connected to {}", config.socket_path);

    client.subscribe(&session_id).await?;
    match action.as_deref() {
        None => {}
        Some("start") => {
            client.start_session(&session_id).await?;
        }
        Some("pause") => {
            client.pause_session(&session_id).await?;
        }
        Some("stop") => {
            client.stop_session(&session_id).await?;
        }
        Some("status") => {
            client.get_status(&session_id).await?;
        }
        Some(other) => return Err(anyhow!("unknown action: {}", other)),
    }

    while let Some(event) = client.recv().await {
        match event {
            ObserverEvent::Subscribed { session_id } => println!("Watching session {}", session_id),
            ObserverEvent::SessionStatus { status, .. } => println!("[status] {}", status),
            ObserverEvent::NewMessage { round, turn, message, .. } => {
                println!(
                    "\n[round {} turn {}] {} ({} words)\n{}",
                    round, turn, message.participant_id, message.word_count, message.content
                );
            }
            ObserverEvent::DebateCompleted { winner, totals, summary, .. } => {
                println!("\n[completed] winner: {} (pro {} / con {})", winner, totals.pro, totals.con);
                println!("{}", summary);
                break;
            }
            ObserverEvent::CommandResponse { success, message, data, .. } => {
                let message = message.unwrap_or_default();
                if success {
                    println!("[ok] {}", message);
                    if let Some(data) = data {
                        println!("{}", serde_json::to_string_pretty(&data)?);
                    }
                } else {
                    println!("[failed] {}", message);
                }
                if action.as_deref() == Some("status") {
                    break;
                }
            }
            ObserverEvent::Error { error, .. } => eprintln!("[error] {}", error),
            ObserverEvent::DebateUpdate { .. }
            | ObserverEvent::Unsubscribed { .. }
            | ObserverEvent::Pong { .. } => {}
        }
    }

    Ok(())
}
