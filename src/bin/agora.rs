use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use agora::core::Config;
use agora::database::Database;
use agora::features::providers::DefaultProviderFactory;
use agora::features::roster::RosterConfig;
use agora::features::debate::DebateController;
use agora::ipc::{Broadcaster, ObserverServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Agora debate server...");

    let database = Database::new(&config.database_path).await?;

    let roster = RosterConfig::load_optional(&config.roster_path)?;
    roster.seed(&database).await?;

    let factory = DefaultProviderFactory::new(config.provider_timeout)?;
    let controller = DebateController::new(
        Arc::new(database),
        Arc::new(factory),
        Arc::new(Broadcaster::new()),
        config.turn_delay,
    );

    let server = Arc::new(ObserverServer::new(controller.clone(), config.socket_path.clone()));
    if let Err(e) = server.clone().start().await {
        error!("Failed to start observer server: {}", e);
        return Err(e);
    }

    for seed in &roster.sessions {
        info!("Session available: {} ({})", seed.id, seed.topic);
    }

    tokio::signal::ctrl_c().await?;
    info!(
        "Shutting down with {} active sessions and {} observers",
        controller.active_sessions(),
        server.client_count()
    );
    server.shutdown();
    Ok(())
}
