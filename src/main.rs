use popcast::broker::Broker;
use popcast::config::{Settings, load_config};
use popcast::transport::{AppState, serve};
use popcast::utils::error::ServerError;
use popcast::utils::logging;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return;
        }
    };

    logging::init(&config.log.level);

    if let Err(e) = run_server(config).await {
        error!("Server failed: {}", e);
    }
}

async fn run_server(config: Settings) -> Result<(), ServerError> {
    let (broker, broadcaster) = Broker::start(&config.broker);
    let listener = TcpListener::bind(config.bind_addr()).await?;
    let state = AppState::new(broker.clone(), config.broker.clone());

    tokio::select! {
        result = serve(listener, state) => {
            result?;
            error!("HTTP server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.shutdown();
    let _ = broadcaster.await;

    Ok(())
}
