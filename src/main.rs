use std::{env, sync::Arc};

use jam_collab::Collab;
use jam_core::Config;
use jam_impls::{Catalog, SimulatedConnector};
use jam_server::{run_server, DEFAULT_PORT};
use log::{error, info};
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum JamError {
    #[error("JAM_SERVER_PORT must be a port number, got {0}")]
    InvalidPort(String),
    #[error("Could not initialize logging: {0}")]
    Logging(#[from] log::SetLoggerError),
    #[error("Server failed: {0}")]
    Server(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        eprintln!("{}", e);

        std::process::exit(1);
    }
}

async fn run() -> Result<(), JamError> {
    let verbose = env::var("JAM_DEBUG").is_ok_and(|x| !x.is_empty() && x != "0");
    logging::init_logger(verbose)?;

    let port = match env::var("JAM_SERVER_PORT") {
        Ok(port) => port.parse::<u16>().map_err(|_| JamError::InvalidPort(port))?,
        Err(_) => DEFAULT_PORT,
    };

    let config = Config::default();
    info!("Starting with {:?}", config);

    // Every host plays on a simulated account until a streaming connector is configured
    let connector = Arc::new(SimulatedConnector::new(Catalog::demo()));
    let collab = Arc::new(Collab::new(config, connector));

    tokio::select! {
        result = run_server(collab.clone(), port) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
    }

    collab.shutdown().await;
    Ok(())
}
