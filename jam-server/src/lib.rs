mod auth;
mod context;
mod errors;
mod jams;
mod schemas;
mod ws;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::Router;
use jam_collab::Collab;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::*;
pub use errors::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Builds the HTTP surface of the jam system.
pub fn router(collab: Arc<Collab>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new().nest("/jams", jams::router());

    Router::new()
        .nest("/v1", version_one_router)
        .layer(cors)
        .with_state(ServerContext { collab })
}

/// Starts the jam server and serves until the process is stopped.
pub async fn run_server(collab: Arc<Collab>, port: u16) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(collab).into_make_service()).await
}
