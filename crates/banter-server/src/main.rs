//! # banter-server
//!
//! Presence-aware real-time messaging gateway.
//!
//! This binary provides:
//! - **WebSocket gateway** with optional bearer authentication in the
//!   handshake; authenticated connections are registered per principal
//! - **Presence broadcasting**: full online-set snapshots to every open
//!   connection on each change
//! - **Delivery routing**: durable persistence of direct messages plus
//!   best-effort pushes to every active handle of the recipient
//! - **REST API** (axum) for conversation history, unread counts,
//!   bulk read-marking, sender-only soft deletion, and attachment upload

mod api;
mod auth;
mod config;
mod error;
mod gateway;
mod presence;
mod registry;
mod router;
mod store;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use banter_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::presence::PresenceBroadcaster;
use crate::registry::{ConnectionLinks, ConnectionRegistry};
use crate::router::DeliveryRouter;
use crate::store::MessageStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,banter_server=debug")),
        )
        .init();

    info!("Starting banter gateway v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    let http_addr = config.http_addr;

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let database = Database::open_at(&config.database_path)?;
    let store = MessageStore::new(database);

    let registry = Arc::new(ConnectionRegistry::new());
    let links = Arc::new(ConnectionLinks::new());
    let presence = PresenceBroadcaster::new(registry.clone(), links.clone());
    let router = Arc::new(DeliveryRouter::new(
        store.clone(),
        registry.clone(),
        links.clone(),
    ));

    let state = AppState {
        config: Arc::new(config),
        store,
        registry,
        links,
        presence,
        router,
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP + WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
