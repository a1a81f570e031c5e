// src/lib.rs
//! Live polls with one anonymous vote per browser.
//!
//! A poll has 2 to 10 options. Visitors get an opaque `voter_token` cookie
//! and may vote once per poll. Every committed vote is followed by a fresh
//! read of the poll's tally, which is pushed over WebSocket to everyone
//! viewing that poll.
//!
//! # Layout
//!
//! - [`ledger`] validates and records votes, one per `(poll, voter)`
//! - [`poll`] creates polls and reads their current tally
//! - [`rooms`] groups live connections by poll and fans tallies out
//! - [`store`] is the storage seam, with Postgres and in-memory backends
//! - [`routes`], [`handlers`], [`socket`], [`voter`] are the HTTP and
//!   WebSocket surface
//!
//! # Running
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/polls cargo run
//! ```
//!
//! Migrations in `migrations/` run at startup.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::Handle;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod poll;
pub mod rooms;
pub mod routes;
pub mod services;
pub mod socket;
pub mod state;
pub mod store;
pub mod voter;

use config::Config;
use error::StartupError;
use state::AppState;
use store::PgStore;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    fmt().with_env_filter(filter).init();
}

pub async fn start_server() -> Result<(), StartupError> {
    let config = Config::load()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&config).await?;
    db::migrate(&pool).await?;

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(frontend_url = %config.frontend_url, "Initializing state...");
    let state = AppState::new(config, Arc::new(PgStore::new(pool.clone())));
    let app = routes::create_routes(state);

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}");
    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    pool.close().await;
    info!("Database pool closed");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
