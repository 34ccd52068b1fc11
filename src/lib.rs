//! REST backend for an online pharmacy.
//!
//! Patients browse the catalogue, keep a cart, upload prescriptions and
//! check out. Pharmacists review prescriptions, move orders through their
//! lifecycle and keep stock current. Admins manage accounts, pharmacies,
//! branches and the catalogue, and see sales and inventory dashboards.

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod services;
pub mod state;
pub mod utils;

use state::AppState;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// The full application: every route plus a CORS policy that lets the
/// storefront at `cors_origin` send the session cookie.
pub fn app(state: AppState, cors_origin: &str) -> Result<Router, Error> {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>()?)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    Ok(handlers::router(state).layer(cors))
}

pub async fn serve(app: Router, port: u16) -> Result<(), Error> {
    let address = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&address).await?;
    log::info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
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
}
