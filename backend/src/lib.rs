//! Basha Lagbe rental marketplace backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware, Router,
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir};

pub mod auth;
pub mod codes;
pub mod config;
pub mod error;
pub mod extract;
pub mod mail;
pub mod models;
pub mod notify;
pub mod request_log;
pub mod routes;
pub mod schema;
pub mod search;
pub mod state;
pub mod store;

use config::AppConfig;
use state::AppState;
use store::{MemoryStore, PgStore, Store};

/// Expired verification codes are swept this often.
const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = match state.config.client_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            log::warn!(
                "CLIENT_ORIGIN {:?} is not a valid header value, CORS disabled",
                state.config.client_origin
            );
            CorsLayer::new()
        }
    }
    .allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    .allow_credentials(true)
    .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .nest("/api", routes::api(state.clone()))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(middleware::from_fn(request_log::log_requests))
        .layer(cors)
        .with_state(state)
}

/// Builds the configured store.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>, store::StoreError> {
    if config.uses_memory_store() {
        log::warn!("Using the in-memory store, data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(PgStore::connect(
        &config.database_url,
        config.db_pool_size,
    )?))
}

/// Deletes expired verification codes on a fixed interval.
pub fn spawn_code_purge(store: Arc<dyn Store>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match store.purge_expired_verifications(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => log::info!("Purged {} expired verification codes", purged),
                Err(e) => log::warn!("Failed to purge verification codes: {}", e),
            }
        }
    })
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config)?;
    let mailer = mail::from_config(&config);
    let address = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, store.clone(), mailer);

    let purge = spawn_code_purge(store);

    let listener = TcpListener::bind(&address).await?;
    log::info!("Server running on {}", address);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
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
