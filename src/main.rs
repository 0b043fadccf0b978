use std::net::SocketAddr;

use alumni_hub::{gateways::Gateways, open_store, store::StorageBackend};
use axum::{http::Method, Extension};
use envconfig::Envconfig;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: Option<String>,
    #[envconfig(from = "STORAGE", default = "postgres")]
    pub storage: StorageBackend,
    #[envconfig(from = "PORT", default = "5000")]
    pub port: u16,
    #[envconfig(from = "DB_POOL_SIZE", default = "5")]
    pub pool_size: usize,
    #[envconfig(from = "UPLOADS_DIR", default = "uploads")]
    pub uploads_dir: String,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::init_from_env()?;
    let store = open_store(config.storage, config.db_url.as_deref(), config.pool_size).await?;
    tracing::info!(storage = %config.storage, "store ready");
    std::fs::create_dir_all(&config.uploads_dir)?;

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = alumni_hub::app(&config.uploads_dir)
        .layer(Extension(Gateways::new(store)))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
