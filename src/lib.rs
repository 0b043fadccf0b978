use std::{io, sync::Arc};

use axum::{http::StatusCode, routing::get_service, Router};
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::services::ServeDir;

pub mod api;
pub mod error;
pub mod gateways;
pub mod models;
pub mod record;
pub mod schema;
pub mod store;

use gateways::Gateways;
use store::{MemoryStore, PgStore, StorageBackend, Store};

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn connect_to_db(db_url: &str, max_size: usize) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .max_size(max_size)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build database pool: {e}"))
}

/// Builds the configured store. The PostgreSQL variant creates any missing
/// tables before it is handed out.
pub async fn open_store(
    backend: StorageBackend,
    db_url: Option<&str>,
    pool_size: usize,
) -> anyhow::Result<Arc<dyn Store>> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Postgres => {
            let db_url =
                db_url.ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for postgres"))?;
            let store = PgStore::new(connect_to_db(db_url, pool_size)?);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

pub fn app(uploads_dir: &str) -> Router {
    let serve = get_service(ServeDir::new(uploads_dir)).handle_error(handle_error);
    Router::new()
        .merge(api::root())
        .nest("/api", api::app())
        .nest("/uploads", serve)
}

pub fn app_with(gateways: Gateways, uploads_dir: &str) -> Router {
    app(uploads_dir).layer(axum::Extension(gateways))
}

async fn handle_error(_: io::Error) -> error::AppError {
    error::AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch upload")
}
