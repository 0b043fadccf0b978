use std::borrow::Cow;

use axum::{http::StatusCode, routing::get, Extension, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    gateways::Gateways,
    record::Record,
};

pub mod contact;
pub mod events;
pub mod members;
pub mod news;
pub mod scholarships;
pub mod search;
pub mod stats;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn data<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

pub fn message_with<T>(message: impl Into<Cow<'static, str>>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data: Some(data),
    })
}

pub fn message(message: impl Into<Cow<'static, str>>) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data: None,
    })
}

/// Parses an optional `limit` query value; junk counts as absent.
fn parse_limit(limit: Option<&str>) -> Option<i64> {
    limit.and_then(|l| l.trim().parse::<i64>().ok()).filter(|l| *l > 0)
}

fn require(value: &str, what: &'static str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::from(
            StatusCode::BAD_REQUEST,
            format!("{what} must not be empty"),
        ));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace.
fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let valid = |s: &str| !s.is_empty() && !s.contains(char::is_whitespace) && !s.contains('@');
    match domain.rsplit_once('.') {
        Some((host, tld)) => valid(local) && valid(host) && valid(tld),
        None => false,
    }
}

fn require_email(email: &str) -> AppResult<()> {
    if !is_email(email) {
        return Err(AppError::from(
            StatusCode::BAD_REQUEST,
            "a valid email address is required",
        ));
    }
    Ok(())
}

/// Copies only `fields` out of `record`.
fn project(record: &Record, fields: &[&str]) -> Record {
    fields
        .iter()
        .filter_map(|f| record.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Welcome to the alumni association API",
        "version": VERSION,
        "endpoints": { "health": "/health", "api": "/api/*" },
    }))
}

async fn health(Extension(gateways): Extension<Gateways>) -> (StatusCode, Json<Value>) {
    match gateways.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "server is healthy",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "version": VERSION,
                "database": "connected",
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "database unavailable",
                    "database": "disconnected",
                })),
            )
        }
    }
}

pub fn root() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

pub fn app() -> Router {
    Router::new()
        .nest("/members", members::app())
        .nest("/events", events::app())
        .nest("/news", news::app())
        .nest("/scholarships", scholarships::app())
        .nest("/contact", contact::app())
        .nest("/search", search::app())
        .merge(stats::app())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_parsing_ignores_junk() {
        assert_eq!(parse_limit(Some("5")), Some(5));
        assert_eq!(parse_limit(Some("abc")), None);
        assert_eq!(parse_limit(Some("0")), None);
        assert_eq!(parse_limit(None), None);
    }

    #[test]
    fn accepts_only_plausible_emails() {
        assert!(is_email("tan@example.com"));
        assert!(is_email("a.b@mail.school.edu.my"));
        assert!(!is_email("tan@example"));
        assert!(!is_email("tan example@x.com"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("tan@@example.com"));
    }
}
