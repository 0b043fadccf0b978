use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{data, message_with, parse_limit, require, require_email, Envelope};
use crate::{
    error::{AppError, AppResult},
    gateways::Gateways,
    models::MessageStatus,
    record::{record_of, Record},
};

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMessage {
    name: String,
    email: String,
    phone: Option<String>,
    subject: Option<String>,
    message: String,
}

#[derive(Deserialize)]
struct ContactQuery {
    status: Option<MessageStatus>,
    limit: Option<String>,
}

async fn submit(
    Extension(gateways): Extension<Gateways>,
    Json(req): Json<NewMessage>,
) -> AppResult<(StatusCode, Json<Envelope<Value>>)> {
    require(&req.name, "name")?;
    require_email(&req.email)?;
    require(&req.message, "message")?;

    let message = gateways.contact.create(record_of(&req)?).await?;
    tracing::info!(message_id = ?message.get("id"), "contact message received");
    Ok((
        StatusCode::CREATED,
        message_with(
            "thank you for your message, we will reply soon",
            json!({ "messageId": message.get("id") }),
        ),
    ))
}

async fn list(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<ContactQuery>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    let mut filter = Record::new();
    if let Some(status) = query.status {
        filter.insert("status".into(), status.into());
    }
    let messages = gateways
        .contact
        .list(filter, parse_limit(query.limit.as_deref()))
        .await?;
    Ok(data(messages))
}

async fn unread(Extension(gateways): Extension<Gateways>) -> AppResult<Json<Envelope<Vec<Record>>>> {
    Ok(data(gateways.contact.unread().await?))
}

async fn mark_read(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<Record>>> {
    let message = gateways
        .contact
        .mark_as_read(id)
        .await?
        .ok_or_else(|| AppError::not_found("message"))?;
    Ok(message_with("message marked as read", message))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(submit))
        .route("/unread", get(unread))
        .route("/:id/read", put(mark_read))
}
