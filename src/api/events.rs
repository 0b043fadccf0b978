use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{data, message_with, parse_limit, require, require_email, Envelope};
use crate::{
    error::{AppError, AppResult},
    gateways::Gateways,
    models::EventStatus,
    record::{record_of, Record},
};

/// Accepts `2024-05-01`, `2024-05-01T09:30:00` and RFC 3339 timestamps.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|d| d.date())
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn date_field(value: Option<String>) -> AppResult<Option<String>> {
    match value {
        Some(s) => parse_date(&s)
            .map(|d| Some(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| AppError::from(StatusCode::BAD_REQUEST, "invalid date format")),
        None => Ok(None),
    }
}

fn capacity_field(value: Option<i32>) -> AppResult<Option<i32>> {
    match value {
        Some(max) if max < 0 => Err(AppError::from(
            StatusCode::BAD_REQUEST,
            "maxParticipants must not be negative",
        )),
        other => Ok(other),
    }
}

fn time_field(value: Option<String>) -> AppResult<Option<String>> {
    match value {
        Some(s) => parse_time(&s)
            .map(|t| Some(t.format("%H:%M:%S").to_string()))
            .ok_or_else(|| AppError::from(StatusCode::BAD_REQUEST, "invalid time format")),
        None => Ok(None),
    }
}

/// Adds the `date`, `time` and `formattedDate` aliases clients read.
pub fn with_aliases(mut event: Record) -> Record {
    let date = event.get("eventDate").cloned().unwrap_or(Value::Null);
    let time = event.get("eventTime").cloned().unwrap_or(Value::Null);
    let formatted = date
        .as_str()
        .and_then(parse_date)
        .map(|d| d.format("%Y-%m-%d").to_string());
    event.insert("date".into(), date);
    event.insert("time".into(), time);
    event.insert("formattedDate".into(), json!(formatted));
    event
}

#[derive(Deserialize)]
struct EventQuery {
    category: Option<String>,
    status: Option<EventStatus>,
    limit: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    title: String,
    description: Option<String>,
    #[serde(alias = "eventDate")]
    date: Option<String>,
    #[serde(alias = "eventTime")]
    time: Option<String>,
    location: Option<String>,
    category: Option<String>,
    max_participants: Option<i32>,
    registration_open: Option<bool>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventUpdate {
    title: Option<String>,
    description: Option<String>,
    #[serde(alias = "date")]
    event_date: Option<String>,
    #[serde(alias = "time")]
    event_time: Option<String>,
    location: Option<String>,
    category: Option<String>,
    max_participants: Option<i32>,
    registration_open: Option<bool>,
    status: Option<EventStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewEvent {
    title: String,
    description: Option<String>,
    event_date: String,
    event_time: Option<String>,
    location: Option<String>,
    category: Option<String>,
    max_participants: Option<i32>,
    current_participants: i32,
    registration_open: bool,
    status: EventStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationRequest {
    name: String,
    email: String,
    phone: String,
    special_requirements: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Participant {
    participant_name: String,
    participant_email: String,
    participant_phone: String,
    special_requirements: Option<String>,
}

async fn list(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    let mut filter = Record::new();
    if let Some(category) = query.category {
        filter.insert("category".into(), json!(category));
    }
    if let Some(status) = query.status {
        filter.insert("status".into(), status.into());
    }
    let events = gateways
        .events
        .list(filter, parse_limit(query.limit.as_deref()))
        .await?;
    Ok(data(events.into_iter().map(with_aliases).collect()))
}

async fn info(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<Record>>> {
    let event = gateways
        .events
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("event"))?;
    Ok(data(with_aliases(event)))
}

async fn create(
    Extension(gateways): Extension<Gateways>,
    Json(req): Json<EventRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Record>>)> {
    require(&req.title, "title")?;
    let event_date = date_field(req.date)?
        .ok_or_else(|| AppError::from(StatusCode::BAD_REQUEST, "a valid date is required"))?;

    let event = gateways
        .events
        .create(record_of(&NewEvent {
            title: req.title,
            description: req.description,
            event_date,
            event_time: time_field(req.time)?,
            location: req.location,
            category: req.category,
            max_participants: capacity_field(req.max_participants)?,
            current_participants: 0,
            registration_open: req.registration_open.unwrap_or(true),
            status: EventStatus::Upcoming,
        })?)
        .await?;
    Ok((StatusCode::CREATED, data(with_aliases(event))))
}

async fn update(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
    Json(mut req): Json<EventUpdate>,
) -> AppResult<Json<Envelope<Record>>> {
    req.event_date = date_field(req.event_date)?;
    req.event_time = time_field(req.event_time)?;
    req.max_participants = capacity_field(req.max_participants)?;
    if let Some(max) = req.max_participants {
        let event = gateways
            .events
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("event"))?;
        let current = event
            .get("currentParticipants")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if current > i64::from(max) {
            return Err(AppError::from(
                StatusCode::BAD_REQUEST,
                format!("maxParticipants cannot be lower than the {current} registered participants"),
            ));
        }
    }
    let event = gateways
        .events
        .update(id, record_of(&req)?)
        .await?
        .ok_or_else(|| AppError::not_found("event"))?;
    Ok(data(with_aliases(event)))
}

async fn register(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
    Json(req): Json<RegistrationRequest>,
) -> AppResult<Json<Envelope<Value>>> {
    require(&req.name, "name")?;
    require_email(&req.email)?;
    require(&req.phone, "phone")?;
    let participant = record_of(&Participant {
        participant_name: req.name,
        participant_email: req.email,
        participant_phone: req.phone,
        special_requirements: req.special_requirements,
    })?;

    let event = gateways
        .events
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("event"))?;
    if event.get("registrationOpen") != Some(&Value::Bool(true)) {
        return Err(AppError::from(
            StatusCode::BAD_REQUEST,
            "registration for this event is closed",
        ));
    }
    if gateways.events.reserve_seat(id).await?.is_none() {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "this event is full"));
    }

    let registration = match gateways.registrations.create_registration(id, participant).await {
        Ok(registration) => registration,
        Err(e) => {
            gateways.events.release_seat(id).await?;
            return Err(e.into());
        }
    };
    tracing::info!(
        event_id = id,
        registration = ?registration.get("registrationNumber"),
        "participant registered"
    );

    Ok(message_with(
        "registration successful, we will contact you by email",
        json!({
            "eventId": event.get("id"),
            "eventTitle": event.get("title"),
            "registrationNumber": registration.get("registrationNumber"),
        }),
    ))
}

async fn registrations(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    if gateways.events.find_by_id(id).await?.is_none() {
        return Err(AppError::not_found("event"));
    }
    Ok(data(gateways.registrations.by_event(id).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(info).put(update))
        .route("/:id/register", post(register))
        .route("/:id/registrations", get(registrations))
}
