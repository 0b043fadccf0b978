use axum::{
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{data, message_with, project, require, require_email, Envelope};
use crate::{
    error::{AppError, AppResult},
    gateways::Gateways,
    models::MemberStatus,
    record::{record_of, Record},
};

const PUBLIC_FIELDS: &[&str] = &[
    "id",
    "name",
    "graduationYear",
    "school",
    "membershipType",
    "status",
];

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberQuery {
    school: Option<String>,
    graduation_year: Option<i32>,
    status: Option<MemberStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRegisterRequest {
    name: String,
    email: String,
    phone: Option<String>,
    graduation_year: Option<i32>,
    school: Option<String>,
    membership_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMember {
    name: String,
    email: String,
    phone: Option<String>,
    graduation_year: Option<i32>,
    school: Option<String>,
    membership_type: String,
    status: MemberStatus,
}

async fn list(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    let members = gateways.members.list(record_of(&query)?).await?;
    Ok(data(
        members
            .iter()
            .map(|m| project(m, PUBLIC_FIELDS))
            .collect(),
    ))
}

async fn register(
    Extension(gateways): Extension<Gateways>,
    Json(req): Json<MemberRegisterRequest>,
) -> AppResult<(StatusCode, Json<Envelope<serde_json::Value>>)> {
    require(&req.name, "name")?;
    require_email(&req.email)?;

    if gateways.members.find_by_email(&req.email).await?.is_some() {
        return Err(AppError::from(
            StatusCode::CONFLICT,
            "this email has already been registered",
        ));
    }

    let member = gateways
        .members
        .create(record_of(&NewMember {
            name: req.name,
            email: req.email,
            phone: req.phone,
            graduation_year: req.graduation_year,
            school: req.school,
            membership_type: req.membership_type.unwrap_or_else(|| "regular".to_string()),
            status: MemberStatus::Pending,
        })?)
        .await?;
    tracing::info!(member_id = ?member.get("id"), "member registered");

    Ok((
        StatusCode::CREATED,
        message_with(
            "membership application submitted, it will be reviewed within 3 working days",
            json!({ "memberId": member.get("id") }),
        ),
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/register", post(register))
}
