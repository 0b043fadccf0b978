use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{data, events::parse_date, message_with, require, require_email, Envelope};
use crate::{
    error::{AppError, AppResult},
    gateways::{Gateways, UploadedFiles},
    models::{ApplicationStatus, Requirements, ScholarshipStatus},
    record::{record_of, Record},
};

/// Replaces the stored `;`-joined requirements with a JSON array.
fn with_requirements(mut scholarship: Record) -> Record {
    let requirements = match scholarship.get("requirements") {
        Some(Value::String(stored)) => Requirements::parse(stored),
        _ => Requirements::default(),
    };
    scholarship.insert("requirements".into(), json!(requirements));
    scholarship
}

#[derive(Serialize, Deserialize)]
struct ScholarshipQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<ScholarshipStatus>,
}

#[derive(Deserialize)]
struct ScholarshipRequest {
    title: String,
    description: Option<String>,
    amount: Option<f64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    requirements: Requirements,
    deadline: Option<String>,
}

#[derive(Serialize)]
struct NewScholarship {
    title: String,
    description: Option<String>,
    amount: Option<f64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    requirements: String,
    deadline: Option<String>,
    status: ScholarshipStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationRequest {
    scholarship_id: i32,
    applicant_name: String,
    applicant_email: String,
    applicant_phone: Option<String>,
    school: Option<String>,
    graduation_year: Option<i32>,
    gpa: Option<f64>,
    essay: Option<String>,
    transcript_file: Option<String>,
    recommendation_file: Option<String>,
    income_proof_file: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewApplication {
    scholarship_id: i32,
    applicant_name: String,
    applicant_email: String,
    applicant_phone: Option<String>,
    school: Option<String>,
    graduation_year: Option<i32>,
    gpa: Option<f64>,
    essay: Option<String>,
    status: ApplicationStatus,
}

#[derive(Deserialize)]
struct ApplicationQuery {
    status: Option<ApplicationStatus>,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: ApplicationStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusChange {
    status: ApplicationStatus,
    reviewed_at: String,
}

async fn list(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<ScholarshipQuery>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    let scholarships = gateways.scholarships.list(record_of(&query)?).await?;
    Ok(data(scholarships.into_iter().map(with_requirements).collect()))
}

async fn info(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<Record>>> {
    let scholarship = gateways
        .scholarships
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("scholarship"))?;
    Ok(data(with_requirements(scholarship)))
}

async fn create(
    Extension(gateways): Extension<Gateways>,
    Json(req): Json<ScholarshipRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Record>>)> {
    require(&req.title, "title")?;
    let deadline = match req.deadline {
        Some(d) => Some(
            parse_date(&d)
                .ok_or_else(|| AppError::from(StatusCode::BAD_REQUEST, "invalid deadline"))?
                .format("%Y-%m-%d")
                .to_string(),
        ),
        None => None,
    };

    let scholarship = gateways
        .scholarships
        .create(record_of(&NewScholarship {
            title: req.title,
            description: req.description,
            amount: req.amount,
            kind: req.kind,
            requirements: req.requirements.join(),
            deadline,
            status: ScholarshipStatus::Open,
        })?)
        .await?;
    Ok((StatusCode::CREATED, data(with_requirements(scholarship))))
}

async fn apply(
    Extension(gateways): Extension<Gateways>,
    Json(req): Json<ApplicationRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Value>>)> {
    require(&req.applicant_name, "applicantName")?;
    require_email(&req.applicant_email)?;

    let scholarship = gateways
        .scholarships
        .find_by_id(req.scholarship_id)
        .await?
        .ok_or_else(|| AppError::not_found("scholarship"))?;
    let open = Value::from(ScholarshipStatus::Open);
    if scholarship.get("status") != Some(&open) {
        return Err(AppError::from(
            StatusCode::BAD_REQUEST,
            "this scholarship is no longer accepting applications",
        ));
    }

    let files = UploadedFiles {
        transcript: req.transcript_file,
        recommendation: req.recommendation_file,
        income_proof: req.income_proof_file,
    };
    let application = gateways
        .applications
        .create_with_files(
            record_of(&NewApplication {
                scholarship_id: req.scholarship_id,
                applicant_name: req.applicant_name,
                applicant_email: req.applicant_email,
                applicant_phone: req.applicant_phone,
                school: req.school,
                graduation_year: req.graduation_year,
                gpa: req.gpa,
                essay: req.essay,
                status: ApplicationStatus::Pending,
            })?,
            files,
        )
        .await?;
    tracing::info!(
        application_id = ?application.get("id"),
        scholarship_id = req.scholarship_id,
        "scholarship application submitted"
    );

    Ok((
        StatusCode::CREATED,
        message_with(
            "application submitted, we will review it and contact you",
            json!({
                "applicationId": application.get("id"),
                "referenceNumber": format!("SCH{}", Utc::now().timestamp_millis()),
            }),
        ),
    ))
}

async fn applications(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<ApplicationQuery>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    let status = query.status.unwrap_or(ApplicationStatus::Pending);
    Ok(data(gateways.applications.by_status(status).await?))
}

async fn application(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<Record>>> {
    let application = gateways
        .applications
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("application"))?;
    Ok(data(application))
}

async fn review(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<Envelope<Record>>> {
    let application = gateways
        .applications
        .update(
            id,
            record_of(&StatusChange {
                status: req.status,
                reviewed_at: Utc::now().to_rfc3339(),
            })?,
        )
        .await?
        .ok_or_else(|| AppError::not_found("application"))?;
    tracing::info!(application_id = id, status = req.status.as_str(), "application reviewed");
    Ok(message_with("application status updated", application))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/apply", post(apply))
        .route("/applications", get(applications))
        .route("/applications/:id", get(application))
        .route("/applications/:id/status", put(review))
        .route("/:id", get(info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_come_back_as_a_list() {
        let mut scholarship = Record::new();
        scholarship.insert("requirements".into(), json!("transcript;two references"));
        let scholarship = with_requirements(scholarship);
        assert_eq!(scholarship["requirements"], json!(["transcript", "two references"]));

        let scholarship = with_requirements(Record::new());
        assert_eq!(scholarship["requirements"], json!([]));
    }
}
