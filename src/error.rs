use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;

use crate::store::StoreError;

pub enum AppError {
    InternalServerError(anyhow::Error),
    ResponseStatusError(StatusCode, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

fn store_error_response(err: &StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation { constraint, .. } => {
            tracing::info!(%constraint, "rejected duplicate");
            AppError::from(StatusCode::CONFLICT, "record already exists")
        }
        StoreError::ConstraintViolation { .. }
        | StoreError::UnknownField { .. }
        | StoreError::ReadOnlyField { .. } => {
            AppError::from(StatusCode::BAD_REQUEST, err.to_string())
        }
        StoreError::Connection(_) => {
            tracing::error!(error = %err, "storage unavailable");
            AppError::from(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
        StoreError::Query(_) => {
            tracing::error!(error = %err, "query failed");
            AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            success: bool,
            status: u16,
            message: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => match err.downcast_ref::<StoreError>() {
                Some(store_err) => store_error_response(store_err).into_response(),
                None => {
                    tracing::error!(error = ?err, "request failed");
                    AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                        .into_response()
                }
            },
            AppError::ResponseStatusError(code, s) => (
                code,
                Json(AppErrorResponse {
                    success: false,
                    status: code.as_u16(),
                    message: s,
                }),
            )
                .into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    pub fn not_found(what: &'static str) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}
