//! API errors and their HTTP mapping
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geoguard_core::GeoGuardError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] GeoGuardError),

    #[error("CONFIG/ENV: {0}")]
    Environment(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("METRICS: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Domain(err) => err.code(),
            ApiError::Environment(_) => "CONFIG/ENV",
            ApiError::Io(_) => "IO",
            ApiError::Metrics(_) => "METRICS",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => {
                StatusCode::from_u16(err.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
