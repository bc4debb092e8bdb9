//! Mapping of pipeline failures onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quarry_trigger::{AdmissionError, BodyStyle, ErrorKind};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An admission failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AdmissionError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();
        match self.0.body_style() {
            BodyStyle::Json => (status, Json(ErrorBody { error: message })).into_response(),
            BodyStyle::PlainText => (status, message).into_response(),
        }
    }
}
