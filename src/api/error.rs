//! Submission errors as HTTP responses.

use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::queue::RequestError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("no URL specified")]
    MissingUrl,

    #[error("Could not parse URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl => StatusCode::NOT_ACCEPTABLE,
            ApiError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::MissingUrl => ApiError::MissingUrl,
            RequestError::InvalidUrl(url) => ApiError::InvalidUrl(url),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "Rejected submission");
        (
            self.status(),
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (CONTENT_TYPE, "text/plain; charset=utf-8"),
            ],
            self.to_string(),
        )
            .into_response()
    }
}
