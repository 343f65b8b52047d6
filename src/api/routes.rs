//! API route definitions.

use axum::extract::{Query, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::error::ApiError;
use super::state::AppState;
use crate::queue::{Admission, TestRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/test", get(submit).options(preflight))
        .route("/status", get(status).options(preflight))
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    url: Option<String>,
    email: Option<String>,
}

async fn submit(
    State(state): State<AppState>,
    Query(params): Query<SubmitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let request = TestRequest::parse(
        params.url.as_deref().unwrap_or_default(),
        params.email.as_deref(),
    )?;
    let target = request.target().to_string();
    let email = request.email().map(str::to_string);

    let body = match state.queue.enqueue(request) {
        Admission::AlreadyQueued => {
            info!(url = %target, "Already in queue");
            format!("{target} is already in the queue")
        }
        Admission::Admitted { position } => {
            info!(url = %target, email = ?email, position, "Request queued");
            let mut body = format!("Testing {target}");
            if let Some(email) = email {
                body.push_str(&format!("\nWe will email the results to {email}"));
            }
            body.push_str(&format!("\nNumber {position} in queue"));
            body
        }
    };

    Ok((
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
        ],
        body,
    ))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(state.stats.snapshot()),
    )
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, "POST, GET, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
    )
}
