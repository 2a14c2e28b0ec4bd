use axum::{body::Bytes, extract::State, http::Method, routing::post, Json, Router};
use serde_json::Value;

use crate::error::AppError;
use crate::middleware::{bearer_token, MaybeBearer};
use crate::proxy::{forward, json_body};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/guest", post(login_guest))
        .route("/auth/google", post(login_google))
}

/// POST /api/auth/guest
async fn login_guest(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    let body = json_body(&body)?;
    forward(&state, Method::POST, &["auth", "guest"], &[], bearer_token(&auth), body.as_ref()).await
}

/// POST /api/auth/google
async fn login_google(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    let body = json_body(&body)?.ok_or_else(|| AppError::validation("Google credential is required"))?;
    forward(&state, Method::POST, &["auth", "google"], &[], bearer_token(&auth), Some(&body)).await
}
