//! Pass-through plumbing shared by the proxy routes

use axum::body::Bytes;
use axum::http::Method;
use axum::Json;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// Keep only the named query parameters, in their original order.
pub fn allowed_query(params: Vec<(String, String)>, allowed: &[&str]) -> Vec<(String, String)> {
    params
        .into_iter()
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .collect()
}

/// Empty bodies are allowed; anything else must be JSON.
pub fn json_body(bytes: &Bytes) -> Result<Option<Value>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| AppError::validation(format!("Invalid JSON body: {}", e)))
}

pub async fn forward(
    state: &AppState,
    method: Method,
    path: &[&str],
    query: &[(String, String)],
    bearer: Option<&str>,
    body: Option<&Value>,
) -> Result<Json<Value>, AppError> {
    let value = state.backend.forward(method, path, query, bearer, body).await?;
    Ok(Json(value))
}

/// Backend lists arrive either bare or wrapped as `{ "data": [...] }`
pub fn list_items_mut(value: &mut Value) -> Option<&mut Value> {
    if value.is_array() {
        return Some(value);
    }
    value.get_mut("data").filter(|data| data.is_array())
}
