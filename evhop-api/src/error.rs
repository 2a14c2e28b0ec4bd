use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use evhop_catalog::PricingError;
use evhop_core::BackendError;
use serde_json::{json, Value};

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Validation { message: String, details: Option<Value> },
    NotFound(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { message: message.into(), details: None }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}

fn backend_failure(err: &BackendError) -> (StatusCode, String, Option<Value>) {
    match err {
        BackendError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
        BackendError::Upstream { status, message, details } => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            message.clone(),
            details.clone(),
        ),
        BackendError::Transport(_) | BackendError::InvalidResponse(_) => {
            tracing::error!("Backend failure: {}", err);
            (StatusCode::BAD_GATEWAY, "Backend unavailable".to_string(), None)
        }
        BackendError::Session(_) => {
            tracing::error!("Session failure: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Validation { message, details } => (StatusCode::BAD_REQUEST, message, details),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Anyhow(err) => {
                if let Some(backend) = err.downcast_ref::<BackendError>() {
                    backend_failure(backend)
                } else if let Some(pricing) = err.downcast_ref::<PricingError>() {
                    let status = match pricing {
                        PricingError::UnknownRoute(_) => StatusCode::NOT_FOUND,
                        PricingError::NoTariff { .. } => StatusCode::BAD_REQUEST,
                    };
                    (status, pricing.to_string(), None)
                } else {
                    tracing::error!("Internal Server Error: {:#}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
                }
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": details,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
