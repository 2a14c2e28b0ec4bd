use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::error::AppError;

/// Bearer token sent by the browser, forwarded to the backend untouched
pub type MaybeBearer = Option<TypedHeader<Authorization<Bearer>>>;

pub fn bearer_token(header: &MaybeBearer) -> Option<&str> {
    header.as_ref().map(|TypedHeader(Authorization(bearer))| bearer.token())
}

/// Admin routes need a partner session token. The backend still validates it.
pub async fn require_bearer(req: Request, next: Next) -> Result<Response, AppError> {
    let present = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty());

    if !present {
        return Err(AppError::Unauthorized("Missing bearer token".to_string()));
    }

    Ok(next.run(req).await)
}
