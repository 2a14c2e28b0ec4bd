use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
    routing::{get, post, put},
    Json, Router,
};
use evhop_core::backend::PaymentRequest;
use evhop_core::PaymentMethod;
use evhop_order::contact::{normalize_whatsapp, passenger_contact, ContactError};
use evhop_shared::models::CarOption;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::middleware::{bearer_token, MaybeBearer};
use crate::proxy::{allowed_query, forward, json_body, list_items_mut};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cars", get(list_cars))
        .route("/cars/select", post(select_car))
        .route("/trips/pickup", post(select_pickup))
        .route("/trips/destination", post(select_destination))
        .route("/trips/round-trip", post(set_round_trip))
        .route("/trips/submit", post(submit_trip))
        .route("/checkout/{order_id}/overview", get(checkout_overview))
        .route("/checkout/{order_id}/pay", post(pay))
        .route("/checkout/{order_id}/payment-detail", get(payment_detail))
        .route("/profile", put(update_profile))
}

pub(crate) fn contact_error(err: ContactError) -> AppError {
    let field = match err {
        ContactError::MissingName => "name",
        ContactError::InvalidWhatsapp => "whatsapp",
    };
    AppError::Validation {
        message: err.to_string(),
        details: Some(json!({ "field": field })),
    }
}

/// GET /api/cars?order_id=
///
/// Cars whose vehicle type is not sellable on the partner site are dropped.
async fn list_cars(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let query = allowed_query(params, &["order_id"]);
    let Json(mut response) = forward(&state, Method::GET, &["cars"], &query, bearer_token(&auth), None).await?;

    if let Some(items) = list_items_mut(&mut response) {
        match serde_json::from_value::<Vec<CarOption>>(items.clone()) {
            Ok(cars) => {
                let total = cars.len();
                let allowed = state.allow_list.filter(cars);
                tracing::debug!(total, allowed = allowed.len(), "Filtered car listing");
                *items = serde_json::to_value(allowed)?;
            }
            Err(e) => tracing::warn!("Car listing not in the expected shape, passing through: {}", e),
        }
    }

    Ok(Json(response))
}

async fn post_through(
    state: &AppState,
    path: &[&str],
    auth: &MaybeBearer,
    body: &Bytes,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    forward(state, Method::POST, path, &[], bearer_token(auth), body.as_ref()).await
}

/// POST /api/cars/select
async fn select_car(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    post_through(&state, &["cars", "select"], &auth, &body).await
}

/// POST /api/trips/pickup
async fn select_pickup(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    post_through(&state, &["trips", "pickup"], &auth, &body).await
}

/// POST /api/trips/destination
async fn select_destination(
    State(state): State<AppState>,
    auth: MaybeBearer,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    post_through(&state, &["trips", "destination"], &auth, &body).await
}

/// POST /api/trips/round-trip
async fn set_round_trip(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    post_through(&state, &["trips", "round-trip"], &auth, &body).await
}

/// POST /api/trips/submit
async fn submit_trip(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    post_through(&state, &["trips", "submit"], &auth, &body).await
}

async fn checkout_overview(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    forward(&state, Method::GET, &["checkout", order_id.as_str(), "overview"], &[], bearer_token(&auth), None).await
}

async fn payment_detail(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    forward(&state, Method::GET, &["checkout", order_id.as_str(), "payment-detail"], &[], bearer_token(&auth), None).await
}

#[derive(Debug, Deserialize)]
struct PayBody {
    method: PaymentMethod,
    passenger: PassengerInput,
}

#[derive(Debug, Deserialize)]
struct PassengerInput {
    name: String,
    whatsapp: String,
    #[serde(default)]
    email: Option<String>,
}

/// POST /api/checkout/{order_id}/pay
///
/// Passenger contact is validated and normalized before the backend sees it.
async fn pay(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Path(order_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let raw = json_body(&body)?.ok_or_else(|| AppError::validation("Payment details are required"))?;
    let PayBody { method, passenger } =
        serde_json::from_value(raw).map_err(|e| AppError::validation(format!("Invalid payment request: {}", e)))?;

    let passenger = passenger_contact(&passenger.name, &passenger.whatsapp, passenger.email.as_deref())
        .map_err(contact_error)?;
    tracing::info!(order_id = %order_id, whatsapp = %passenger.whatsapp, "Creating payment");

    let request = serde_json::to_value(PaymentRequest { method, passenger })?;
    forward(&state, Method::POST, &["checkout", order_id.as_str(), "pay"], &[], bearer_token(&auth), Some(&request)).await
}

/// PUT /api/profile
async fn update_profile(State(state): State<AppState>, auth: MaybeBearer, body: Bytes) -> Result<Json<Value>, AppError> {
    let mut profile = json_body(&body)?.ok_or_else(|| AppError::validation("Profile is required"))?;

    let whatsapp = profile
        .get("whatsapp")
        .and_then(Value::as_str)
        .filter(|w| !w.trim().is_empty())
        .map(normalize_whatsapp)
        .transpose()
        .map_err(contact_error)?;
    if let (Some(normalized), Some(fields)) = (whatsapp, profile.as_object_mut()) {
        fields.insert("whatsapp".to_string(), Value::String(normalized));
    }

    forward(&state, Method::PUT, &["profile"], &[], bearer_token(&auth), Some(&profile)).await
}
