use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use evhop_order::CommissionSummary;
use evhop_shared::models::{Payout, Transaction};
use serde_json::Value;

use crate::error::AppError;
use crate::middleware::{bearer_token, require_bearer, MaybeBearer};
use crate::proxy::{allowed_query, forward, list_items_mut};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/hotels/{slug}/transactions", get(list_transactions))
        .route("/admin/hotels/{slug}/payouts", get(list_payouts))
        .route("/admin/hotels/{slug}/payouts/{invoice_number}/invoice", get(download_invoice))
        .route_layer(axum::middleware::from_fn(require_bearer))
}

const SUMMARY_PAGE_SIZE: usize = 100;
const SUMMARY_MAX_PAGES: usize = 50;

fn parse_transactions(slug: &str, items: &Value) -> Option<Vec<Transaction>> {
    serde_json::from_value(items.clone())
        .map_err(|e| tracing::warn!(hotel = %slug, "Unexpected transaction shape: {}", e))
        .ok()
}

/// The listing already holds the whole month: first page and `meta.total` matches
fn is_whole_month(response: &Value, query: &[(String, String)], listed: usize) -> bool {
    let first_page = query
        .iter()
        .find(|(k, _)| k == "page")
        .map_or(true, |(_, v)| v.trim() == "1");
    let total = response.pointer("/meta/total").and_then(Value::as_u64);
    first_page && total == Some(listed as u64)
}

/// Every transaction of the requested month, read page by page
async fn month_transactions(
    state: &AppState,
    slug: &str,
    month: Option<&str>,
    bearer: Option<&str>,
) -> Result<Option<Vec<Transaction>>, AppError> {
    let path = ["admin", "hotels", slug, "transactions"];
    let mut all = Vec::new();

    for page in 1..=SUMMARY_MAX_PAGES {
        let mut query: Vec<(String, String)> = month.map(|m| ("month".to_string(), m.to_string())).into_iter().collect();
        query.push(("page".to_string(), page.to_string()));
        query.push(("per_page".to_string(), SUMMARY_PAGE_SIZE.to_string()));

        let Json(mut response) = forward(state, Method::GET, &path, &query, bearer, None).await?;
        let Some(items) = list_items_mut(&mut response) else {
            return Ok(None);
        };
        let Some(batch) = parse_transactions(slug, items) else {
            return Ok(None);
        };

        let fetched = batch.len();
        all.extend(batch);
        let last_page = response.pointer("/meta/last_page").and_then(Value::as_u64);
        if fetched < SUMMARY_PAGE_SIZE || last_page.is_some_and(|last| last <= page as u64) {
            return Ok(Some(all));
        }
    }

    tracing::warn!(hotel = %slug, pages = SUMMARY_MAX_PAGES, "Transaction month truncated for commission summary");
    Ok(Some(all))
}

/// GET /api/admin/hotels/{slug}/transactions?month=&page=&per_page=
///
/// Adds `commission_summary` for the whole month, whatever page is listed.
/// It is `null` when the month has no paid transactions.
async fn list_transactions(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Path(slug): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let query = allowed_query(params, &["month", "page", "per_page"]);
    let bearer = bearer_token(&auth);
    let path = ["admin", "hotels", slug.as_str(), "transactions"];
    let Json(mut response) = forward(&state, Method::GET, &path, &query, bearer, None).await?;

    let listed = list_items_mut(&mut response).map(|items| parse_transactions(&slug, items));
    let month_items = match listed {
        Some(Some(page)) if is_whole_month(&response, &query, page.len()) => Some(page),
        Some(Some(_)) => {
            let month = query.iter().find(|(k, _)| k == "month").map(|(_, v)| v.as_str());
            month_transactions(&state, &slug, month, bearer).await?
        }
        _ => None,
    };
    let summary = month_items.and_then(|transactions| CommissionSummary::for_display(&transactions));

    if response.is_array() {
        response = serde_json::json!({ "data": response });
    }
    if let Some(fields) = response.as_object_mut() {
        fields.insert("commission_summary".to_string(), serde_json::to_value(summary)?);
    }

    Ok(Json(response))
}

/// GET /api/admin/hotels/{slug}/payouts?page=&per_page=&status=
async fn list_payouts(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Path(slug): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let query = allowed_query(params, &["page", "per_page", "status"]);
    let path = ["admin", "hotels", slug.as_str(), "payouts"];
    forward(&state, Method::GET, &path, &query, bearer_token(&auth), None).await
}

/// GET /api/admin/hotels/{slug}/payouts/{invoice_number}/invoice
async fn download_invoice(
    State(state): State<AppState>,
    auth: MaybeBearer,
    Path((slug, invoice_number)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let path = ["admin", "hotels", slug.as_str(), "payouts", invoice_number.as_str()];
    let Json(response) = forward(&state, Method::GET, &path, &[], bearer_token(&auth), None).await?;

    let record = match response.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => response,
    };
    let payout: Payout = serde_json::from_value(record)
        .map_err(|e| anyhow::anyhow!("Unexpected payout shape for {}: {}", invoice_number, e))?;

    let hotel_name = state.hotel(&slug).map(|h| h.name.clone()).unwrap_or_else(|| slug.clone());
    let html = state.invoices.render(&hotel_name, &payout);
    let disposition = format!("inline; filename=\"{}\"", state.invoices.file_name(&payout));
    tracing::info!(hotel = %slug, invoice = %payout.invoice_number, "Invoice rendered");

    Ok((
        [
            (header::CONTENT_TYPE, state.invoices.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    ))
}
