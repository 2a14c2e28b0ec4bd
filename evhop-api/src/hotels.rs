use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use evhop_catalog::{FixedRoute, PriceQuote, VehicleClass};
use evhop_shared::{format_rupiah, Rupiah};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::proxy::json_body;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/hotels/{slug}", get(landing))
        .route("/hotels/{slug}/quote", post(quote))
}

#[derive(Debug, Serialize)]
pub struct HotelLanding {
    pub slug: String,
    pub name: String,
    pub whatsapp_support: String,
    pub routes: Vec<FixedRoute>,
}

/// GET /api/hotels/{slug}
async fn landing(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<HotelLanding>, AppError> {
    let hotel = state
        .hotel(&slug)
        .ok_or_else(|| AppError::not_found(format!("Hotel tidak ditemukan / Unknown hotel: {}", slug)))?;

    Ok(Json(HotelLanding {
        slug: hotel.slug.clone(),
        name: hotel.name.clone(),
        whatsapp_support: hotel.whatsapp_support.clone(),
        routes: state.pricing.catalog().for_hotel(&slug).cloned().collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub one_way_price: Option<Rupiah>,
    #[serde(default)]
    pub vehicle_class: Option<VehicleClass>,
    #[serde(default)]
    pub is_round_trip: bool,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: PriceQuote,
    pub total: Rupiah,
    pub total_display: String,
}

impl From<PriceQuote> for QuoteResponse {
    fn from(quote: PriceQuote) -> Self {
        let total = quote.total();
        Self {
            quote,
            total,
            total_display: format_rupiah(total),
        }
    }
}

/// POST /api/hotels/{slug}/quote
async fn quote(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<Json<QuoteResponse>, AppError> {
    if state.hotel(&slug).is_none() {
        return Err(AppError::not_found(format!("Hotel tidak ditemukan / Unknown hotel: {}", slug)));
    }
    let raw = json_body(&body)?.ok_or_else(|| AppError::validation("Quote request is required"))?;
    let req: QuoteRequest =
        serde_json::from_value(raw).map_err(|e| AppError::validation(format!("Invalid quote request: {}", e)))?;

    let quote = match (req.route_id, req.one_way_price) {
        (Some(route_id), None) => {
            let route = state
                .pricing
                .catalog()
                .for_hotel(&slug)
                .find(|r| r.id == route_id)
                .ok_or_else(|| AppError::not_found(format!("Unknown route: {}", route_id)))?;

            let class = match (req.vehicle_class, route.tariffs.as_slice()) {
                (Some(class), _) => class,
                (None, [only]) => only.vehicle_class.clone(),
                (None, _) => return Err(AppError::validation("vehicle_class is required for this route")),
            };
            state.pricing.quote_fixed_route(&route_id, &class, req.is_round_trip)?
        }
        (None, Some(one_way)) if one_way > 0 => state.pricing.quote_manual(one_way, req.is_round_trip),
        (None, Some(_)) => return Err(AppError::validation("one_way_price must be positive")),
        _ => return Err(AppError::validation("Provide exactly one of route_id or one_way_price")),
    };

    Ok(Json(quote.into()))
}
