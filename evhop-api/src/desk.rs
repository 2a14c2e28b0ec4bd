use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use evhop_catalog::{PricingEngine, VehicleAllowList};
use evhop_core::backend::{GuestLogin, Place};
use evhop_core::payment::PaymentInstruction;
use evhop_core::session::{HotelRef, SessionStore, TokenKind};
use evhop_core::PaymentMethod;
use evhop_order::contact::{normalize_whatsapp, passenger_contact};
use evhop_order::schedule::{NightAdvisory, ScheduleError};
use evhop_order::wizard::Stage;
use evhop_order::{
    BookingForm, BookingType, BookingWizard, RentalFields, VehicleOption, WizardDriver, WizardError, WizardEvent,
    WizardPhase,
};
use evhop_shared::models::UserProfile;
use evhop_shared::{format_rupiah, Masked, Rupiah};
use evhop_store::app_config::HotelConfig;
use evhop_store::SessionBackend;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::bookings::contact_error;
use crate::error::AppError;
use crate::proxy::json_body;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/desk", get(status))
        .route("/desk/login", post(login))
        .route("/desk/logout", post(logout))
        .route("/desk/profile", put(update_profile))
        .route("/desk/hotels/{slug}/bookings", post(open_booking))
        .route("/desk/bookings/{id}", get(show_booking).delete(close_booking))
        .route("/desk/bookings/{id}/events", post(send_event))
}

struct DeskBooking {
    hotel: HotelConfig,
    driver: WizardDriver,
}

/// Bookings taken at a hotel's front desk.
///
/// The wizard runs server-side and every backend call goes out on the
/// service's own session: one anonymous account, or the guest signed in
/// through `/desk/login`. The session lives in the configured store, so a
/// Redis-backed deployment keeps it across restarts.
pub struct Desk {
    access_key: Option<String>,
    backend: Arc<SessionBackend>,
    pricing: Arc<PricingEngine>,
    allow_list: Arc<VehicleAllowList>,
    bookings: RwLock<HashMap<Uuid, Arc<Mutex<DeskBooking>>>>,
}

impl Desk {
    pub fn new(
        access_key: Option<String>,
        backend: Arc<SessionBackend>,
        pricing: Arc<PricingEngine>,
        allow_list: Arc<VehicleAllowList>,
    ) -> Self {
        Self {
            access_key: access_key.filter(|key| !key.trim().is_empty()),
            backend,
            pricing,
            allow_list,
            bookings: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.access_key.is_some()
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        self.backend.tokens().store()
    }

    fn driver(&self, wizard: BookingWizard) -> WizardDriver {
        WizardDriver::new(
            wizard,
            self.backend.clone(),
            self.backend.clone(),
            self.pricing.clone(),
            self.allow_list.clone(),
        )
    }

    async fn booking(&self, id: Uuid) -> Result<Arc<Mutex<DeskBooking>>, AppError> {
        self.bookings
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Unknown desk booking: {}", id)))
    }
}

/// Desk key presented as a bearer token
pub struct DeskAccess;

impl FromRequestParts<AppState> for DeskAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.desk.access_key.as_deref() else {
            return Err(AppError::not_found("Desk bookings are not enabled"));
        };
        let given = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if given != Some(expected) {
            return Err(AppError::Unauthorized("Invalid desk key".to_string()));
        }
        Ok(DeskAccess)
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes, what: &str) -> Result<T, AppError> {
    let raw = json_body(body)?.ok_or_else(|| AppError::validation(format!("{} is required", what)))?;
    serde_json::from_value(raw).map_err(|e| AppError::validation(format!("Invalid {}: {}", what.to_lowercase(), e)))
}

fn wizard_error(err: WizardError) -> AppError {
    let message = err.to_string();
    match err {
        WizardError::Contact(e) => contact_error(e),
        WizardError::InvalidTransition { phase, event } => AppError::Validation {
            message,
            details: Some(json!({ "phase": phase, "event": event })),
        },
        WizardError::UnknownRoute(_) | WizardError::UnknownVehicle(_) => AppError::validation(message),
    }
}

#[derive(Debug, Serialize)]
pub struct DeskStatus {
    pub signed_in: Option<TokenKind>,
    pub profile: Option<UserProfile>,
    pub hotel: Option<HotelRef>,
    pub open_bookings: usize,
}

/// GET /api/desk
///
/// Reads the session without creating an account.
async fn status(_: DeskAccess, State(state): State<AppState>) -> Result<Json<DeskStatus>, AppError> {
    let session = state.desk.session();
    let signed_in = if session.get_token(TokenKind::Guest).await?.is_some() {
        Some(TokenKind::Guest)
    } else {
        session.get_token(TokenKind::Anonymous).await?.map(|_| TokenKind::Anonymous)
    };

    Ok(Json(DeskStatus {
        signed_in,
        profile: session.get_profile().await?,
        hotel: session.get_hotel().await?,
        open_bookings: state.desk.bookings.read().await.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    name: String,
    whatsapp: String,
    #[serde(default)]
    email: Option<String>,
}

/// POST /api/desk/login
async fn login(_: DeskAccess, State(state): State<AppState>, body: Bytes) -> Result<Json<UserProfile>, AppError> {
    let body: LoginBody = parse_body(&body, "Login")?;
    let contact = passenger_contact(&body.name, &body.whatsapp, body.email.as_deref()).map_err(contact_error)?;

    let login = GuestLogin {
        name: contact.name,
        whatsapp: contact.whatsapp,
        email: contact.email,
    };
    let profile = state.desk.backend.tokens().login_guest(&login).await?;
    Ok(Json(profile))
}

/// POST /api/desk/logout
///
/// Clears the session and drops every open desk booking, which stops their polling.
async fn logout(_: DeskAccess, State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.desk.backend.tokens().logout().await?;
    let closed = {
        let mut bookings = state.desk.bookings.write().await;
        let closed = bookings.len();
        bookings.clear();
        closed
    };
    tracing::info!(closed, "Desk signed out");
    Ok(Json(json!({ "status": "ok", "closed_bookings": closed })))
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    whatsapp: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

fn filled(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// PUT /api/desk/profile
async fn update_profile(_: DeskAccess, State(state): State<AppState>, body: Bytes) -> Result<Json<UserProfile>, AppError> {
    let body: ProfileBody = parse_body(&body, "Profile")?;
    let whatsapp = filled(body.whatsapp)
        .map(|w| normalize_whatsapp(&w))
        .transpose()
        .map_err(contact_error)?;

    let profile = UserProfile {
        name: filled(body.name),
        whatsapp: whatsapp.map(Masked),
        email: filled(body.email).map(Masked),
    };
    let saved = state.desk.backend.update_profile(&profile).await?;
    Ok(Json(saved))
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub hotel: String,
    pub phase: WizardPhase,
    pub form: BookingForm,
    pub order_id: Option<String>,
    pub price: Option<Rupiah>,
    pub price_display: Option<String>,
    pub vehicle_options: Vec<VehicleOption>,
    pub vehicle: Option<VehicleOption>,
    pub validation: Option<ScheduleError>,
    pub advisories: Vec<NightAdvisory>,
    pub last_error: Option<String>,
    pub payment: Option<PaymentInstruction>,
    pub remaining_seconds: Option<u64>,
}

impl BookingView {
    fn new(id: Uuid, booking: &DeskBooking) -> Self {
        let wizard = booking.driver.wizard();
        let payment = match wizard.stage() {
            Stage::PaymentPending { instruction, .. } => Some(instruction.clone()),
            _ => None,
        };

        Self {
            id,
            hotel: booking.hotel.slug.clone(),
            phase: wizard.phase(),
            form: wizard.form().clone(),
            order_id: wizard.order_id().map(str::to_string),
            price: wizard.price(),
            price_display: wizard.price().map(format_rupiah),
            vehicle_options: wizard.vehicle_options().to_vec(),
            vehicle: wizard.vehicle().cloned(),
            validation: wizard.validation().cloned(),
            advisories: wizard.advisories().to_vec(),
            last_error: wizard.last_error().map(str::to_string),
            payment,
            remaining_seconds: booking.driver.remaining_seconds(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenBookingBody {
    booking_type: BookingType,
    /// Defaults to the hotel lobby
    #[serde(default)]
    pickup: Option<Place>,
}

/// POST /api/desk/hotels/{slug}/bookings
async fn open_booking(
    _: DeskAccess,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    let hotel = state
        .hotel(&slug)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("Hotel tidak ditemukan / Unknown hotel: {}", slug)))?;
    let body: OpenBookingBody = parse_body(&body, "Booking")?;
    let pickup = body
        .pickup
        .or_else(|| hotel.pickup())
        .ok_or_else(|| AppError::validation("Pickup location is required for this hotel"))?;

    state
        .desk
        .session()
        .set_hotel(HotelRef {
            slug: hotel.slug.clone(),
            name: hotel.name.clone(),
        })
        .await?;

    let id = Uuid::new_v4();
    let booking = DeskBooking {
        driver: state.desk.driver(BookingWizard::new(pickup, body.booking_type)),
        hotel,
    };
    let view = BookingView::new(id, &booking);
    state.desk.bookings.write().await.insert(id, Arc::new(Mutex::new(booking)));

    tracing::info!(%id, hotel = %slug, "Desk booking opened");
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/desk/bookings/{id}
///
/// Picks up a payment outcome that arrived since the last call.
async fn show_booking(
    _: DeskAccess,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    let booking = state.desk.booking(id).await?;
    let mut booking = booking.lock().await;

    let now = booking.hotel.local_now();
    if let Some(outcome) = booking.driver.settle_payment(now).await.map_err(wizard_error)? {
        tracing::info!(%id, ?outcome, "Desk payment resolved");
    }
    Ok(Json(BookingView::new(id, &booking)))
}

/// DELETE /api/desk/bookings/{id}
async fn close_booking(_: DeskAccess, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    match state.desk.bookings.write().await.remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::not_found(format!("Unknown desk booking: {}", id))),
    }
}

/// What the desk clerk did on the booking screen
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeskEvent {
    Route { route_id: String },
    ManualDestination { place: Place },
    Pickup { date: NaiveDate, time: NaiveTime },
    Return { date: NaiveDate, time: NaiveTime },
    RoundTrip { is_round_trip: bool },
    Rental(RentalFields),
    Vehicle { car_id: String },
    Passenger {
        name: String,
        whatsapp: String,
        #[serde(default)]
        email: Option<String>,
    },
    PaymentMethod { method: PaymentMethod },
    AbandonPayment,
    Retry,
    StartOver,
}

impl From<DeskEvent> for WizardEvent {
    fn from(event: DeskEvent) -> Self {
        match event {
            DeskEvent::Route { route_id } => WizardEvent::RouteSelected { route_id },
            DeskEvent::ManualDestination { place } => WizardEvent::ManualDestinationSelected { place },
            DeskEvent::Pickup { date, time } => WizardEvent::PickupChanged { date, time },
            DeskEvent::Return { date, time } => WizardEvent::ReturnChanged { date, time },
            DeskEvent::RoundTrip { is_round_trip } => WizardEvent::RoundTripToggled { is_round_trip },
            DeskEvent::Rental(fields) => WizardEvent::RentalChanged(fields),
            DeskEvent::Vehicle { car_id } => WizardEvent::VehicleChosen { car_id },
            DeskEvent::Passenger { name, whatsapp, email } => WizardEvent::PassengerEntered { name, whatsapp, email },
            DeskEvent::PaymentMethod { method } => WizardEvent::PaymentMethodChosen(method),
            DeskEvent::AbandonPayment => WizardEvent::PaymentAbandoned,
            DeskEvent::Retry => WizardEvent::Retry,
            DeskEvent::StartOver => WizardEvent::StartOver,
        }
    }
}

/// POST /api/desk/bookings/{id}/events
///
/// Runs the event and every backend call it triggers before answering.
async fn send_event(
    _: DeskAccess,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<BookingView>, AppError> {
    let event: DeskEvent = parse_body(&body, "Event")?;
    let booking = state.desk.booking(id).await?;
    let mut booking = booking.lock().await;

    let now = booking.hotel.local_now();
    booking.driver.settle_payment(now).await.map_err(wizard_error)?;
    booking.driver.dispatch(event.into(), now).await.map_err(wizard_error)?;
    Ok(Json(BookingView::new(id, &booking)))
}
