use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use evhop_shared::models::{CarOption, UserProfile};
use evhop_shared::{Masked, Rupiah};
use serde::{Deserialize, Serialize};

use crate::payment::{PaymentInstruction, PaymentMethod};
use crate::session::SessionError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Backend returned {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("Backend unreachable: {0}")]
    Transport(String),
    #[error("Unexpected backend response: {0}")]
    InvalidResponse(String),
    #[error("Session unavailable: {0}")]
    Session(String),
}

impl BackendError {
    /// HTTP status to mirror back to callers
    pub fn status_code(&self) -> u16 {
        match self {
            BackendError::Unauthorized => 401,
            BackendError::Upstream { status, .. } => *status,
            BackendError::Transport(_) => 502,
            BackendError::InvalidResponse(_) => 502,
            BackendError::Session(_) => 500,
        }
    }
}

impl From<SessionError> for BackendError {
    fn from(e: SessionError) -> Self {
        BackendError::Session(e.to_string())
    }
}

/// A point the backend can route a car to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationSelection {
    FixedRoute { route_id: String },
    Manual { place: Place },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RentalTerms {
    pub with_driver: bool,
    pub duration_hours: u32,
    pub return_location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripSubmission {
    pub pickup_at: NaiveDateTime,
    pub return_at: Option<NaiveDateTime>,
    pub is_round_trip: bool,
    pub rental: Option<RentalTerms>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedTrip {
    pub order_id: String,
    /// One-way price from the distance lookup; absent for fixed routes.
    #[serde(default)]
    pub price: Option<Rupiah>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedCar {
    #[serde(default)]
    pub price: Option<Rupiah>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerContact {
    pub name: String,
    pub whatsapp: Masked<String>,
    #[serde(default)]
    pub email: Option<Masked<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub passenger: PassengerContact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Account the token belongs to, when the backend sends it along
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Guest sign-in with the contact the booking will use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestLogin {
    pub name: String,
    pub whatsapp: Masked<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Masked<String>>,
}

impl GuestLogin {
    /// Profile to cache when the backend does not echo the account back
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: Some(self.name.clone()),
            whatsapp: Some(self.whatsapp.clone()),
            email: self.email.clone(),
        }
    }
}

/// The booking calls the wizard makes against the remote backend.
///
/// Implementations carry their own credentials; callers never see a token.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn select_pickup(&self, place: &Place) -> Result<(), BackendError>;

    async fn select_destination(&self, destination: &DestinationSelection) -> Result<(), BackendError>;

    async fn set_round_trip(&self, is_round_trip: bool) -> Result<(), BackendError>;

    async fn submit_trip(&self, trip: &TripSubmission) -> Result<SubmittedTrip, BackendError>;

    async fn list_cars(&self, order_id: &str) -> Result<Vec<CarOption>, BackendError>;

    async fn select_car(&self, order_id: &str, car_id: &str) -> Result<SelectedCar, BackendError>;

    async fn pay(&self, order_id: &str, request: &PaymentRequest) -> Result<PaymentInstruction, BackendError>;
}

/// Account endpoints used to obtain bearer tokens.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Create a throwaway account for a device and return its token
    async fn create_anonymous_user(&self, device_id: &str) -> Result<IssuedToken, BackendError>;

    async fn login_guest(&self, login: &GuestLogin) -> Result<IssuedToken, BackendError>;
}
