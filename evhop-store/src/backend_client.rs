//! HTTP client for the remote booking backend

use std::time::Duration;

use async_trait::async_trait;
use evhop_core::backend::{
    AuthApi, BackendError, DestinationSelection, GuestLogin, IssuedToken, PaymentRequest, Place, SelectedCar, SubmittedTrip,
    TripSubmission,
};
use evhop_core::payment::{PaymentDetail, PaymentInstruction};
use evhop_shared::models::{CarOption, UserProfile};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app_config::BackendConfig;

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// Stateless: every call carries the bearer token it should use.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    root: Url,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(transport)?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let root = Url::parse(&base_url)
            .map_err(|e| BackendError::Transport(format!("invalid backend url {}: {}", base_url, e)))?;

        Ok(Self { client, base_url, root })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Each segment is percent-encoded, so ids may contain `/`
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport(format!("backend url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Pass a request through to the backend and return its JSON body as-is.
    ///
    /// An empty success body reads as `null`.
    pub async fn forward(
        &self,
        method: Method,
        path: &[&str],
        query: &[(String, String)],
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, BackendError> {
        self.send(method, path, query, bearer, body).await
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &[&str],
        query: &[(String, String)],
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, BackendError> {
        let url = self.url(path)?;
        let mut request = self.client.request(method.clone(), url.clone());

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path = url.path(), "Calling backend");
        let response = request.send().await.map_err(transport)?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                return Err(BackendError::Unauthorized);
            }
            return Err(upstream_error(status, &text));
        }

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str], query: &[(String, String)], bearer: &str) -> Result<T, BackendError> {
        self.send::<T, Value>(Method::GET, path, query, Some(bearer), None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &[&str], bearer: &str, body: &B) -> Result<T, BackendError> {
        self.send(Method::POST, path, &[], Some(bearer), Some(body)).await
    }

    pub async fn select_pickup(&self, bearer: &str, place: &Place) -> Result<(), BackendError> {
        self.post::<Value, _>(&["trips", "pickup"], bearer, place).await.map(drop)
    }

    pub async fn select_destination(&self, bearer: &str, destination: &DestinationSelection) -> Result<(), BackendError> {
        self.post::<Value, _>(&["trips", "destination"], bearer, destination).await.map(drop)
    }

    pub async fn set_round_trip(&self, bearer: &str, is_round_trip: bool) -> Result<(), BackendError> {
        self.post::<Value, _>(&["trips", "round-trip"], bearer, &json!({ "is_round_trip": is_round_trip }))
            .await
            .map(drop)
    }

    pub async fn submit_trip(&self, bearer: &str, trip: &TripSubmission) -> Result<SubmittedTrip, BackendError> {
        self.post(&["trips", "submit"], bearer, trip).await
    }

    pub async fn list_cars(&self, bearer: &str, order_id: &str) -> Result<Vec<CarOption>, BackendError> {
        self.get(&["cars"], &[("order_id".to_string(), order_id.to_string())], bearer).await
    }

    pub async fn select_car(&self, bearer: &str, order_id: &str, car_id: &str) -> Result<SelectedCar, BackendError> {
        self.post(&["cars", "select"], bearer, &json!({ "order_id": order_id, "car_id": car_id })).await
    }

    pub async fn pay(&self, bearer: &str, order_id: &str, request: &PaymentRequest) -> Result<PaymentInstruction, BackendError> {
        self.post(&["checkout", order_id, "pay"], bearer, request).await
    }

    pub async fn payment_detail(&self, bearer: &str, order_id: &str) -> Result<PaymentDetail, BackendError> {
        self.get(&["checkout", order_id, "payment-detail"], &[], bearer).await
    }

    /// Saved profile as the backend echoes it; an empty reply keeps what was sent
    pub async fn update_profile(&self, bearer: &str, profile: &UserProfile) -> Result<UserProfile, BackendError> {
        let response: Value = self.send(Method::PUT, &["profile"], &[], Some(bearer), Some(profile)).await?;
        let record = match response.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => response,
        };
        if record.is_null() {
            return Ok(profile.clone());
        }
        serde_json::from_value(record).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

/// Pull a message and details out of whatever error shape the backend sent.
fn upstream_error(status: StatusCode, text: &str) -> BackendError {
    let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);

    let message = ["error", "message"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| (!text.trim().is_empty() && body.is_null()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Upstream error").to_string());

    let details = body
        .get("details")
        .or_else(|| body.get("errors"))
        .cloned();

    BackendError::Upstream {
        status: status.as_u16(),
        message,
        details,
    }
}

#[async_trait]
impl AuthApi for BackendClient {
    async fn create_anonymous_user(&self, device_id: &str) -> Result<IssuedToken, BackendError> {
        self.send(Method::POST, &["auth", "anonymous"], &[], None, Some(&json!({ "device_id": device_id })))
            .await
    }

    async fn login_guest(&self, login: &GuestLogin) -> Result<IssuedToken, BackendError> {
        self.send(Method::POST, &["auth", "guest"], &[], None, Some(login)).await
    }
}
