use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use evhop_core::backend::{
    BackendError, BookingBackend, DestinationSelection, PaymentRequest, Place, SelectedCar, SubmittedTrip,
    TripSubmission,
};
use evhop_core::payment::{PaymentDetail, PaymentGateway, PaymentInstruction};
use evhop_shared::models::{CarOption, UserProfile};
use tracing::warn;

use crate::backend_client::BackendClient;
use crate::guest_auth::GuestTokenProvider;

/// Backend calls made on behalf of the current session.
///
/// A 401 clears the token that was used, fetches a fresh one and retries once;
/// the second failure is returned unchanged.
pub struct SessionBackend {
    client: BackendClient,
    tokens: Arc<GuestTokenProvider>,
}

impl SessionBackend {
    pub fn new(client: BackendClient, tokens: Arc<GuestTokenProvider>) -> Self {
        Self { client, tokens }
    }

    pub fn tokens(&self) -> &Arc<GuestTokenProvider> {
        &self.tokens
    }

    /// Save the profile remotely, then refresh the cached copy with what the backend kept
    pub async fn update_profile(&self, profile: &UserProfile) -> Result<UserProfile, BackendError> {
        let saved = self
            .with_token(move |t| async move { self.client.update_profile(&t, profile).await })
            .await?;
        self.tokens.store().set_profile(saved.clone()).await?;
        Ok(saved)
    }

    async fn with_token<T, F, Fut>(&self, call: F) -> Result<T, BackendError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let (kind, token) = self.tokens.token().await?;
        match call(token).await {
            Err(BackendError::Unauthorized) => {
                warn!(?kind, "Token rejected by backend, retrying with a fresh one");
                self.tokens.invalidate(kind).await?;
                let (_, token) = self.tokens.token().await?;
                call(token).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl BookingBackend for SessionBackend {
    async fn select_pickup(&self, place: &Place) -> Result<(), BackendError> {
        self.with_token(move |t| async move { self.client.select_pickup(&t, place).await })
            .await
    }

    async fn select_destination(&self, destination: &DestinationSelection) -> Result<(), BackendError> {
        self.with_token(move |t| async move { self.client.select_destination(&t, destination).await })
            .await
    }

    async fn set_round_trip(&self, is_round_trip: bool) -> Result<(), BackendError> {
        self.with_token(move |t| async move { self.client.set_round_trip(&t, is_round_trip).await })
            .await
    }

    async fn submit_trip(&self, trip: &TripSubmission) -> Result<SubmittedTrip, BackendError> {
        self.with_token(move |t| async move { self.client.submit_trip(&t, trip).await })
            .await
    }

    async fn list_cars(&self, order_id: &str) -> Result<Vec<CarOption>, BackendError> {
        self.with_token(move |t| async move { self.client.list_cars(&t, order_id).await })
            .await
    }

    async fn select_car(&self, order_id: &str, car_id: &str) -> Result<SelectedCar, BackendError> {
        self.with_token(move |t| async move { self.client.select_car(&t, order_id, car_id).await })
            .await
    }

    async fn pay(&self, order_id: &str, request: &PaymentRequest) -> Result<PaymentInstruction, BackendError> {
        self.with_token(move |t| async move { self.client.pay(&t, order_id, request).await })
            .await
    }
}

#[async_trait]
impl PaymentGateway for SessionBackend {
    async fn payment_detail(&self, order_id: &str) -> Result<PaymentDetail, BackendError> {
        self.with_token(move |t| async move { self.client.payment_detail(&t, order_id).await })
            .await
    }
}
