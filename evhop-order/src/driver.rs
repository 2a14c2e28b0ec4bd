use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDateTime;
use evhop_catalog::{PricingEngine, VehicleAllowList};
use evhop_core::backend::{BackendError, BookingBackend, Place, SubmittedTrip};
use evhop_core::payment::{PaymentGateway, PaymentOutcome};

use crate::models::BookingDraft;
use crate::poller::{PaymentPoller, PollHandle};
use crate::wizard::{BookingWizard, Command, Step, WizardContext, WizardError, WizardEvent};

/// Runs a [`BookingWizard`] against a live backend.
///
/// Commands are executed one at a time in the order the wizard emitted them;
/// each remote result is fed back as the next event.
pub struct WizardDriver {
    backend: Arc<dyn BookingBackend>,
    poller: PaymentPoller,
    pricing: Arc<PricingEngine>,
    allow_list: Arc<VehicleAllowList>,
    wizard: BookingWizard,
    polling: Option<PollHandle>,
}

impl WizardDriver {
    pub fn new(
        wizard: BookingWizard,
        backend: Arc<dyn BookingBackend>,
        gateway: Arc<dyn PaymentGateway>,
        pricing: Arc<PricingEngine>,
        allow_list: Arc<VehicleAllowList>,
    ) -> Self {
        Self {
            backend,
            poller: PaymentPoller::new(gateway),
            pricing,
            allow_list,
            wizard,
            polling: None,
        }
    }

    pub fn with_poller(mut self, poller: PaymentPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn wizard(&self) -> &BookingWizard {
        &self.wizard
    }

    pub fn is_polling(&self) -> bool {
        self.polling.as_ref().is_some_and(|h| !h.is_cancelled())
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.polling.as_ref().and_then(PollHandle::remaining_seconds)
    }

    /// Apply a guest event and run everything it triggers.
    ///
    /// Only the guest's own event can be rejected; follow-up events from remote
    /// results that no longer apply are logged and dropped.
    pub async fn dispatch(&mut self, event: WizardEvent, now: NaiveDateTime) -> Result<(), WizardError> {
        let mut queue = VecDeque::from([event]);
        let mut first = true;

        while let Some(event) = queue.pop_front() {
            let ctx = WizardContext {
                now,
                pricing: &self.pricing,
                allow_list: &self.allow_list,
            };
            let commands = match self.wizard.handle(event, &ctx) {
                Ok(commands) => commands,
                Err(e) if first => return Err(e),
                Err(e) => {
                    tracing::warn!("Dropping follow-up event: {}", e);
                    continue;
                }
            };
            first = false;

            for command in commands {
                if let Some(next) = self.execute(command).await {
                    queue.push_back(next);
                }
            }
        }
        Ok(())
    }

    /// Wait for the running poll to resolve and feed its outcome to the wizard
    pub async fn await_payment(&mut self, now: NaiveDateTime) -> Result<Option<PaymentOutcome>, WizardError> {
        let Some(handle) = self.polling.as_mut() else {
            return Ok(None);
        };
        let Some(outcome) = handle.outcome().await else {
            return Ok(None);
        };
        self.resolve_payment(outcome, now).await
    }

    /// Like [`await_payment`](Self::await_payment), but only if the outcome is already in
    pub async fn settle_payment(&mut self, now: NaiveDateTime) -> Result<Option<PaymentOutcome>, WizardError> {
        let Some(outcome) = self.polling.as_mut().and_then(PollHandle::try_outcome) else {
            return Ok(None);
        };
        self.resolve_payment(outcome, now).await
    }

    async fn resolve_payment(&mut self, outcome: PaymentOutcome, now: NaiveDateTime) -> Result<Option<PaymentOutcome>, WizardError> {
        let Some(order_id) = self.wizard.order_id().map(str::to_string) else {
            return Ok(None);
        };

        self.dispatch(WizardEvent::PaymentResolved { order_id, outcome }, now).await?;
        Ok(Some(outcome))
    }

    async fn execute(&mut self, command: Command) -> Option<WizardEvent> {
        match command {
            Command::SubmitJourney { revision, pickup, draft } => {
                Some(match self.submit_journey(&pickup, &draft).await {
                    Ok(trip) => WizardEvent::JourneySubmitted { revision, trip },
                    Err(e) => failed(Step::SubmitJourney { revision }, e),
                })
            }
            Command::LoadCars { order_id } => Some(match self.backend.list_cars(&order_id).await {
                Ok(cars) => WizardEvent::CarsLoaded { order_id, cars },
                Err(e) => failed(Step::LoadCars, e),
            }),
            Command::SelectCar { order_id, car_id } => {
                Some(match self.backend.select_car(&order_id, &car_id).await {
                    Ok(car) => WizardEvent::CarSelected { order_id, car },
                    Err(e) => failed(Step::SelectCar, e),
                })
            }
            Command::CreatePayment { order_id, request } => {
                Some(match self.backend.pay(&order_id, &request).await {
                    Ok(instruction) => WizardEvent::PaymentCreated(instruction),
                    Err(e) => failed(Step::CreatePayment, e),
                })
            }
            Command::StartPolling { order_id, expires_at } => {
                if let Some(previous) = self.polling.take() {
                    previous.cancel();
                }
                tracing::info!(order_id = %order_id, %expires_at, "Polling payment status");
                self.polling = Some(self.poller.spawn(order_id, Some(expires_at)));
                None
            }
            Command::StopPolling => {
                if let Some(handle) = self.polling.take() {
                    handle.cancel();
                }
                None
            }
        }
    }

    async fn submit_journey(&self, pickup: &Place, draft: &BookingDraft) -> Result<SubmittedTrip, BackendError> {
        let submission = draft.trip_submission();
        self.backend.select_pickup(pickup).await?;
        self.backend.select_destination(&draft.destination_selection()).await?;
        self.backend.set_round_trip(submission.is_round_trip).await?;
        self.backend.submit_trip(&submission).await
    }
}

fn failed(step: Step, error: BackendError) -> WizardEvent {
    tracing::warn!(?step, "Backend call failed: {}", error);
    WizardEvent::RemoteCallFailed {
        step,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingType;
    use crate::wizard::WizardPhase;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use evhop_catalog::{FixedRoute, RouteCatalog, RouteTariff, VehicleClass};
    use evhop_core::backend::{DestinationSelection, PaymentRequest, SelectedCar, TripSubmission};
    use evhop_core::payment::{PaymentDetail, PaymentInstruction, PaymentMethod, PaymentStatus};
    use evhop_shared::models::CarOption;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        fail_submit: bool,
    }

    impl FakeBackend {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BookingBackend for FakeBackend {
        async fn select_pickup(&self, place: &Place) -> Result<(), BackendError> {
            self.record(format!("pickup:{}", place.label));
            Ok(())
        }

        async fn select_destination(&self, destination: &DestinationSelection) -> Result<(), BackendError> {
            match destination {
                DestinationSelection::FixedRoute { route_id } => self.record(format!("route:{}", route_id)),
                DestinationSelection::Manual { place } => self.record(format!("manual:{}", place.label)),
            }
            Ok(())
        }

        async fn set_round_trip(&self, is_round_trip: bool) -> Result<(), BackendError> {
            self.record(format!("round_trip:{}", is_round_trip));
            Ok(())
        }

        async fn submit_trip(&self, _trip: &TripSubmission) -> Result<SubmittedTrip, BackendError> {
            self.record("submit");
            if self.fail_submit {
                return Err(BackendError::Upstream {
                    status: 422,
                    message: "Jadwal penuh".to_string(),
                    details: None,
                });
            }
            Ok(SubmittedTrip { order_id: "ORD-7".to_string(), price: None })
        }

        async fn list_cars(&self, order_id: &str) -> Result<Vec<CarOption>, BackendError> {
            self.record(format!("cars:{}", order_id));
            Ok(vec![])
        }

        async fn select_car(&self, order_id: &str, car_id: &str) -> Result<SelectedCar, BackendError> {
            self.record(format!("select_car:{}:{}", order_id, car_id));
            Ok(SelectedCar { price: Some(250_000) })
        }

        async fn pay(&self, order_id: &str, request: &PaymentRequest) -> Result<PaymentInstruction, BackendError> {
            self.record(format!("pay:{}:{}", order_id, request.passenger.name));
            Ok(PaymentInstruction {
                order_id: order_id.to_string(),
                amount: 250_000,
                va_number: None,
                qris_payload: Some("000201".to_string()),
                expires_at: Utc::now() + chrono::Duration::minutes(15),
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeBackend {
        async fn payment_detail(&self, order_id: &str) -> Result<PaymentDetail, BackendError> {
            self.record("detail");
            Ok(PaymentDetail {
                order_id: order_id.to_string(),
                status: PaymentStatus::Paid,
                paid_at: Some(Utc::now()),
            })
        }
    }

    fn driver(backend: Arc<FakeBackend>) -> WizardDriver {
        let catalog = RouteCatalog::new(vec![FixedRoute {
            id: "airport".to_string(),
            hotel_slug: "grand-kuta".to_string(),
            name: "Ngurah Rai Airport".to_string(),
            latitude: None,
            longitude: None,
            tariffs: vec![RouteTariff {
                vehicle_class: VehicleClass::new("standard"),
                car_type_id: "ev-std".to_string(),
                one_way: 250_000,
                round_trip: 450_000,
            }],
        }]);
        let hotel = Place { label: "Grand Kuta".to_string(), latitude: -8.72, longitude: 115.17 };

        WizardDriver::new(
            BookingWizard::new(hotel, BookingType::Transfer),
            backend.clone(),
            backend.clone(),
            Arc::new(PricingEngine::new(catalog)),
            Arc::new(VehicleAllowList::new([7])),
        )
        .with_poller(PaymentPoller::new(backend).with_success_delay(Duration::ZERO))
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    async fn reach_vehicle(driver: &mut WizardDriver) {
        driver
            .dispatch(WizardEvent::RouteSelected { route_id: "airport".to_string() }, now())
            .await
            .unwrap();
        driver
            .dispatch(
                WizardEvent::PickupChanged {
                    date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                    time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                },
                now(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_journey_runs_calls_in_order() {
        let backend = Arc::new(FakeBackend::default());
        let mut driver = driver(backend.clone());

        reach_vehicle(&mut driver).await;

        assert_eq!(
            backend.calls(),
            vec![
                "pickup:Grand Kuta",
                "route:airport",
                "round_trip:false",
                "submit",
                "select_car:ORD-7:ev-std",
            ]
        );
        assert_eq!(driver.wizard().phase(), WizardPhase::VehicleChosen);
        assert_eq!(driver.wizard().price(), Some(250_000));
    }

    #[tokio::test]
    async fn test_submit_failure_surfaces_error() {
        let backend = Arc::new(FakeBackend { fail_submit: true, ..Default::default() });
        let mut driver = driver(backend.clone());

        reach_vehicle(&mut driver).await;

        assert_eq!(driver.wizard().phase(), WizardPhase::AwaitingDateTime);
        assert!(driver.wizard().last_error().is_some_and(|m| m.contains("Jadwal penuh")));
        assert_eq!(driver.wizard().order_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_resolves_through_poller() {
        let backend = Arc::new(FakeBackend::default());
        let mut driver = driver(backend.clone());
        reach_vehicle(&mut driver).await;

        driver
            .dispatch(
                WizardEvent::PassengerEntered {
                    name: "Made".to_string(),
                    whatsapp: "081234567890".to_string(),
                    email: None,
                },
                now(),
            )
            .await
            .unwrap();
        driver
            .dispatch(WizardEvent::PaymentMethodChosen(PaymentMethod::Qris), now())
            .await
            .unwrap();

        assert_eq!(driver.wizard().phase(), WizardPhase::PaymentPending);
        assert!(driver.is_polling());
        assert!(backend.calls().contains(&"pay:ORD-7:Made".to_string()));

        assert_eq!(driver.settle_payment(now()).await.unwrap(), None);
        assert_eq!(driver.wizard().phase(), WizardPhase::PaymentPending);

        let outcome = driver.await_payment(now()).await.unwrap();
        assert_eq!(outcome, Some(PaymentOutcome::Success));
        assert_eq!(driver.wizard().phase(), WizardPhase::PaymentSuccess);
        assert!(!driver.is_polling());
    }

    #[tokio::test]
    async fn test_rejected_guest_event_is_returned() {
        let backend = Arc::new(FakeBackend::default());
        let mut driver = driver(backend);

        let err = driver
            .dispatch(WizardEvent::PaymentMethodChosen(PaymentMethod::Qris), now())
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::InvalidTransition { .. }));
    }
}
