use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use evhop_catalog::{PricingEngine, VehicleAllowList};
use evhop_core::backend::{PassengerContact, PaymentRequest, Place, SelectedCar, SubmittedTrip};
use evhop_core::payment::{PaymentInstruction, PaymentMethod, PaymentOutcome};
use evhop_shared::models::CarOption;
use evhop_shared::Rupiah;
use serde::Serialize;

use crate::contact::{passenger_contact, ContactError};
use crate::models::{BookingDraft, BookingForm, BookingType, Destination, RentalFields, VehicleOption};
use crate::schedule::{NightAdvisory, ScheduleError};

/// Read-only collaborators a transition may consult
pub struct WizardContext<'a> {
    /// Hotel-local wall clock
    pub now: NaiveDateTime,
    pub pricing: &'a PricingEngine,
    pub allow_list: &'a VehicleAllowList,
}

/// Coarse progress of the booking flow, for display.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    NoDestination,
    AwaitingDateTime,
    ReadyToSubmitJourney,
    AwaitingVehicle,
    VehicleChosen,
    PassengerDetailsEntered,
    PaymentMethodSelected,
    PaymentPending,
    PaymentSuccess,
    PaymentExpired,
    PaymentFailed,
    PaymentCancelled,
}

/// A remote order created from one specific draft.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderContext {
    pub order_id: String,
    pub draft: BookingDraft,
    /// One-way fare the backend quoted for a manual destination
    pub base_fare: Option<Rupiah>,
    pub price: Option<Rupiah>,
    pub options: Vec<VehicleOption>,
    pub vehicle: Option<VehicleOption>,
    pub passenger: Option<PassengerContact>,
}

impl OrderContext {
    fn is_manual(&self) -> bool {
        matches!(self.draft, BookingDraft::ManualDestination(_))
    }
}

#[derive(Debug, Clone)]
pub enum Stage {
    Drafting,
    SubmittingJourney { revision: u64, draft: BookingDraft },
    AwaitingVehicle(OrderContext),
    VehicleChosen(OrderContext),
    PassengerDetailsEntered(OrderContext),
    PaymentMethodSelected { order: OrderContext, method: PaymentMethod },
    PaymentPending { order: OrderContext, instruction: PaymentInstruction },
    Finished { order_id: String, outcome: PaymentOutcome },
}

impl Stage {
    fn order(&self) -> Option<&OrderContext> {
        match self {
            Stage::AwaitingVehicle(order)
            | Stage::VehicleChosen(order)
            | Stage::PassengerDetailsEntered(order)
            | Stage::PaymentMethodSelected { order, .. }
            | Stage::PaymentPending { order, .. } => Some(order),
            _ => None,
        }
    }
}

/// Remote backend call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SubmitJourney { revision: u64 },
    LoadCars,
    SelectCar,
    CreatePayment,
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    RouteSelected { route_id: String },
    ManualDestinationSelected { place: Place },
    PickupChanged { date: NaiveDate, time: NaiveTime },
    ReturnChanged { date: NaiveDate, time: NaiveTime },
    RoundTripToggled { is_round_trip: bool },
    RentalChanged(RentalFields),
    JourneySubmitted { revision: u64, trip: SubmittedTrip },
    CarsLoaded { order_id: String, cars: Vec<CarOption> },
    VehicleChosen { car_id: String },
    CarSelected { order_id: String, car: SelectedCar },
    PassengerEntered { name: String, whatsapp: String, email: Option<String> },
    PaymentMethodChosen(PaymentMethod),
    PaymentCreated(PaymentInstruction),
    PaymentResolved { order_id: String, outcome: PaymentOutcome },
    PaymentAbandoned,
    RemoteCallFailed { step: Step, message: String },
    Retry,
    StartOver,
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::RouteSelected { .. } => "route_selected",
            WizardEvent::ManualDestinationSelected { .. } => "manual_destination_selected",
            WizardEvent::PickupChanged { .. } => "pickup_changed",
            WizardEvent::ReturnChanged { .. } => "return_changed",
            WizardEvent::RoundTripToggled { .. } => "round_trip_toggled",
            WizardEvent::RentalChanged(_) => "rental_changed",
            WizardEvent::JourneySubmitted { .. } => "journey_submitted",
            WizardEvent::CarsLoaded { .. } => "cars_loaded",
            WizardEvent::VehicleChosen { .. } => "vehicle_chosen",
            WizardEvent::CarSelected { .. } => "car_selected",
            WizardEvent::PassengerEntered { .. } => "passenger_entered",
            WizardEvent::PaymentMethodChosen(_) => "payment_method_chosen",
            WizardEvent::PaymentCreated(_) => "payment_created",
            WizardEvent::PaymentResolved { .. } => "payment_resolved",
            WizardEvent::PaymentAbandoned => "payment_abandoned",
            WizardEvent::RemoteCallFailed { .. } => "remote_call_failed",
            WizardEvent::Retry => "retry",
            WizardEvent::StartOver => "start_over",
        }
    }
}

/// Side effects a transition asks the driver to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// select pickup, select destination, set round-trip flag, submit trip
    SubmitJourney { revision: u64, pickup: Place, draft: BookingDraft },
    LoadCars { order_id: String },
    SelectCar { order_id: String, car_id: String },
    CreatePayment { order_id: String, request: PaymentRequest },
    StartPolling { order_id: String, expires_at: DateTime<Utc> },
    StopPolling,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
    #[error("Unknown vehicle: {0}")]
    UnknownVehicle(String),
    #[error("Event {event} is not valid while {phase:?}")]
    InvalidTransition { phase: WizardPhase, event: &'static str },
    #[error(transparent)]
    Contact(#[from] ContactError),
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub wizard: BookingWizard,
    pub commands: Vec<Command>,
}

/// The booking flow as an explicit state machine.
///
/// `apply` never mutates; it returns the next wizard plus the commands to run.
/// Any edit that changes what the remote order was built from drops the order
/// and re-submits once the form is complete again.
#[derive(Debug, Clone)]
pub struct BookingWizard {
    pickup: Place,
    form: BookingForm,
    stage: Stage,
    revision: u64,
    validation: Option<ScheduleError>,
    last_error: Option<String>,
}

impl BookingWizard {
    pub fn new(pickup: Place, booking_type: BookingType) -> Self {
        Self {
            pickup,
            form: BookingForm::new(booking_type),
            stage: Stage::Drafting,
            revision: 0,
            validation: None,
            last_error: None,
        }
    }

    pub fn form(&self) -> &BookingForm {
        &self.form
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn order_id(&self) -> Option<&str> {
        self.stage.order().map(|o| o.order_id.as_str())
    }

    pub fn price(&self) -> Option<Rupiah> {
        self.stage.order().and_then(|o| o.price)
    }

    pub fn vehicle(&self) -> Option<&VehicleOption> {
        self.stage.order().and_then(|o| o.vehicle.as_ref())
    }

    pub fn vehicle_options(&self) -> &[VehicleOption] {
        self.stage.order().map(|o| o.options.as_slice()).unwrap_or(&[])
    }

    /// Inline schedule problem blocking submission, if any
    pub fn validation(&self) -> Option<&ScheduleError> {
        self.validation.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn advisories(&self) -> &[NightAdvisory] {
        match &self.stage {
            Stage::SubmittingJourney { draft, .. } => &draft.journey().advisories,
            stage => stage.order().map(|o| o.draft.journey().advisories.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn phase(&self) -> WizardPhase {
        match &self.stage {
            Stage::Drafting if self.form.destination.is_none() => WizardPhase::NoDestination,
            Stage::Drafting => WizardPhase::AwaitingDateTime,
            Stage::SubmittingJourney { .. } => WizardPhase::ReadyToSubmitJourney,
            Stage::AwaitingVehicle(_) => WizardPhase::AwaitingVehicle,
            Stage::VehicleChosen(_) => WizardPhase::VehicleChosen,
            Stage::PassengerDetailsEntered(_) => WizardPhase::PassengerDetailsEntered,
            Stage::PaymentMethodSelected { .. } => WizardPhase::PaymentMethodSelected,
            Stage::PaymentPending { .. } => WizardPhase::PaymentPending,
            Stage::Finished { outcome, .. } => match outcome {
                PaymentOutcome::Success => WizardPhase::PaymentSuccess,
                PaymentOutcome::Expired => WizardPhase::PaymentExpired,
                PaymentOutcome::Failed => WizardPhase::PaymentFailed,
                PaymentOutcome::Cancelled => WizardPhase::PaymentCancelled,
            },
        }
    }

    /// Apply in place, keeping the current state when the event is rejected
    pub fn handle(&mut self, event: WizardEvent, ctx: &WizardContext<'_>) -> Result<Vec<Command>, WizardError> {
        let transition = self.apply(event, ctx)?;
        *self = transition.wizard;
        Ok(transition.commands)
    }

    pub fn apply(&self, event: WizardEvent, ctx: &WizardContext<'_>) -> Result<Transition, WizardError> {
        let event_name = event.name();
        match event {
            WizardEvent::RouteSelected { route_id } => {
                if ctx.pricing.catalog().get(&route_id).is_none() {
                    return Err(WizardError::UnknownRoute(route_id));
                }
                self.edit_form(event_name, ctx, |form| {
                    form.destination = Some(Destination::FixedRoute { route_id });
                })
            }
            WizardEvent::ManualDestinationSelected { place } => self.edit_form(event_name, ctx, |form| {
                form.destination = Some(Destination::Manual { place });
            }),
            WizardEvent::PickupChanged { date, time } => self.edit_form(event_name, ctx, |form| {
                form.pickup_date = Some(date);
                form.pickup_time = Some(time);
            }),
            WizardEvent::ReturnChanged { date, time } => self.edit_form(event_name, ctx, |form| {
                form.return_date = Some(date);
                form.return_time = Some(time);
            }),
            WizardEvent::RoundTripToggled { is_round_trip } => self.edit_form(event_name, ctx, |form| {
                form.is_round_trip = is_round_trip;
            }),
            WizardEvent::RentalChanged(rental) => self.edit_form(event_name, ctx, |form| {
                form.rental = rental;
            }),
            WizardEvent::JourneySubmitted { revision, trip } => self.on_journey_submitted(event_name, revision, trip, ctx),
            WizardEvent::CarsLoaded { order_id, cars } => self.on_cars_loaded(event_name, order_id, cars, ctx),
            WizardEvent::VehicleChosen { car_id } => self.on_vehicle_chosen(event_name, car_id),
            WizardEvent::CarSelected { order_id, car } => self.on_car_selected(event_name, order_id, car),
            WizardEvent::PassengerEntered { name, whatsapp, email } => {
                let passenger = passenger_contact(&name, &whatsapp, email.as_deref())?;
                self.on_passenger_entered(event_name, passenger)
            }
            WizardEvent::PaymentMethodChosen(method) => self.on_payment_method(event_name, method),
            WizardEvent::PaymentCreated(instruction) => self.on_payment_created(event_name, instruction),
            WizardEvent::PaymentResolved { order_id, outcome } => self.on_payment_resolved(event_name, order_id, outcome),
            WizardEvent::PaymentAbandoned => match &self.stage {
                Stage::PaymentPending { order, .. } => {
                    let order_id = order.order_id.clone();
                    Ok(self.finish(order_id, PaymentOutcome::Cancelled))
                }
                _ => Err(self.invalid(event_name)),
            },
            WizardEvent::RemoteCallFailed { step, message } => Ok(self.on_remote_failure(step, message)),
            WizardEvent::Retry => Ok(self.on_retry(ctx)),
            WizardEvent::StartOver => {
                let mut commands = Vec::new();
                if matches!(self.stage, Stage::PaymentPending { .. }) {
                    commands.push(Command::StopPolling);
                }
                let mut wizard = BookingWizard::new(self.pickup.clone(), self.form.booking_type);
                wizard.revision = self.revision;
                Ok(Transition { wizard, commands })
            }
        }
    }

    fn invalid(&self, event: &'static str) -> WizardError {
        WizardError::InvalidTransition { phase: self.phase(), event }
    }

    fn unchanged(&self) -> Transition {
        Transition { wizard: self.clone(), commands: Vec::new() }
    }

    fn edit_form(
        &self,
        event: &'static str,
        ctx: &WizardContext<'_>,
        edit: impl FnOnce(&mut BookingForm),
    ) -> Result<Transition, WizardError> {
        if matches!(self.stage, Stage::Finished { .. }) {
            return Err(self.invalid(event));
        }

        let mut form = self.form.clone();
        edit(&mut form);
        if form == self.form {
            return Ok(self.unchanged());
        }

        let mut next = self.clone();
        next.form = form;

        // Fields the submitted draft never read (return leg on a one-way trip,
        // rental terms on a transfer) leave the remote order alone.
        if let (Some(current), Ok(Some(draft))) = (self.submitted_draft(), next.form.draft(ctx.now)) {
            if current.submits_same_as(&draft) {
                return Ok(Transition { wizard: next, commands: Vec::new() });
            }
        }

        let mut commands = Vec::new();
        if matches!(next.stage, Stage::PaymentPending { .. }) {
            commands.push(Command::StopPolling);
        }
        next.stage = Stage::Drafting;
        next.last_error = None;
        next.evaluate(ctx, &mut commands);
        Ok(Transition { wizard: next, commands })
    }

    /// Draft behind the in-flight submission or the current remote order
    fn submitted_draft(&self) -> Option<&BookingDraft> {
        match &self.stage {
            Stage::SubmittingJourney { draft, .. } => Some(draft),
            stage => stage.order().map(|o| &o.draft),
        }
    }

    /// Move to submission as soon as the form yields a valid draft
    fn evaluate(&mut self, ctx: &WizardContext<'_>, commands: &mut Vec<Command>) {
        match self.form.draft(ctx.now) {
            Ok(Some(draft)) => {
                self.validation = None;
                self.revision += 1;
                commands.push(Command::SubmitJourney {
                    revision: self.revision,
                    pickup: self.pickup.clone(),
                    draft: draft.clone(),
                });
                self.stage = Stage::SubmittingJourney { revision: self.revision, draft };
            }
            Ok(None) => self.validation = None,
            Err(e) => self.validation = Some(e),
        }
    }

    fn on_journey_submitted(
        &self,
        event: &'static str,
        revision: u64,
        trip: SubmittedTrip,
        ctx: &WizardContext<'_>,
    ) -> Result<Transition, WizardError> {
        if revision != self.revision {
            // Response for a draft that has since been edited
            return Ok(self.unchanged());
        }
        let Stage::SubmittingJourney { draft, .. } = &self.stage else {
            return Err(self.invalid(event));
        };

        let is_round_trip = draft.journey().is_round_trip;
        let mut commands = Vec::new();
        let mut order = OrderContext {
            order_id: trip.order_id,
            draft: draft.clone(),
            base_fare: None,
            price: None,
            options: Vec::new(),
            vehicle: None,
            passenger: None,
        };

        match draft {
            BookingDraft::FixedRoute(booking) => {
                let route = ctx
                    .pricing
                    .catalog()
                    .get(&booking.route_id)
                    .ok_or_else(|| WizardError::UnknownRoute(booking.route_id.clone()))?;
                order.options = route
                    .tariffs
                    .iter()
                    .map(|t| VehicleOption {
                        car_id: t.car_type_id.clone(),
                        label: t.vehicle_class.to_string(),
                        class: Some(t.vehicle_class.clone()),
                        price: Some(if is_round_trip { t.round_trip } else { t.one_way }),
                    })
                    .collect();
            }
            BookingDraft::ManualDestination(_) => {
                order.base_fare = trip.price;
                commands.push(Command::LoadCars { order_id: order.order_id.clone() });
            }
        }

        let mut next = self.clone();
        next.last_error = None;
        next.stage = offer_vehicles(order, ctx, &mut commands);
        Ok(Transition { wizard: next, commands })
    }

    fn on_cars_loaded(
        &self,
        event: &'static str,
        order_id: String,
        cars: Vec<CarOption>,
        ctx: &WizardContext<'_>,
    ) -> Result<Transition, WizardError> {
        let Stage::AwaitingVehicle(order) = &self.stage else {
            return match self.order_id() {
                Some(current) if current != order_id => Ok(self.unchanged()),
                _ => Err(self.invalid(event)),
            };
        };
        if order.order_id != order_id {
            return Ok(self.unchanged());
        }

        let mut order = order.clone();
        order.options = ctx
            .allow_list
            .filter(cars)
            .into_iter()
            .map(|car| VehicleOption {
                price: car.price.or(order.base_fare),
                car_id: car.id,
                label: car.name,
                class: None,
            })
            .collect();

        let mut next = self.clone();
        let mut commands = Vec::new();
        next.last_error = if order.options.is_empty() {
            Some("Tidak ada kendaraan tersedia / No vehicles available".to_string())
        } else {
            None
        };
        next.stage = offer_vehicles(order, ctx, &mut commands);
        Ok(Transition { wizard: next, commands })
    }

    fn on_vehicle_chosen(&self, event: &'static str, car_id: String) -> Result<Transition, WizardError> {
        let order = match &self.stage {
            Stage::AwaitingVehicle(order) | Stage::VehicleChosen(order) | Stage::PassengerDetailsEntered(order) => order,
            _ => return Err(self.invalid(event)),
        };
        let option = order
            .options
            .iter()
            .find(|o| o.car_id == car_id)
            .cloned()
            .ok_or_else(|| WizardError::UnknownVehicle(car_id.clone()))?;

        if order.vehicle.as_ref().map(|v| &v.car_id) == Some(&car_id) {
            return Ok(self.unchanged());
        }

        let mut order = order.clone();
        order.price = option.price.or(order.price);
        order.vehicle = Some(option);
        let commands = vec![Command::SelectCar { order_id: order.order_id.clone(), car_id }];

        let mut next = self.clone();
        next.stage = if order.passenger.is_some() {
            Stage::PassengerDetailsEntered(order)
        } else {
            Stage::VehicleChosen(order)
        };
        Ok(Transition { wizard: next, commands })
    }

    /// The backend already knows the trip type, so its price is the final fare.
    fn on_car_selected(&self, event: &'static str, order_id: String, car: SelectedCar) -> Result<Transition, WizardError> {
        let mut next = self.clone();
        let order = match &mut next.stage {
            Stage::VehicleChosen(order) | Stage::PassengerDetailsEntered(order) => order,
            _ if self.order_id().is_some_and(|id| id != order_id) => return Ok(self.unchanged()),
            _ => return Err(self.invalid(event)),
        };
        if order.order_id != order_id {
            return Ok(self.unchanged());
        }

        if let Some(price) = car.price {
            order.price = Some(price);
        }
        Ok(Transition { wizard: next, commands: Vec::new() })
    }

    fn on_passenger_entered(&self, event: &'static str, passenger: PassengerContact) -> Result<Transition, WizardError> {
        let order = match &self.stage {
            Stage::VehicleChosen(order) | Stage::PassengerDetailsEntered(order) => order,
            _ => return Err(self.invalid(event)),
        };
        let mut order = order.clone();
        order.passenger = Some(passenger);

        let mut next = self.clone();
        next.stage = Stage::PassengerDetailsEntered(order);
        Ok(Transition { wizard: next, commands: Vec::new() })
    }

    fn on_payment_method(&self, event: &'static str, method: PaymentMethod) -> Result<Transition, WizardError> {
        let Stage::PassengerDetailsEntered(order) = &self.stage else {
            return Err(self.invalid(event));
        };
        let Some(passenger) = order.passenger.clone() else {
            return Err(self.invalid(event));
        };

        let commands = vec![Command::CreatePayment {
            order_id: order.order_id.clone(),
            request: PaymentRequest { method: method.clone(), passenger },
        }];
        let mut next = self.clone();
        next.last_error = None;
        next.stage = Stage::PaymentMethodSelected { order: order.clone(), method };
        Ok(Transition { wizard: next, commands })
    }

    fn on_payment_created(&self, event: &'static str, instruction: PaymentInstruction) -> Result<Transition, WizardError> {
        let Stage::PaymentMethodSelected { order, .. } = &self.stage else {
            return Err(self.invalid(event));
        };
        if order.order_id != instruction.order_id {
            return Err(self.invalid(event));
        }

        let commands = vec![Command::StartPolling {
            order_id: order.order_id.clone(),
            expires_at: instruction.expires_at,
        }];
        let mut next = self.clone();
        next.stage = Stage::PaymentPending { order: order.clone(), instruction };
        Ok(Transition { wizard: next, commands })
    }

    fn on_payment_resolved(
        &self,
        event: &'static str,
        order_id: String,
        outcome: PaymentOutcome,
    ) -> Result<Transition, WizardError> {
        match &self.stage {
            Stage::PaymentPending { order, .. } if order.order_id == order_id => Ok(self.finish(order_id, outcome)),
            Stage::PaymentPending { .. } => Ok(self.unchanged()),
            _ => Err(self.invalid(event)),
        }
    }

    fn finish(&self, order_id: String, outcome: PaymentOutcome) -> Transition {
        let mut next = self.clone();
        next.stage = Stage::Finished { order_id, outcome };
        Transition { wizard: next, commands: vec![Command::StopPolling] }
    }

    fn on_remote_failure(&self, step: Step, message: String) -> Transition {
        let mut next = self.clone();
        match (step, &self.stage) {
            (Step::SubmitJourney { revision }, Stage::SubmittingJourney { .. }) if revision == self.revision => {
                next.stage = Stage::Drafting;
            }
            (Step::SubmitJourney { .. }, _) => return self.unchanged(),
            (Step::CreatePayment, Stage::PaymentMethodSelected { order, .. }) => {
                next.stage = Stage::PassengerDetailsEntered(order.clone());
            }
            _ => {}
        }
        next.last_error = Some(message);
        Transition { wizard: next, commands: Vec::new() }
    }

    fn on_retry(&self, ctx: &WizardContext<'_>) -> Transition {
        let mut next = self.clone();
        let mut commands = Vec::new();
        next.last_error = None;

        match &self.stage {
            Stage::Drafting => next.evaluate(ctx, &mut commands),
            Stage::AwaitingVehicle(order) if order.is_manual() && order.options.is_empty() => {
                commands.push(Command::LoadCars { order_id: order.order_id.clone() });
            }
            Stage::VehicleChosen(order) | Stage::PassengerDetailsEntered(order) => {
                if let Some(vehicle) = &order.vehicle {
                    commands.push(Command::SelectCar {
                        order_id: order.order_id.clone(),
                        car_id: vehicle.car_id.clone(),
                    });
                }
            }
            _ => return self.unchanged(),
        }
        Transition { wizard: next, commands }
    }
}

/// Price the options and pick a lone one automatically; otherwise the guest picks.
///
/// Manual destinations arrive with one-way fares; this is the only place the
/// round-trip rule is applied to them. Fixed-route options are already tariff prices.
fn offer_vehicles(mut order: OrderContext, ctx: &WizardContext<'_>, commands: &mut Vec<Command>) -> Stage {
    if order.is_manual() {
        let is_round_trip = order.draft.journey().is_round_trip;
        let fare = |one_way: Rupiah| ctx.pricing.quote_manual(one_way, is_round_trip).total();
        order.price = order.base_fare.map(fare);
        for option in &mut order.options {
            option.price = option.price.map(fare);
        }
    }

    if let [only] = order.options.as_slice() {
        let only = only.clone();
        commands.push(Command::SelectCar {
            order_id: order.order_id.clone(),
            car_id: only.car_id.clone(),
        });
        order.price = only.price.or(order.price);
        order.vehicle = Some(only);
        return Stage::VehicleChosen(order);
    }
    Stage::AwaitingVehicle(order)
}
