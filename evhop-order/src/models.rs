use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use evhop_catalog::VehicleClass;
use evhop_core::backend::{DestinationSelection, Place, RentalTerms, TripSubmission};
use evhop_shared::Rupiah;
use serde::{Deserialize, Serialize};

use crate::schedule::{NightAdvisory, Schedule, ScheduleError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Transfer,
    Rental,
}

/// Where the guest is going. Holding one enum makes route and manual
/// destination mutually exclusive by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    FixedRoute { route_id: String },
    Manual { place: Place },
}

/// Rental inputs, filled field by field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RentalFields {
    pub with_driver: Option<bool>,
    pub duration_hours: Option<u32>,
    pub return_location: Option<String>,
}

impl RentalFields {
    pub fn terms(&self) -> Option<RentalTerms> {
        let return_location = self.return_location.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(RentalTerms {
            with_driver: self.with_driver?,
            duration_hours: self.duration_hours.filter(|h| *h > 0)?,
            return_location: return_location.to_string(),
        })
    }
}

/// Everything the guest has typed so far. Only the fields that end up in the
/// `BookingDraft` feed the remote order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingForm {
    pub booking_type: BookingType,
    pub destination: Option<Destination>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub is_round_trip: bool,
    pub return_date: Option<NaiveDate>,
    pub return_time: Option<NaiveTime>,
    pub rental: RentalFields,
}

impl BookingForm {
    pub fn new(booking_type: BookingType) -> Self {
        Self {
            booking_type,
            destination: None,
            pickup_date: None,
            pickup_time: None,
            is_round_trip: false,
            return_date: None,
            return_time: None,
            rental: RentalFields::default(),
        }
    }

    pub fn selected_route(&self) -> Option<&str> {
        match &self.destination {
            Some(Destination::FixedRoute { route_id }) => Some(route_id),
            _ => None,
        }
    }

    pub fn manual_destination(&self) -> Option<&Place> {
        match &self.destination {
            Some(Destination::Manual { place }) => Some(place),
            _ => None,
        }
    }

    /// `None` until every required date/time field is present
    pub fn schedule(&self) -> Option<Schedule> {
        let pickup = NaiveDateTime::new(self.pickup_date?, self.pickup_time?);
        let return_at = if self.is_round_trip {
            Some(NaiveDateTime::new(self.return_date?, self.return_time?))
        } else {
            None
        };
        Some(Schedule { pickup, return_at })
    }

    /// Build the typed draft once the form is complete and valid.
    ///
    /// `Ok(None)` means fields are still missing; `Err` is an inline validation failure.
    pub fn draft(&self, now: NaiveDateTime) -> Result<Option<BookingDraft>, ScheduleError> {
        let Some(destination) = self.destination.clone() else {
            return Ok(None);
        };
        let Some(schedule) = self.schedule() else {
            return Ok(None);
        };
        let rental = match self.booking_type {
            BookingType::Rental => match self.rental.terms() {
                Some(terms) => Some(terms),
                None => return Ok(None),
            },
            BookingType::Transfer => None,
        };

        let advisories = schedule.validate(now)?;
        let journey = Journey {
            schedule,
            is_round_trip: self.is_round_trip,
            rental,
            advisories,
        };

        Ok(Some(match destination {
            Destination::FixedRoute { route_id } => {
                BookingDraft::FixedRoute(FixedRouteBooking { route_id, journey })
            }
            Destination::Manual { place } => {
                BookingDraft::ManualDestination(ManualDestinationBooking { destination: place, journey })
            }
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journey {
    pub schedule: Schedule,
    pub is_round_trip: bool,
    pub rental: Option<RentalTerms>,
    pub advisories: Vec<NightAdvisory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedRouteBooking {
    pub route_id: String,
    pub journey: Journey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualDestinationBooking {
    pub destination: Place,
    pub journey: Journey,
}

/// A complete, validated booking ready to be sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingDraft {
    FixedRoute(FixedRouteBooking),
    ManualDestination(ManualDestinationBooking),
}

impl BookingDraft {
    pub fn journey(&self) -> &Journey {
        match self {
            BookingDraft::FixedRoute(b) => &b.journey,
            BookingDraft::ManualDestination(b) => &b.journey,
        }
    }

    pub fn destination_selection(&self) -> DestinationSelection {
        match self {
            BookingDraft::FixedRoute(b) => DestinationSelection::FixedRoute { route_id: b.route_id.clone() },
            BookingDraft::ManualDestination(b) => DestinationSelection::Manual { place: b.destination.clone() },
        }
    }

    /// Both drafts send identical requests to the backend
    pub fn submits_same_as(&self, other: &BookingDraft) -> bool {
        self.destination_selection() == other.destination_selection()
            && self.trip_submission() == other.trip_submission()
    }

    pub fn trip_submission(&self) -> TripSubmission {
        let journey = self.journey();
        TripSubmission {
            pickup_at: journey.schedule.pickup,
            return_at: journey.schedule.return_at,
            is_round_trip: journey.is_round_trip,
            rental: journey.rental.clone(),
        }
    }
}

/// One selectable vehicle: a tariff class on fixed routes, a backend car otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleOption {
    pub car_id: String,
    pub label: String,
    pub class: Option<VehicleClass>,
    pub price: Option<Rupiah>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn filled(booking_type: BookingType) -> BookingForm {
        let mut form = BookingForm::new(booking_type);
        form.destination = Some(Destination::FixedRoute { route_id: "airport".to_string() });
        form.pickup_date = NaiveDate::from_ymd_opt(2026, 10, 19);
        form.pickup_time = NaiveTime::from_hms_opt(9, 0, 0);
        form
    }

    #[test]
    fn test_incomplete_form_has_no_draft() {
        let mut form = filled(BookingType::Transfer);
        form.pickup_time = None;
        assert_eq!(form.draft(now()), Ok(None));

        let mut round = filled(BookingType::Transfer);
        round.is_round_trip = true;
        assert_eq!(round.draft(now()), Ok(None));
    }

    #[test]
    fn test_rental_requires_all_rental_fields() {
        let mut form = filled(BookingType::Rental);
        form.rental.with_driver = Some(true);
        form.rental.duration_hours = Some(12);
        assert_eq!(form.draft(now()), Ok(None));

        form.rental.return_location = Some("Lobby".to_string());
        let draft = form.draft(now()).unwrap().unwrap();
        assert_eq!(draft.trip_submission().rental.unwrap().duration_hours, 12);
    }

    #[test]
    fn test_draft_variant_follows_destination() {
        let fixed = filled(BookingType::Transfer).draft(now()).unwrap().unwrap();
        assert!(matches!(fixed, BookingDraft::FixedRoute(_)));

        let mut form = filled(BookingType::Transfer);
        form.destination = Some(Destination::Manual {
            place: Place { label: "Ubud".to_string(), latitude: -8.5, longitude: 115.26 },
        });
        let manual = form.draft(now()).unwrap().unwrap();
        assert!(matches!(
            manual.destination_selection(),
            DestinationSelection::Manual { .. }
        ));
    }
}
