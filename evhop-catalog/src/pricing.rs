use evhop_shared::Rupiah;
use serde::{Deserialize, Serialize};

use crate::route::RouteCatalog;
use crate::vehicle::VehicleClass;

/// Flat amount taken off the doubled one-way fare for manual destinations.
pub const ROUND_TRIP_DISCOUNT: Rupiah = 10_000;

/// Round-trip fare for a manually searched destination.
///
/// Not guarded: a zero or negative one-way price produces a meaningless result.
/// Callers only invoke this with a positive price from the distance lookup.
pub fn round_trip_price(one_way: Rupiah) -> Rupiah {
    one_way * 2 - ROUND_TRIP_DISCOUNT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    pub one_way: Rupiah,
    pub round_trip: Rupiah,
    pub is_round_trip: bool,
}

impl PriceQuote {
    /// The fare that applies to the chosen trip type
    pub fn total(&self) -> Rupiah {
        if self.is_round_trip {
            self.round_trip
        } else {
            self.one_way
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
    #[error("Route {route} has no tariff for vehicle class {class}")]
    NoTariff { route: String, class: String },
}

/// Quotes both destination kinds: fixed routes from the tariff table,
/// manual destinations from the distance-based one-way price.
pub struct PricingEngine {
    catalog: RouteCatalog,
}

impl PricingEngine {
    pub fn new(catalog: RouteCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    pub fn quote_fixed_route(
        &self,
        route_id: &str,
        class: &VehicleClass,
        is_round_trip: bool,
    ) -> Result<PriceQuote, PricingError> {
        let route = self
            .catalog
            .get(route_id)
            .ok_or_else(|| PricingError::UnknownRoute(route_id.to_string()))?;

        let tariff = route.tariff(class).ok_or_else(|| PricingError::NoTariff {
            route: route_id.to_string(),
            class: class.to_string(),
        })?;

        Ok(PriceQuote {
            one_way: tariff.one_way,
            round_trip: tariff.round_trip,
            is_round_trip,
        })
    }

    pub fn quote_manual(&self, one_way: Rupiah, is_round_trip: bool) -> PriceQuote {
        PriceQuote {
            one_way,
            round_trip: round_trip_price(one_way),
            is_round_trip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{FixedRoute, RouteTariff};

    fn engine() -> PricingEngine {
        PricingEngine::new(RouteCatalog::new(vec![FixedRoute {
            id: "airport".to_string(),
            hotel_slug: "grand-kuta".to_string(),
            name: "Ngurah Rai Airport".to_string(),
            latitude: None,
            longitude: None,
            tariffs: vec![RouteTariff {
                vehicle_class: VehicleClass::new("standard"),
                car_type_id: "7".to_string(),
                one_way: 250_000,
                // Tariff sheet value, deliberately not 2x - 10k
                round_trip: 450_000,
            }],
        }]))
    }

    #[test]
    fn test_round_trip_price() {
        assert_eq!(round_trip_price(100_000), 190_000);
        // Unguarded edge, kept as-is
        assert_eq!(round_trip_price(0), -10_000);
    }

    #[test]
    fn test_fixed_route_uses_tariff_sheet() {
        let quote = engine()
            .quote_fixed_route("airport", &VehicleClass::new("standard"), true)
            .unwrap();

        assert_eq!(quote.total(), 450_000);
        assert_ne!(quote.round_trip, round_trip_price(quote.one_way));
    }

    #[test]
    fn test_fixed_route_errors() {
        let engine = engine();
        assert_eq!(
            engine.quote_fixed_route("harbour", &VehicleClass::new("standard"), false),
            Err(PricingError::UnknownRoute("harbour".to_string()))
        );
        assert!(matches!(
            engine.quote_fixed_route("airport", &VehicleClass::new("van"), false),
            Err(PricingError::NoTariff { .. })
        ));
    }

    #[test]
    fn test_manual_quote() {
        let quote = engine().quote_manual(100_000, false);
        assert_eq!(quote.total(), 100_000);
        assert_eq!(quote.round_trip, 190_000);
    }
}
