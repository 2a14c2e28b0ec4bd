use evhop_shared::Rupiah;
use serde::{Deserialize, Serialize};

use crate::vehicle::VehicleClass;

/// Price entry for one vehicle class on a fixed route.
///
/// One-way and round-trip are independent numbers from the externally
/// maintained tariff sheet; neither is derived from the other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteTariff {
    pub vehicle_class: VehicleClass,
    pub car_type_id: String,
    pub one_way: Rupiah,
    pub round_trip: Rupiah,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedRoute {
    pub id: String,
    pub hotel_slug: String,
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub tariffs: Vec<RouteTariff>,
}

impl FixedRoute {
    pub fn tariff(&self, class: &VehicleClass) -> Option<&RouteTariff> {
        self.tariffs.iter().find(|t| &t.vehicle_class == class)
    }

    pub fn vehicle_classes(&self) -> impl Iterator<Item = &VehicleClass> {
        self.tariffs.iter().map(|t| &t.vehicle_class)
    }
}

/// All fixed-price routes across partner hotels
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    routes: Vec<FixedRoute>,
}

impl RouteCatalog {
    pub fn new(routes: Vec<FixedRoute>) -> Self {
        Self { routes }
    }

    pub fn get(&self, route_id: &str) -> Option<&FixedRoute> {
        self.routes.iter().find(|r| r.id == route_id)
    }

    pub fn for_hotel<'a>(&'a self, hotel_slug: &'a str) -> impl Iterator<Item = &'a FixedRoute> + 'a {
        self.routes.iter().filter(move |r| r.hotel_slug == hotel_slug)
    }
}
