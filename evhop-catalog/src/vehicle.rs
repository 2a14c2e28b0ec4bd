use evhop_shared::models::CarOption;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Vehicle class offered on fixed routes, e.g. `standard` or `premium`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleClass(pub String);

impl VehicleClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vehicle-type ids the partner site is allowed to sell on manual destinations.
#[derive(Debug, Clone, Default)]
pub struct VehicleAllowList {
    type_ids: HashSet<i64>,
}

impl VehicleAllowList {
    pub fn new(type_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            type_ids: type_ids.into_iter().collect(),
        }
    }

    pub fn allows(&self, vehicle_type_id: i64) -> bool {
        self.type_ids.contains(&vehicle_type_id)
    }

    /// Keep only allowed cars, preserving the backend's ordering
    pub fn filter(&self, cars: Vec<CarOption>) -> Vec<CarOption> {
        cars.into_iter()
            .filter(|car| self.allows(car.vehicle_type_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(id: &str, type_id: i64) -> CarOption {
        CarOption {
            id: id.to_string(),
            vehicle_type_id: type_id,
            name: format!("Car {}", id),
            price: None,
        }
    }

    #[test]
    fn test_filter_keeps_order_and_drops_unknown_types() {
        let allow = VehicleAllowList::new([3, 7]);
        let cars = vec![car("a", 7), car("b", 1), car("c", 3), car("d", 9)];

        let ids: Vec<String> = allow.filter(cars).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
