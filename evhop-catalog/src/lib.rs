pub mod route;
pub mod pricing;
pub mod vehicle;

pub use route::{FixedRoute, RouteCatalog, RouteTariff};
pub use pricing::{round_trip_price, PriceQuote, PricingEngine, PricingError};
pub use vehicle::{VehicleAllowList, VehicleClass};
