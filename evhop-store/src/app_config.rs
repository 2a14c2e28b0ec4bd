use chrono::{Duration, NaiveDateTime, Utc};
use evhop_catalog::{FixedRoute, RouteCatalog, VehicleAllowList};
use evhop_core::backend::Place;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub desk: DeskConfig,
    #[serde(default)]
    pub vehicles: VehiclesConfig,
    #[serde(default)]
    pub hotels: Vec<HotelConfig>,
    #[serde(default)]
    pub routes: Vec<FixedRoute>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 { 15 }

/// Where client-side tokens live. No Redis URL means in-process memory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    pub redis_url: Option<String>,
}

/// Front-desk booking routes. Without an access key they answer 404.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeskConfig {
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VehiclesConfig {
    /// Vehicle-type ids sellable on manual destinations
    #[serde(default)]
    pub allowed_type_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HotelConfig {
    pub slug: String,
    pub name: String,
    pub whatsapp_support: String,
    /// Lobby coordinates, the pickup point for desk bookings
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

/// Bali, WITA
fn default_utc_offset() -> i32 { 8 }

impl HotelConfig {
    pub fn pickup(&self) -> Option<Place> {
        Some(Place {
            label: self.name.clone(),
            latitude: self.latitude?,
            longitude: self.longitude?,
        })
    }

    /// Wall clock at the hotel
    pub fn local_now(&self) -> NaiveDateTime {
        (Utc::now() + Duration::hours(i64::from(self.utc_offset_hours))).naive_utc()
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `EVHOP__BACKEND__BASE_URL=https://...`
            .add_source(config::Environment::with_prefix("EVHOP").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn hotel(&self, slug: &str) -> Option<&HotelConfig> {
        self.hotels.iter().find(|h| h.slug == slug)
    }

    pub fn route_catalog(&self) -> RouteCatalog {
        RouteCatalog::new(self.routes.clone())
    }

    pub fn allow_list(&self) -> VehicleAllowList {
        VehicleAllowList::new(self.vehicles.allowed_type_ids.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_toml_layout() {
        let raw = r#"
            [server]
            port = 3000

            [backend]
            base_url = "https://api.evhop.id"

            [vehicles]
            allowed_type_ids = [3, 7]

            [[hotels]]
            slug = "grand-kuta"
            name = "Grand Kuta"
            whatsapp_support = "+6281100000000"
            latitude = -8.7186
            longitude = 115.1686

            [[hotels]]
            slug = "ubud-garden"
            name = "Ubud Garden"
            whatsapp_support = "+6281100000001"
            utc_offset_hours = 7

            [[routes]]
            id = "airport"
            hotel_slug = "grand-kuta"
            name = "Ngurah Rai Airport"

            [[routes.tariffs]]
            vehicle_class = "standard"
            car_type_id = "ev-std"
            one_way = 250000
            round_trip = 450000
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.backend.timeout_seconds, 15);
        assert!(config.session.redis_url.is_none());
        assert!(config.desk.access_key.is_none());
        assert!(config.allow_list().allows(7));
        assert_eq!(config.hotel("grand-kuta").map(|h| h.name.as_str()), Some("Grand Kuta"));
        assert_eq!(config.hotel("grand-kuta").map(|h| h.utc_offset_hours), Some(8));
        assert_eq!(config.hotel("grand-kuta").and_then(HotelConfig::pickup).map(|p| p.label), Some("Grand Kuta".to_string()));
        assert!(config.hotel("ubud-garden").and_then(HotelConfig::pickup).is_none());
        assert_eq!(config.hotel("ubud-garden").map(|h| h.utc_offset_hours), Some(7));
        assert_eq!(config.route_catalog().get("airport").map(|r| r.tariffs.len()), Some(1));
    }
}
