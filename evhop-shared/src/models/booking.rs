use serde::{Deserialize, Serialize};

use crate::money::Rupiah;
use crate::pii::Masked;

/// A car returned by the backend's availability listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarOption {
    pub id: String,
    pub vehicle_type_id: i64,
    pub name: String,
    #[serde(default)]
    pub price: Option<Rupiah>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<Masked<String>>,
    #[serde(default)]
    pub email: Option<Masked<String>>,
}
