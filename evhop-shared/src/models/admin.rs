use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Rupiah;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    SingleTrip,
    RoundTrip,
    Rental,
}

/// A hotel-attributed booking as reported by the backend.
///
/// `seq` is the 1-based position of the payment within its calendar month,
/// ordered by `paid_at`. Commission fields are computed upstream and only displayed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub booking_id: String,
    pub guest_name: String,
    pub service_type: ServiceType,
    pub trip_status: String,
    pub grand_total: Rupiah,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seq: Option<u32>,
    #[serde(default)]
    pub commission_tier: Option<String>,
    #[serde(default)]
    pub commission_rate: Option<u32>,
    #[serde(default)]
    pub commission_amount: Option<Rupiah>,
}

impl Transaction {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some() && self.seq.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Paid,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub invoice_number: String,
    pub period: String,
    pub amount: Rupiah,
    pub status: PayoutStatus,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}
