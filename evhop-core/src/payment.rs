use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evhop_shared::Rupiah;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

/// Payment status strings reported by the backend's payment-detail endpoint.
///
/// Anything the backend sends that is not a known terminal state reads as `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[serde(alias = "success", alias = "settlement")]
    Paid,
    Expired,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
    #[serde(other)]
    Pending,
}

impl PaymentStatus {
    /// Map a status to the wizard's terminal outcome, if it is terminal.
    pub fn outcome(self) -> Option<PaymentOutcome> {
        match self {
            PaymentStatus::Paid => Some(PaymentOutcome::Success),
            PaymentStatus::Expired => Some(PaymentOutcome::Expired),
            PaymentStatus::Failed | PaymentStatus::Cancelled => Some(PaymentOutcome::Failed),
            PaymentStatus::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Expired,
    Failed,
    /// The guest abandoned the payment screen.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    VirtualAccount { bank: String },
    Qris,
}

/// What the guest needs to complete a payment: a VA number or a QRIS payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInstruction {
    pub order_id: String,
    pub amount: Rupiah,
    #[serde(default)]
    pub va_number: Option<String>,
    #[serde(default)]
    pub qris_payload: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetail {
    pub order_id: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetch the current status of the payment attached to an order
    async fn payment_detail(&self, order_id: &str) -> Result<PaymentDetail, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aliases_and_fallback() {
        let parse = |s: &str| serde_json::from_str::<PaymentStatus>(&format!("\"{}\"", s)).unwrap();

        assert_eq!(parse("paid"), PaymentStatus::Paid);
        assert_eq!(parse("success"), PaymentStatus::Paid);
        assert_eq!(parse("canceled"), PaymentStatus::Cancelled);
        assert_eq!(parse("waiting_payment"), PaymentStatus::Pending);
    }

    #[test]
    fn test_terminal_outcomes() {
        assert_eq!(PaymentStatus::Paid.outcome(), Some(PaymentOutcome::Success));
        assert_eq!(PaymentStatus::Expired.outcome(), Some(PaymentOutcome::Expired));
        assert_eq!(PaymentStatus::Failed.outcome(), Some(PaymentOutcome::Failed));
        assert_eq!(PaymentStatus::Cancelled.outcome(), Some(PaymentOutcome::Failed));
        assert_eq!(PaymentStatus::Pending.outcome(), None);
    }
}
