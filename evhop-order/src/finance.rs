use evhop_shared::models::Transaction;
use evhop_shared::Rupiah;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Commission tier a hotel reaches by its n-th paid booking of the month
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TierName {
    Bronze,
    Silver,
    Gold,
}

impl TierName {
    /// Parse the tier label the backend attaches to a transaction
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "bronze" => Some(TierName::Bronze),
            "silver" => Some(TierName::Silver),
            "gold" => Some(TierName::Gold),
            _ => None,
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TierName::Bronze => "Bronze",
            TierName::Silver => "Silver",
            TierName::Gold => "Gold",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Tier {
    pub name: TierName,
    pub min_seq: u32,
    /// `None` for the open-ended top tier
    pub max_seq: Option<u32>,
    pub rate_percent: u32,
}

impl Tier {
    pub fn contains(&self, seq: u32) -> bool {
        seq >= self.min_seq && self.max_seq.map_or(true, |max| seq <= max)
    }
}

/// Ascending, gap-free partition of the monthly sequence numbers.
pub const TIERS: [Tier; 3] = [
    Tier { name: TierName::Bronze, min_seq: 1, max_seq: Some(10), rate_percent: 20 },
    Tier { name: TierName::Silver, min_seq: 11, max_seq: Some(20), rate_percent: 25 },
    Tier { name: TierName::Gold, min_seq: 21, max_seq: None, rate_percent: 27 },
];

/// Tier for a 1-based monthly sequence number; `None` for `0`.
pub fn tier_for(seq: u32) -> Option<&'static Tier> {
    TIERS.iter().find(|tier| tier.contains(seq))
}

pub fn tier_by_name(name: TierName) -> &'static Tier {
    match name {
        TierName::Bronze => &TIERS[0],
        TierName::Silver => &TIERS[1],
        TierName::Gold => &TIERS[2],
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TierBreakdown {
    pub count: u32,
    pub rate_percent: u32,
    pub commission: Rupiah,
    pub first_seq: u32,
    pub last_seq: u32,
    /// e.g. `#1–#10`
    pub trx_range: String,
}

/// Per-hotel, per-month commission figures shown above the transaction list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct CommissionSummary {
    pub total_paid_trx: u32,
    pub total_commission: Rupiah,
    pub total_revenue: Rupiah,
    /// Tiers without transactions this month are absent, not zero-filled.
    pub breakdown: BTreeMap<TierName, TierBreakdown>,
}

impl CommissionSummary {
    /// Aggregate one calendar month of transactions in a single pass.
    ///
    /// Unpaid entries are skipped. Tier and commission come from the backend and
    /// the local table only fills in when a field is missing. A tier's displayed
    /// rate is always the table rate.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut summary = CommissionSummary::default();

        for trx in transactions {
            let Some(seq) = trx.seq.filter(|_| trx.is_paid()) else {
                continue;
            };

            let Some(tier) = trx
                .commission_tier
                .as_deref()
                .and_then(TierName::parse)
                .map(tier_by_name)
                .or_else(|| tier_for(seq))
            else {
                tracing::warn!(booking_id = %trx.booking_id, seq, "Paid transaction without a usable tier, skipped");
                continue;
            };
            let rate = trx.commission_rate.unwrap_or(tier.rate_percent);
            let commission = trx
                .commission_amount
                .unwrap_or_else(|| trx.grand_total * Rupiah::from(rate) / 100);

            summary.total_paid_trx += 1;
            summary.total_commission += commission;
            summary.total_revenue += trx.grand_total;

            let entry = summary.breakdown.entry(tier.name).or_insert_with(|| TierBreakdown {
                count: 0,
                rate_percent: tier.rate_percent,
                commission: 0,
                first_seq: seq,
                last_seq: seq,
                trx_range: String::new(),
            });
            entry.count += 1;
            entry.commission += commission;
            entry.first_seq = entry.first_seq.min(seq);
            entry.last_seq = entry.last_seq.max(seq);
        }

        for entry in summary.breakdown.values_mut() {
            entry.trx_range = format!("#{}–#{}", entry.first_seq, entry.last_seq);
        }

        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total_paid_trx == 0
    }

    /// `None` when there is nothing to show; the page hides the panel instead of
    /// rendering an all-zero table.
    pub fn for_display(transactions: &[Transaction]) -> Option<Self> {
        let summary = Self::from_transactions(transactions);
        (!summary.is_empty()).then_some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use evhop_shared::models::ServiceType;

    fn paid(seq: u32, rate: u32, grand_total: Rupiah) -> Transaction {
        let tier = tier_for(seq).unwrap();
        Transaction {
            booking_id: format!("BK-{}", seq),
            guest_name: "Guest".to_string(),
            service_type: ServiceType::SingleTrip,
            trip_status: "completed".to_string(),
            grand_total,
            paid_at: Some(Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()),
            seq: Some(seq),
            commission_tier: Some(tier.name.to_string()),
            commission_rate: Some(rate),
            commission_amount: Some(grand_total * Rupiah::from(rate) / 100),
        }
    }

    #[test]
    fn test_tier_boundaries() {
        for n in 1..=10 {
            assert_eq!(tier_for(n).unwrap().name, TierName::Bronze);
            assert_eq!(tier_for(n).unwrap().rate_percent, 20);
        }
        for n in 11..=20 {
            assert_eq!(tier_for(n).unwrap().name, TierName::Silver);
            assert_eq!(tier_for(n).unwrap().rate_percent, 25);
        }
        for n in [21, 22, 100, 10_000, u32::MAX] {
            assert_eq!(tier_for(n).unwrap().name, TierName::Gold);
            assert_eq!(tier_for(n).unwrap().rate_percent, 27);
        }
        assert!(tier_for(0).is_none());
    }

    #[test]
    fn test_tiers_partition_without_gaps() {
        for n in 1..=500 {
            let matching = TIERS.iter().filter(|t| t.contains(n)).count();
            assert_eq!(matching, 1, "seq {} matched {} tiers", n, matching);
            assert!(tier_for(n).is_some_and(|t| t.contains(n)));
        }
        for pair in TIERS.windows(2) {
            assert_eq!(pair[0].max_seq.map(|m| m + 1), Some(pair[1].min_seq));
        }
    }

    #[test]
    fn test_monthly_breakdown() {
        let transactions = vec![
            paid(1, 20, 1_000_000),
            paid(5, 20, 2_000_000),
            paid(12, 25, 1_000_000),
            paid(22, 27, 500_000),
        ];

        let summary = CommissionSummary::from_transactions(&transactions);

        let bronze = &summary.breakdown[&TierName::Bronze];
        assert_eq!(bronze.count, 2);
        assert_eq!(bronze.commission, 600_000);
        assert_eq!(bronze.trx_range, "#1–#5");

        let silver = &summary.breakdown[&TierName::Silver];
        assert_eq!(silver.count, 1);
        assert_eq!(silver.commission, 250_000);
        assert_eq!(silver.rate_percent, 25);

        let gold = &summary.breakdown[&TierName::Gold];
        assert_eq!(gold.count, 1);
        assert_eq!(gold.commission, 135_000);

        assert_eq!(summary.total_commission, 985_000);
        assert_eq!(summary.total_revenue, 4_500_000);
        assert_eq!(summary.total_paid_trx, 4);
    }

    #[test]
    fn test_empty_tiers_are_omitted() {
        let summary = CommissionSummary::from_transactions(&[paid(3, 20, 100_000)]);

        assert_eq!(summary.breakdown.len(), 1);
        assert!(!summary.breakdown.contains_key(&TierName::Silver));
        assert!(!summary.breakdown.contains_key(&TierName::Gold));
    }

    #[test]
    fn test_unpaid_and_empty_month_is_suppressed() {
        let mut unpaid = paid(1, 20, 100_000);
        unpaid.paid_at = None;

        assert!(CommissionSummary::from_transactions(&[unpaid.clone()]).is_empty());
        assert_eq!(CommissionSummary::for_display(&[unpaid]), None);
        assert_eq!(CommissionSummary::for_display(&[]), None);
    }

    #[test]
    fn test_missing_fields_fall_back_to_table() {
        let mut trx = paid(15, 25, 400_000);
        trx.commission_tier = None;
        trx.commission_rate = None;
        trx.commission_amount = None;

        let summary = CommissionSummary::from_transactions(&[trx]);
        let silver = &summary.breakdown[&TierName::Silver];
        assert_eq!(silver.commission, 100_000);
        assert_eq!(silver.rate_percent, 25);
        assert_eq!(silver.trx_range, "#15–#15");
    }

    #[test]
    fn test_breakdown_rate_comes_from_table() {
        // Backend applied a promotional rate to the first booking only
        let promo = paid(1, 15, 1_000_000);
        let regular = paid(2, 20, 1_000_000);

        let summary = CommissionSummary::from_transactions(&[promo, regular]);
        let bronze = &summary.breakdown[&TierName::Bronze];
        assert_eq!(bronze.rate_percent, 20);
        assert_eq!(bronze.commission, 350_000);
    }

    #[test]
    fn test_sequence_zero_without_tier_is_skipped() {
        let mut trx = paid(1, 20, 500_000);
        trx.seq = Some(0);
        trx.commission_tier = None;

        let summary = CommissionSummary::from_transactions(&[trx, paid(2, 20, 100_000)]);
        assert_eq!(summary.total_paid_trx, 1);
        assert_eq!(summary.total_revenue, 100_000);
    }
}
