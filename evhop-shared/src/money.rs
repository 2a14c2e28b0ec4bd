/// Whole Rupiah. The backend never sends minor units.
pub type Rupiah = i64;

/// Format an amount the way receipts and invoices show it: `Rp 1.250.000`.
pub fn format_rupiah(amount: Rupiah) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}
