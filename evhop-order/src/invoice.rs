use evhop_shared::format_rupiah;
use evhop_shared::models::{Payout, PayoutStatus};

/// Turns a payout into a downloadable document
pub trait InvoiceRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn render(&self, hotel_name: &str, payout: &Payout) -> String;

    fn file_name(&self, payout: &Payout) -> String;
}

/// Printable HTML invoice with inline styles. Opening it triggers the browser's print dialog.
pub struct HtmlInvoiceRenderer {
    issuer: String,
}

impl HtmlInvoiceRenderer {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

impl InvoiceRenderer for HtmlInvoiceRenderer {
    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn file_name(&self, payout: &Payout) -> String {
        let safe: String = payout
            .invoice_number
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("invoice-{}.html", safe)
    }

    fn render(&self, hotel_name: &str, payout: &Payout) -> String {
        let (status_label, status_color) = match payout.status {
            PayoutStatus::Paid => ("Lunas / Paid", "#15803d"),
            PayoutStatus::Pending => ("Menunggu / Pending", "#b45309"),
        };

        let date_row = match (payout.status, payout.paid_at, payout.due_date) {
            (PayoutStatus::Paid, Some(paid_at), _) => format!(
                "<tr><td style=\"padding:6px 0;color:#6b7280\">Dibayar / Paid at</td><td style=\"padding:6px 0;text-align:right\">{}</td></tr>",
                paid_at.format("%d %b %Y %H:%M UTC")
            ),
            (_, _, Some(due)) => format!(
                "<tr><td style=\"padding:6px 0;color:#6b7280\">Jatuh tempo / Due date</td><td style=\"padding:6px 0;text-align:right\">{}</td></tr>",
                due.format("%d %b %Y")
            ),
            _ => String::new(),
        };

        let notes = payout
            .notes
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| {
                format!(
                    "<p style=\"margin-top:24px;font-size:13px;color:#374151\"><strong>Catatan / Notes:</strong> {}</p>",
                    escape_html(n)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"/><title>Invoice {number}</title>
<style>
@media print {{ body {{ margin: 0; }} .no-print {{ display: none; }} }}
</style></head>
<body style="font-family:Helvetica,Arial,sans-serif;max-width:720px;margin:32px auto;color:#111827">
<div style="display:flex;justify-content:space-between;align-items:flex-start;border-bottom:2px solid #111827;padding-bottom:16px">
<div><h1 style="margin:0;font-size:24px">{issuer}</h1><p style="margin:4px 0 0;color:#6b7280">Partner commission payout</p></div>
<div style="text-align:right"><p style="margin:0;font-size:18px;font-weight:bold">INVOICE</p><p style="margin:4px 0 0">{number}</p></div>
</div>
<table style="width:100%;margin-top:24px;border-collapse:collapse;font-size:14px">
<tr><td style="padding:6px 0;color:#6b7280">Hotel</td><td style="padding:6px 0;text-align:right">{hotel}</td></tr>
<tr><td style="padding:6px 0;color:#6b7280">Periode / Period</td><td style="padding:6px 0;text-align:right">{period}</td></tr>
<tr><td style="padding:6px 0;color:#6b7280">Status</td><td style="padding:6px 0;text-align:right;color:{status_color};font-weight:bold">{status}</td></tr>
{date_row}
<tr><td style="padding:12px 0;border-top:1px solid #e5e7eb;font-weight:bold">Total</td><td style="padding:12px 0;border-top:1px solid #e5e7eb;text-align:right;font-size:20px;font-weight:bold">{amount}</td></tr>
</table>
{notes}
<button class="no-print" style="margin-top:32px;padding:8px 16px" onclick="window.print()">Print</button>
<script>window.onload = function () {{ window.print(); }};</script>
</body></html>"#,
            number = escape_html(&payout.invoice_number),
            issuer = escape_html(&self.issuer),
            hotel = escape_html(hotel_name),
            period = escape_html(&payout.period),
            status = status_label,
            status_color = status_color,
            date_row = date_row,
            amount = format_rupiah(payout.amount),
            notes = notes,
        )
    }
}
