use crate::models::ReceiptRecord;

use super::mailer::OutboundEmail;

/// Line items shown in the plain-text body.
pub const TEXT_PREVIEW_ITEMS: usize = 10;

/// Line items shown in the HTML table.
pub const HTML_PREVIEW_ITEMS: usize = 50;

/// Render the summary email for a processed receipt.
pub fn compose(record: &ReceiptRecord, sender: &str, recipient: &str) -> OutboundEmail {
    let vendor = record.vendor_name.as_deref().unwrap_or("Unknown vendor");
    let date = record
        .transaction_date
        .map(|d| d.to_string())
        .or_else(|| record.transaction_date_raw.clone())
        .unwrap_or_else(|| "Unknown date".into());
    let total = record
        .reported_total_raw
        .clone()
        .unwrap_or_else(|| "Unknown total".into());

    OutboundEmail {
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        subject: format!("Receipt processed: {vendor} on {date} (Total {total})"),
        text_body: render_text(record, vendor, &date, &total),
        html_body: render_html(record, vendor, &date, &total),
    }
}

fn render_text(record: &ReceiptRecord, vendor: &str, date: &str, total: &str) -> String {
    let items: Vec<String> = record
        .line_items
        .iter()
        .take(TEXT_PREVIEW_ITEMS)
        .map(|i| {
            format!(
                "- {}  qty={}  price={}  total={}",
                nonempty(&i.description),
                nonempty(&i.quantity_raw),
                nonempty(&i.unit_price_raw),
                nonempty(&i.line_total_raw),
            )
        })
        .collect();
    let preview = if items.is_empty() {
        "(no line items detected)".to_string()
    } else {
        items.join("\n")
    };

    format!(
        "Your receipt has been processed.\n\n\
         Vendor: {vendor}\n\
         Date:   {date}\n\
         Total:  {total}\n\n\
         Top line items:\n{preview}\n\n\
         Metadata:\n\
         - Receipt ID: {id}\n\
         - Source: {container}/{key}\n\
         - Ingested at: {ingested}\n",
        id = record.receipt_id,
        container = record.container,
        key = record.object_key,
        ingested = record.ingested_at.to_rfc3339(),
    )
}

fn render_html(record: &ReceiptRecord, vendor: &str, date: &str, total: &str) -> String {
    let rows: Vec<String> = record
        .line_items
        .iter()
        .take(HTML_PREVIEW_ITEMS)
        .map(|i| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&i.description),
                escape(&i.quantity_raw),
                escape(&i.unit_price_raw),
                escape(&i.line_total_raw),
            )
        })
        .collect();
    let body_rows = if rows.is_empty() {
        "<tr><td colspan=\"4\">(no line items detected)</td></tr>".to_string()
    } else {
        rows.join("")
    };

    format!(
        "<html><body>\
         <h2>Receipt processed</h2>\
         <p><strong>Vendor</strong>: {vendor}<br/>\
         <strong>Date</strong>: {date}<br/>\
         <strong>Total</strong>: {total}</p>\
         <table border=\"1\" cellspacing=\"0\" cellpadding=\"6\">\
         <thead><tr><th>Description</th><th>Qty</th><th>Unit Price</th><th>Line Total</th></tr></thead>\
         <tbody>{body_rows}</tbody></table>\
         <p>Receipt ID: {id}<br/>Source: {container}/{key}</p>\
         </body></html>",
        vendor = escape(vendor),
        date = escape(date),
        total = escape(total),
        id = record.receipt_id,
        container = escape(&record.container),
        key = escape(&record.object_key),
    )
}

fn nonempty(s: &str) -> &str {
    if s.is_empty() { "?" } else { s }
}

/// Minimal HTML escaping for OCR-derived text.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
