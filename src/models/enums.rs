use serde::{Deserialize, Serialize};

/// Lifecycle state of a receipt within the pipeline.
///
/// `received → extracted → stored → notified`, with `failed` terminal
/// before `stored`. Only `stored`, `notified` and `failed` are ever
/// persisted; the earlier states exist in memory during a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Received,
    Extracted,
    Stored,
    Notified,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Received => "received",
            ReceiptStatus::Extracted => "extracted",
            ReceiptStatus::Stored => "stored",
            ReceiptStatus::Notified => "notified",
            ReceiptStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(ReceiptStatus::Received),
            "extracted" => Some(ReceiptStatus::Extracted),
            "stored" => Some(ReceiptStatus::Stored),
            "notified" => Some(ReceiptStatus::Notified),
            "failed" => Some(ReceiptStatus::Failed),
            _ => None,
        }
    }
}

/// Outcome of the notification attempt, recorded on the stored record.
///
/// `sent` is terminal: a later attempt may never regress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    /// Suppressed by policy (review-flagged record, `notify_on_review = false`).
    Skipped,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NotificationStatus::Pending),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            "skipped" => Some(NotificationStatus::Skipped),
            _ => None,
        }
    }
}

/// Semantic kind of a summary field detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Vendor,
    Total,
    Date,
    Currency,
}

impl FieldKind {
    /// Map an expense-service type label onto a kind.
    ///
    /// The label aliases mirror what the analysis service actually emits
    /// for receipts and invoices; unknown labels are ignored upstream.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "VENDOR_NAME" | "SUPPLIER_NAME" | "RECEIVER_NAME" => Some(FieldKind::Vendor),
            "TOTAL" | "AMOUNT_DUE" | "INVOICE_TOTAL" => Some(FieldKind::Total),
            "INVOICE_RECEIPT_DATE" | "INVOICE_DATE" | "RECEIPT_DATE" | "DATE" => {
                Some(FieldKind::Date)
            }
            "CURRENCY" | "CURRENCY_CODE" => Some(FieldKind::Currency),
            _ => None,
        }
    }
}
