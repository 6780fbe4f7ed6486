use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d[\d.,]*").expect("valid regex"))
}

/// Parse a monetary amount or quantity out of raw OCR text.
///
/// Tolerates currency symbols, trailing codes, thousands grouping and
/// comma-decimal notation ("$1,234.56", "1.234,56 EUR", "x2"). Returns
/// None rather than guessing when no number is present.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let matched = amount_re().find(raw)?.as_str();
    let cleaned = matched.trim_end_matches(['.', ',']);

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let decimal_pos = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(d.max(c)),
        (Some(p), None) | (None, Some(p)) => {
            // Lone separator: decimal only if followed by 1-2 digits,
            // otherwise it is thousands grouping ("1,234").
            let frac = cleaned.len() - p - 1;
            (1..=2).contains(&frac).then_some(p)
        }
        (None, None) => None,
    };

    let mut normalized = String::with_capacity(cleaned.len());
    for (i, c) in cleaned.char_indices() {
        match c {
            '.' | ',' => {
                if Some(i) == decimal_pos {
                    normalized.push('.');
                }
            }
            _ => normalized.push(c),
        }
    }

    normalized.parse().ok()
}

/// Date formats seen on receipts, tried in order. US month-first is
/// tried before day-first since that is what the analysis service's
/// training data skews towards.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%m/%d/%y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Parse a transaction date defensively. None on anything unparseable;
/// the caller keeps the raw text either way.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

/// ISO currency codes recognized as standalone words.
const CURRENCY_CODES: &[&str] = &["USD", "EUR", "GBP", "CAD", "AUD", "CHF", "SEK", "NOK", "JPY"];

/// Infer a currency code from raw text: an explicit ISO code wins,
/// otherwise a currency symbol.
pub fn infer_currency(raw: &str) -> Option<String> {
    let upper = raw.to_ascii_uppercase();
    for code in CURRENCY_CODES {
        let standalone = upper
            .split(|c: char| !c.is_ascii_alphabetic())
            .any(|word| word == *code);
        if standalone {
            return Some((*code).to_string());
        }
    }

    if raw.contains('€') {
        Some("EUR".into())
    } else if raw.contains('£') {
        Some("GBP".into())
    } else if raw.contains('¥') {
        Some("JPY".into())
    } else if raw.contains('$') {
        Some("USD".into())
    } else {
        None
    }
}
