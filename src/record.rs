//! Invoice record types and tolerant deserialization.
//!
//! The model is instructed to return a strict JSON array of invoice objects,
//! but the shape is promised, not contractually guaranteed. Every field here
//! therefore carries an explicit defaulting rule instead of trusting the
//! response:
//!
//! * strings default to `""` when missing or null;
//! * monetary amounts default to `0.0` and also accept numeric strings
//!   (`"1 234,50"`-style separators stripped);
//! * `Line_Items` is **always** a vector after deserialization — a missing
//!   key, `null`, a bare object, or a partially-malformed array all collapse
//!   to a well-formed (possibly empty) vector;
//! * a record with no identifying content at all is dropped rather than
//!   carried through the pipeline as an empty shell.
//!
//! JSON field names are the model schema names verbatim (`Invoice_ID`,
//! `Buyer_Name_Only`, …) so the prompt schema, the parsed type, and any JSON
//! re-serialization stay aligned.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One invoice extracted from one PDF batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Invoice identifier, preserved verbatim (leading zeros included).
    #[serde(rename = "Invoice_ID", default, deserialize_with = "lenient_string")]
    pub invoice_id: String,

    /// Issue date, `YYYY-MM-DD`.
    #[serde(rename = "Date_Issued", default, deserialize_with = "lenient_string")]
    pub date_issued: String,

    /// Due date, `YYYY-MM-DD`.
    #[serde(rename = "Due_Date", default, deserialize_with = "lenient_string")]
    pub due_date: String,

    #[serde(rename = "Seller_Name", default, deserialize_with = "lenient_string")]
    pub seller_name: String,

    /// Legal/person name only — the prompt instructs the model to strip
    /// address, email, and phone.
    #[serde(rename = "Buyer_Name_Only", default, deserialize_with = "lenient_string")]
    pub buyer_name: String,

    #[serde(rename = "Total_Amount", default, deserialize_with = "lenient_f64")]
    pub total_amount: f64,

    #[serde(rename = "Tax_Amount", default, deserialize_with = "lenient_f64")]
    pub tax_amount: f64,

    #[serde(rename = "Currency", default, deserialize_with = "lenient_string")]
    pub currency: String,

    #[serde(rename = "Bank_IBAN", default, deserialize_with = "lenient_string")]
    pub bank_iban: String,

    /// 5–10 word free-text description of the whole invoice.
    #[serde(rename = "General_Summary", default, deserialize_with = "lenient_string")]
    pub general_summary: String,

    /// Source document name. Never produced by the model — stamped by the
    /// aggregator after deserialization.
    #[serde(rename = "Filename", default, deserialize_with = "lenient_string")]
    pub filename: String,

    /// Always a (possibly empty) sequence after deserialization.
    #[serde(rename = "Line_Items", default, deserialize_with = "lenient_line_items")]
    pub line_items: Vec<LineItem>,
}

impl InvoiceRecord {
    /// True when the record carries no identifying content at all: no id, no
    /// parties, no amounts, no items. Such shells are dropped at parse time.
    pub fn is_blank(&self) -> bool {
        self.invoice_id.is_empty()
            && self.seller_name.is_empty()
            && self.buyer_name.is_empty()
            && self.total_amount == 0.0
            && self.line_items.is_empty()
    }
}

/// One goods/services line owned by exactly one [`InvoiceRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "Description", default, deserialize_with = "lenient_string")]
    pub description: String,

    #[serde(rename = "Quantity", default, deserialize_with = "lenient_f64")]
    pub quantity: f64,

    #[serde(rename = "Unit_Price", default, deserialize_with = "lenient_f64")]
    pub unit_price: f64,

    #[serde(rename = "Line_Total", default, deserialize_with = "lenient_f64")]
    pub line_total: f64,
}

/// A page-range slice of one source document, submitted to the model in a
/// single call and then discarded.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Raw PDF bytes covering this batch's pages.
    pub data: Vec<u8>,
    /// Human-readable 1-indexed inclusive range label, e.g. `"Pages 1-15"`,
    /// or `"All"` when the whole document went out in one call.
    pub range: String,
}

/// One uploaded source document: raw bytes plus the name used for stamping.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    pub data: Vec<u8>,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

/// Parse a model response body into invoice records.
///
/// The model legitimately returns either a JSON array (several invoices in
/// one batch) or a single object; a bare object is coerced to a one-element
/// sequence. Blank shells are dropped. Returns `Err` with a short detail
/// string when the text is not JSON or not invoice-shaped at all.
pub fn parse_records(text: &str) -> Result<Vec<InvoiceRecord>, String> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| e.to_string())?;

    let array = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            return Err(format!(
                "expected a JSON array or object, got {}",
                json_kind(&other)
            ))
        }
    };

    let mut records = Vec::with_capacity(array.len());
    for item in array {
        let record: InvoiceRecord =
            serde_json::from_value(item).map_err(|e| e.to_string())?;
        if !record.is_blank() {
            records.push(record);
        }
    }
    Ok(records)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Defaulting deserializers ─────────────────────────────────────────────

/// String, but tolerate null and scalar values (numbers, bools) by rendering
/// them; anything structural becomes `""`.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Decimal, but tolerate numeric strings and null. `"1 234,50"` and
/// `"1,234.50"` both parse; anything unparseable defaults to `0.0`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_decimal_string(&s),
        _ => 0.0,
    })
}

fn parse_decimal_string(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    // "1,234.50" → thousands commas; "1234,50" → decimal comma.
    let normalized = if cleaned.contains('.') {
        cleaned.replace(',', "")
    } else {
        cleaned.replace(',', ".")
    };
    normalized.parse().unwrap_or(0.0)
}

/// `Line_Items`, coerced to a well-formed vector: missing/null → empty,
/// bare object → one element, array → elements that parse (others skipped).
fn lenient_line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        obj @ Value::Object(_) => serde_json::from_value::<LineItem>(obj)
            .map(|item| vec![item])
            .unwrap_or_default(),
        _ => Vec::new(),
    })
}
