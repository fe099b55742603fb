use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The two document kinds that flow through repair and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    #[default]
    Quotation,
    TaxInvoice,
}

impl DocType {
    pub const ALL: [DocType; 2] = [DocType::Quotation, DocType::TaxInvoice];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Quotation => "QUOTATION",
            DocType::TaxInvoice => "TAX_INVOICE",
        }
    }

    /// Accepts the canonical labels with loose casing and separators
    /// (`"tax invoice"`, `"Tax-Invoice"`). Anything else is unrecognised.
    pub fn from_label(raw: &str) -> Option<Self> {
        let label: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        DocType::ALL.into_iter().find(|kind| kind.as_str() == label)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifsc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_supply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<BankDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Party {
    /// Declared state identifier: `state`, else `place_of_supply`.
    pub fn state_code(&self) -> Option<String> {
        self.state
            .as_deref()
            .or(self.place_of_supply.as_deref())
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
    }

    /// The first two GSTIN characters encode the registering state.
    pub fn gstin_state(&self) -> Option<String> {
        let gstin = self.gstin.as_deref()?.trim();
        let prefix = gstin.get(0..2)?;
        if prefix.chars().all(|c| c.is_ascii_digit()) {
            Some(prefix.to_string())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_no: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dates {
    pub issue_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_till: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One billable row. All numeric fields are resolved floats by the time a
/// `LineItem` exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub qty: f64,
    pub unit_price: f64,
    pub unit: String,
    pub discount: f64,
    pub tax_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn_sac: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyMode {
    Intra,
    Inter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstBreakup {
    pub mode: SupplyMode,
    pub cgst: f64,
    pub sgst: f64,
    pub igst: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_supply: Option<String>,
}

/// Derived amounts. Always recomputed; values read from a draft are ignored
/// except `shipping`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: f64,
    pub discount_total: f64,
    pub tax_total: f64,
    #[serde(default)]
    pub shipping: f64,
    #[serde(default)]
    pub round_off: f64,
    pub grand_total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_in_words: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst: Option<GstBreakup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    pub title: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Upi,
    BankTransfer,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PaymentMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_deeplink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validated quotation or tax invoice. Keys the pipeline does not know
/// about are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_type: DocType,
    pub locale: String,
    pub currency: String,
    pub seller: Party,
    pub buyer: Party,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_meta: Option<DocMeta>,
    pub dates: Dates,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub terms: Terms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A single field-level problem, safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Client-facing result: `{ok: true, document}` or `{ok: false, errors}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl Envelope {
    pub fn success(document: Value) -> Self {
        Envelope {
            ok: true,
            document: Some(document),
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<FieldError>) -> Self {
        Envelope {
            ok: false,
            document: None,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsResponse {
    pub ok: bool,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpiLinkResponse {
    pub deeplink: String,
    pub qr_payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_type_labels_are_lenient_on_case_and_separators() {
        assert_eq!(DocType::from_label("QUOTATION"), Some(DocType::Quotation));
        assert_eq!(DocType::from_label(" tax invoice "), Some(DocType::TaxInvoice));
        assert_eq!(DocType::from_label("Tax-Invoice"), Some(DocType::TaxInvoice));
        assert_eq!(DocType::from_label("PROJECT_BRIEF"), None);
        assert_eq!(DocType::from_label("INVOICE"), None);
    }

    #[test]
    fn party_state_prefers_explicit_state() {
        let party: Party = serde_json::from_value(json!({
            "name": "Acme",
            "state": " gj ",
            "place_of_supply": "MH",
            "gstin": "24AAACA1234A1Z5"
        }))
        .unwrap();
        assert_eq!(party.state_code().as_deref(), Some("GJ"));
        assert_eq!(party.gstin_state().as_deref(), Some("24"));
    }

    #[test]
    fn party_keeps_unknown_keys() {
        let raw = json!({"name": "Acme", "website": "acme.in"});
        let party: Party = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(party.extra.get("website"), Some(&json!("acme.in")));
        assert_eq!(serde_json::to_value(&party).unwrap(), raw);
    }

    #[test]
    fn failure_envelope_omits_document() {
        let envelope = Envelope::failure(vec![FieldError::new("/items", "is not an array")]);
        let rendered = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            rendered,
            json!({"ok": false, "errors": [{"field": "/items", "reason": "is not an array"}]})
        );
    }
}
