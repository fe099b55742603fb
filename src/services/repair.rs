use chrono::{Duration, NaiveDate};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::RepairError;
use crate::models::{DocType, Document, PaymentMode};
use crate::services::totals::compute_document_totals;
use crate::services::upi::{generate_deeplink, UpiRequest};
use crate::services::validation::{validate, ValidationResult};
use crate::utils::{coerce_number, iso_date, normalize_date, today};

const PARTY_TEXT_FIELDS: [&str; 7] = ["address", "email", "phone", "gstin", "pan", "state", "place_of_supply"];
const BANK_TEXT_FIELDS: [&str; 4] = ["account_name", "account_no", "ifsc", "upi_id"];
const DOC_META_FIELDS: [&str; 3] = ["doc_no", "ref_no", "po_no"];
const TOTALS_FIELDS: [&str; 6] = ["subtotal", "discount_total", "tax_total", "shipping", "round_off", "grand_total"];
const DEFAULT_TERMS_TITLE: &str = "Terms & Conditions";

/// Repair a raw draft into a validated document with fresh totals.
///
/// The caller's value is never modified. Steps run strictly in order:
/// doc_type normalisation, required-field insertion, numeric coercion,
/// validation, totals recomputation. Only validation can fail.
pub fn repair_draft(draft: &Value, config: &PipelineConfig) -> Result<Document, RepairError> {
    let Value::Object(original) = draft else {
        return Err(RepairError::NotARecord);
    };
    let mut fields = original.clone();

    let kind = normalize_doc_type(&mut fields, config);
    insert_required_fields(&mut fields, kind, config);
    coerce_numeric_fields(&mut fields, config);

    let candidate = Value::Object(fields);
    let mut document = match validate(&candidate, kind) {
        ValidationResult::Valid(document) => document,
        ValidationResult::Invalid(errors) => {
            warn!(doc_type = %kind, errors = errors.len(), "draft still invalid after repair");
            return Err(RepairError::RepairFailed { errors });
        }
    };

    document.totals = compute_document_totals(&document, config);
    attach_upi_link(&mut document);

    info!(
        doc_type = %document.doc_type,
        items = document.items.len(),
        grand_total = document.totals.grand_total,
        "draft repaired"
    );
    Ok(document)
}

/// Same as [`repair_draft`], returning the repaired document as JSON.
pub fn repair_value(draft: &Value, config: &PipelineConfig) -> Result<Value, RepairError> {
    repair_draft(draft, config).map(|document| document.to_value())
}

fn normalize_doc_type(fields: &mut Map<String, Value>, config: &PipelineConfig) -> DocType {
    let declared = fields
        .get("doc_type")
        .and_then(Value::as_str)
        .and_then(DocType::from_label);
    let kind = match declared {
        Some(kind) => kind,
        None => {
            debug!(
                declared = ?fields.get("doc_type"),
                fallback = %config.default_doc_type,
                "unrecognised doc_type replaced"
            );
            config.default_doc_type
        }
    };
    fields.insert("doc_type".to_string(), json!(kind.as_str()));
    kind
}

fn insert_required_fields(fields: &mut Map<String, Value>, kind: DocType, config: &PipelineConfig) {
    ensure_text(fields, "locale", &config.default_locale);
    ensure_text(fields, "currency", &config.default_currency);

    repair_party(fields, "seller", "Seller");
    repair_party(fields, "buyer", "Buyer");
    repair_doc_meta(fields, kind, config);
    repair_dates(fields, kind, config);
    repair_terms(fields, config);
    repair_payment(fields);

    stringify_fields(fields, &["notes"]);
    repair_items(fields);

    // Totals are derived; anything that is not an object is discarded.
    if !matches!(fields.get("totals"), Some(Value::Object(_))) {
        fields.insert("totals".to_string(), json!({}));
    }
}

fn coerce_numeric_fields(fields: &mut Map<String, Value>, config: &PipelineConfig) {
    if let Some(Value::Array(items)) = fields.get_mut("items") {
        for item in items.iter_mut() {
            let Value::Object(item) = item else { continue };
            let qty = non_negative(coerce_number(item.get("qty"), config.default_qty));
            let unit_price = non_negative(coerce_number(item.get("unit_price"), 0.0));
            let discount = non_negative(coerce_number(item.get("discount"), 0.0));
            let tax_rate = non_negative(coerce_number(item.get("tax_rate"), 0.0));
            item.insert("qty".to_string(), Value::from(qty));
            item.insert("unit_price".to_string(), Value::from(unit_price));
            item.insert("discount".to_string(), Value::from(discount));
            item.insert("tax_rate".to_string(), Value::from(tax_rate));
        }
    }

    let previous = fields.get("totals").cloned().unwrap_or(Value::Null);
    let mut totals = Map::new();
    for key in TOTALS_FIELDS {
        totals.insert(key.to_string(), Value::from(coerce_number(previous.get(key), 0.0)));
    }
    fields.insert("totals".to_string(), Value::Object(totals));
}

fn non_negative(value: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Numbers and booleans become strings, `null` stays, containers are dropped.
fn stringify_scalar(value: &mut Value) -> bool {
    match value {
        Value::Null | Value::String(_) => true,
        Value::Number(number) => {
            *value = Value::String(number.to_string());
            true
        }
        Value::Bool(flag) => {
            *value = Value::String(flag.to_string());
            true
        }
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn stringify_fields(object: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        let keep = object.get_mut(*key).map(stringify_scalar).unwrap_or(true);
        if !keep {
            object.remove(*key);
        }
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn ensure_text(fields: &mut Map<String, Value>, key: &str, default: &str) {
    if non_empty_text(fields.get(key)).is_none() {
        fields.insert(key.to_string(), json!(default));
    }
}

fn repair_party(fields: &mut Map<String, Value>, key: &str, fallback_name: &str) {
    let repaired = match fields.remove(key) {
        None | Some(Value::Null) => json!({ "name": fallback_name }),
        Some(Value::String(name)) => {
            let name = if name.trim().is_empty() { fallback_name.to_string() } else { name };
            json!({ "name": name })
        }
        Some(Value::Object(mut party)) => {
            let name = non_empty_text(party.get("name")).unwrap_or_else(|| fallback_name.to_string());
            party.insert("name".to_string(), json!(name));
            stringify_fields(&mut party, &PARTY_TEXT_FIELDS);
            if !matches!(party.get("bank"), None | Some(Value::Null | Value::Object(_))) {
                party.remove("bank");
            }
            if let Some(Value::Object(bank)) = party.get_mut("bank") {
                stringify_fields(bank, &BANK_TEXT_FIELDS);
            }
            Value::Object(party)
        }
        Some(other) => {
            debug!(party = key, found = %other, "party was not a record, replaced");
            json!({ "name": fallback_name })
        }
    };
    fields.insert(key.to_string(), repaired);
}

fn repair_doc_meta(fields: &mut Map<String, Value>, kind: DocType, config: &PipelineConfig) {
    let mut meta = match fields.remove("doc_meta") {
        Some(Value::Object(meta)) => meta,
        None | Some(Value::Null) if kind == DocType::Quotation => return,
        None | Some(Value::Null) => Map::new(),
        // a bare document number
        Some(other) => {
            let mut meta = Map::new();
            if let Some(doc_no) = non_empty_text(Some(&other)) {
                meta.insert("doc_no".to_string(), json!(doc_no));
            }
            meta
        }
    };
    stringify_fields(&mut meta, &DOC_META_FIELDS);
    if kind == DocType::TaxInvoice && non_empty_text(meta.get("doc_no")).is_none() {
        let doc_no = format!("{}-{}", config.invoice_number_prefix, today().format("%Y%m%d"));
        debug!(doc_no = %doc_no, "generated invoice number");
        meta.insert("doc_no".to_string(), json!(doc_no));
    }
    fields.insert("doc_meta".to_string(), Value::Object(meta));
}

fn repair_dates(fields: &mut Map<String, Value>, kind: DocType, config: &PipelineConfig) {
    let mut dates = match fields.remove("dates") {
        Some(Value::Object(dates)) => dates,
        // a lone date is taken as the issue date
        Some(single @ Value::String(_)) => {
            let mut dates = Map::new();
            dates.insert("issue_date".to_string(), single);
            dates
        }
        _ => Map::new(),
    };

    let issue_date = normalize_date(dates.get("issue_date")).unwrap_or_else(today);
    dates.insert("issue_date".to_string(), json!(iso_date(issue_date)));

    let (required, offset_days) = match kind {
        DocType::TaxInvoice => ("due_date", config.invoice_due_days),
        DocType::Quotation => ("valid_till", config.quotation_validity_days),
    };
    for key in ["due_date", "valid_till"] {
        let parsed: Option<NaiveDate> = normalize_date(dates.get(key));
        match parsed {
            Some(date) => {
                dates.insert(key.to_string(), json!(iso_date(date)));
            }
            None if key == required => {
                let date = issue_date + Duration::days(i64::from(offset_days));
                dates.insert(key.to_string(), json!(iso_date(date)));
            }
            None => {
                dates.remove(key);
            }
        }
    }
    fields.insert("dates".to_string(), Value::Object(dates));
}

fn repair_terms(fields: &mut Map<String, Value>, config: &PipelineConfig) {
    let default_bullets = || json!(config.default_terms);
    let repaired = match fields.remove("terms") {
        None | Some(Value::Null) => json!({ "title": DEFAULT_TERMS_TITLE, "bullets": default_bullets() }),
        Some(Value::String(text)) if !text.trim().is_empty() => {
            json!({ "title": DEFAULT_TERMS_TITLE, "bullets": [text] })
        }
        Some(Value::String(_)) => json!({ "title": DEFAULT_TERMS_TITLE, "bullets": default_bullets() }),
        Some(Value::Array(bullets)) => json!({ "title": DEFAULT_TERMS_TITLE, "bullets": clean_bullets(bullets, config) }),
        Some(Value::Object(mut terms)) => {
            let title = non_empty_text(terms.get("title")).unwrap_or_else(|| DEFAULT_TERMS_TITLE.to_string());
            terms.insert("title".to_string(), json!(title));
            let bullets = match terms.remove("bullets") {
                Some(Value::Array(bullets)) => clean_bullets(bullets, config),
                Some(Value::String(text)) if !text.trim().is_empty() => vec![text],
                _ => config.default_terms.clone(),
            };
            terms.insert("bullets".to_string(), json!(bullets));
            Value::Object(terms)
        }
        Some(other) => {
            debug!(found = %other, "terms replaced with defaults");
            json!({ "title": DEFAULT_TERMS_TITLE, "bullets": default_bullets() })
        }
    };
    fields.insert("terms".to_string(), repaired);
}

fn clean_bullets(bullets: Vec<Value>, config: &PipelineConfig) -> Vec<String> {
    let cleaned: Vec<String> = bullets
        .iter()
        .filter_map(|bullet| non_empty_text(Some(bullet)))
        .collect();
    if cleaned.is_empty() {
        config.default_terms.clone()
    } else {
        cleaned
    }
}

fn repair_payment(fields: &mut Map<String, Value>) {
    let mut payment = match fields.remove("payment") {
        None | Some(Value::Null) => return,
        Some(Value::Object(payment)) => payment,
        // a bare mode label such as "UPI"
        Some(mode @ Value::String(_)) => {
            let mut payment = Map::new();
            payment.insert("mode".to_string(), mode);
            payment
        }
        Some(other) => {
            debug!(found = %other, "payment was not a record, dropped");
            return;
        }
    };
    stringify_fields(&mut payment, &["upi_deeplink", "instructions"]);
    let mode = match payment.get("mode") {
        None | Some(Value::Null) => None,
        Some(Value::String(label)) => Some(payment_mode_label(label)),
        Some(_) => Some("OTHER"),
    };
    if let Some(mode) = mode {
        payment.insert("mode".to_string(), json!(mode));
    }
    fields.insert("payment".to_string(), Value::Object(payment));
}

fn payment_mode_label(raw: &str) -> &'static str {
    let label: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();
    match label.as_str() {
        "UPI" => "UPI",
        "BANK_TRANSFER" | "BANK" | "NEFT" | "RTGS" | "IMPS" => "BANK_TRANSFER",
        _ => "OTHER",
    }
}

/// A non-list `items` becomes empty; entries that are not records become
/// blank items and pick up the defaults.
fn repair_items(fields: &mut Map<String, Value>) {
    let items: Vec<Value> = match fields.remove("items") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut item = match item {
                    Value::Object(item) => item,
                    other => {
                        debug!(found = %other, "line item was not a record, reset");
                        Map::new()
                    }
                };
                repair_item_text(&mut item);
                Value::Object(item)
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            debug!(found = %other, "items was not a list, dropped");
            Vec::new()
        }
    };
    fields.insert("items".to_string(), Value::Array(items));
}

fn repair_item_text(item: &mut Map<String, Value>) {
    let description = non_empty_text(item.get("description")).unwrap_or_else(|| "Line item".to_string());
    item.insert("description".to_string(), json!(description));

    let unit = non_empty_text(item.get("unit")).unwrap_or_else(|| "pcs".to_string());
    item.insert("unit".to_string(), json!(unit));

    stringify_fields(item, &["hsn_sac"]);
}

fn attach_upi_link(document: &mut Document) {
    let Some(payment) = document.payment.as_mut() else {
        return;
    };
    if payment.mode != Some(PaymentMode::Upi) {
        return;
    }
    let Some(upi_id) = document
        .seller
        .bank
        .as_ref()
        .and_then(|bank| bank.upi_id.clone())
        .filter(|id| !id.trim().is_empty())
    else {
        return;
    };

    let note = document
        .items
        .first()
        .map(|item| item.description.chars().take(50).collect::<String>());
    let txn_ref = document.doc_meta.as_ref().and_then(|meta| meta.doc_no.clone());
    let link = generate_deeplink(&UpiRequest {
        upi_id,
        payee_name: document.seller.name.clone(),
        amount: Some(document.totals.grand_total),
        currency: document.currency.clone(),
        note,
        txn_ref,
        callback_url: None,
    });
    payment.upi_deeplink = Some(link);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SupplyMode;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn non_object_input_is_rejected() {
        assert!(matches!(repair_draft(&json!([1, 2]), &config()), Err(RepairError::NotARecord)));
        assert!(matches!(repair_draft(&json!("draft"), &config()), Err(RepairError::NotARecord)));
    }

    #[test]
    fn invalid_doc_type_is_repaired_before_validation() {
        let document = repair_draft(&json!({"doc_type": "INVALID", "items": []}), &config()).unwrap();
        assert_eq!(document.doc_type, DocType::Quotation);
        assert!(document.items.is_empty());
        assert_eq!(document.totals.grand_total, 0.0);
    }

    #[test]
    fn caller_input_is_untouched() {
        let input = json!({"doc_type": "nonsense", "items": [{"qty": "2", "unit_price": "10"}]});
        let snapshot = input.clone();
        repair_draft(&input, &config()).unwrap();
        assert_eq!(input, snapshot);
    }

    #[test]
    fn fills_in_parties_dates_and_terms() {
        let document = repair_draft(
            &json!({
                "doc_type": "QUOTATION",
                "seller": "Acme Studio",
                "dates": {"issue_date": "01.04.2025"},
                "terms": {"bullets": []}
            }),
            &config(),
        )
        .unwrap();
        assert_eq!(document.seller.name, "Acme Studio");
        assert_eq!(document.buyer.name, "Buyer");
        assert_eq!(document.dates.issue_date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(document.dates.valid_till, NaiveDate::from_ymd_opt(2025, 4, 16));
        assert_eq!(document.terms.title, "Terms & Conditions");
        assert_eq!(document.terms.bullets, config().default_terms);
        assert_eq!(document.currency, "INR");
        assert_eq!(document.locale, "en-IN");
    }

    #[test]
    fn tax_invoice_gets_due_date_and_number() {
        let document = repair_draft(
            &json!({"doc_type": "tax invoice", "dates": {"issue_date": "2025-04-01", "due_date": "soon"}}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.doc_type, DocType::TaxInvoice);
        assert_eq!(document.dates.due_date, NaiveDate::from_ymd_opt(2025, 4, 8));
        let doc_no = document.doc_meta.and_then(|meta| meta.doc_no).unwrap();
        assert!(doc_no.starts_with("INV-"), "{doc_no}");
        assert!(document.totals.gst.is_some());
    }

    #[test]
    fn coerces_item_fields() {
        let document = repair_draft(
            &json!({
                "items": [{
                    "description": "",
                    "qty": "5",
                    "unit_price": "1000",
                    "discount": null,
                    "tax_rate": "18",
                    "hsn_sac": 998314
                }]
            }),
            &config(),
        )
        .unwrap();
        let item = &document.items[0];
        assert_eq!(item.description, "Line item");
        assert_eq!(item.unit, "pcs");
        assert_eq!((item.qty, item.unit_price, item.discount, item.tax_rate), (5.0, 1000.0, 0.0, 18.0));
        assert_eq!(item.hsn_sac.as_deref(), Some("998314"));
        assert_eq!(document.totals.subtotal, 5000.0);
        assert_eq!(document.totals.tax_total, 900.0);
    }

    #[test]
    fn garbage_quantity_uses_default_and_negatives_clamp() {
        let document = repair_draft(
            &json!({"items": [{"qty": "10 units", "unit_price": -50, "tax_rate": "N/A"}]}),
            &config(),
        )
        .unwrap();
        let item = &document.items[0];
        assert_eq!(item.qty, 1.0);
        assert_eq!(item.unit_price, 0.0);
        assert_eq!(item.tax_rate, 0.0);
    }

    #[test]
    fn wrongly_typed_sections_are_rebuilt() {
        let document = repair_draft(
            &json!({
                "doc_type": "TAX_INVOICE",
                "seller": 42,
                "buyer": {"name": "Globex", "bank": "HDFC"},
                "doc_meta": "INV-1",
                "dates": "2025-04-01",
                "terms": 5,
                "notes": ["a", "b"],
                "payment": "UPI"
            }),
            &config(),
        )
        .unwrap();
        assert_eq!(document.seller.name, "Seller");
        assert!(document.buyer.bank.is_none());
        assert_eq!(document.doc_meta.unwrap().doc_no.as_deref(), Some("INV-1"));
        assert_eq!(document.dates.issue_date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(document.dates.due_date, NaiveDate::from_ymd_opt(2025, 4, 8));
        assert_eq!(document.terms.bullets, config().default_terms);
        assert!(document.notes.is_none());
        assert_eq!(document.payment.unwrap().mode, Some(PaymentMode::Upi));
    }

    #[test]
    fn unusable_sections_fall_back_to_defaults() {
        let document = repair_draft(
            &json!({"dates": 7, "doc_meta": [1], "payment": 3, "items": "three chairs"}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.dates.issue_date, today());
        assert!(document.dates.valid_till.is_some());
        assert!(document.doc_meta.unwrap().doc_no.is_none());
        assert!(document.payment.is_none());
        assert!(document.items.is_empty());
    }

    #[test]
    fn non_record_items_become_blank_lines() {
        let document = repair_draft(
            &json!({"items": [{"description": "Chairs", "qty": 2, "unit_price": 100}, "junk", 3]}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.items.len(), 3);
        assert_eq!(document.items[0].description, "Chairs");
        assert_eq!(document.items[1].description, "Line item");
        assert_eq!((document.items[2].qty, document.items[2].unit_price), (1.0, 0.0));
        assert_eq!(document.totals.subtotal, 200.0);
    }

    #[test]
    fn overflowing_amounts_leave_totals_finite() {
        let repaired = repair_value(&json!({"items": [{"qty": 1e200, "unit_price": 1e200}]}), &config()).unwrap();
        let totals = &repaired["totals"];
        for key in ["subtotal", "discount_total", "tax_total", "round_off", "grand_total"] {
            assert!(totals[key].is_number(), "{key} in {totals}");
        }
        assert_eq!(totals["amount_in_words"], json!("Zero Rupees Only"));
        assert!(validate(&repaired, DocType::Quotation).is_valid());
    }

    #[test]
    fn nonsense_totals_are_replaced() {
        let document = repair_draft(
            &json!({"items": [{"qty": 1, "unit_price": 100}], "totals": "lots"}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.totals.grand_total, 100.0);
    }

    #[test]
    fn shipping_survives_recompute() {
        let document = repair_draft(
            &json!({"items": [{"qty": 1, "unit_price": 100}], "totals": {"shipping": "49.5", "grand_total": 5}}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.totals.shipping, 49.5);
        assert_eq!(document.totals.grand_total, 150.0);
        assert_eq!(document.totals.round_off, 0.5);
    }

    #[test]
    fn upi_payment_gets_a_deeplink() {
        let document = repair_draft(
            &json!({
                "doc_type": "TAX_INVOICE",
                "seller": {"name": "Acme", "state": "GJ", "bank": {"upi_id": "acme@upi"}},
                "buyer": {"name": "Globex", "state": "GJ"},
                "doc_meta": {"doc_no": "INV-7"},
                "items": [{"description": "Design", "qty": 1, "unit_price": 10000, "tax_rate": 18}],
                "payment": {"mode": "upi"}
            }),
            &config(),
        )
        .unwrap();
        let payment = document.payment.unwrap();
        assert_eq!(payment.mode, Some(PaymentMode::Upi));
        assert_eq!(
            payment.upi_deeplink.as_deref(),
            Some("upi://pay?pa=acme%40upi&pn=Acme&am=11800.00&cu=INR&tn=Design&tr=INV-7")
        );
        assert_eq!(document.totals.gst.unwrap().mode, SupplyMode::Intra);
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let document = repair_draft(
            &json!({"project_code": "X-1", "items": [{"qty": 1, "unit_price": 1, "colour": "red"}]}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.extra.get("project_code"), Some(&json!("X-1")));
        assert_eq!(document.items[0].extra.get("colour"), Some(&json!("red")));
    }

    #[test]
    fn numeric_party_fields_become_text() {
        let document = repair_draft(
            &json!({"seller": {"name": "Acme", "phone": 9876543210u64, "tags": ["a"]}}),
            &config(),
        )
        .unwrap();
        assert_eq!(document.seller.phone.as_deref(), Some("9876543210"));
        assert_eq!(document.seller.extra.get("tags"), Some(&json!(["a"])));
    }
}
