use chrono::NaiveDate;
use jsonschema::JSONSchema;
use serde_json::{json, Value};

use crate::models::{DocType, Document, FieldError};

/// Outcome of checking a draft against its document schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid(Document),
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn into_result(self) -> Result<Document, Vec<FieldError>> {
        match self {
            ValidationResult::Valid(document) => Ok(document),
            ValidationResult::Invalid(errors) => Err(errors),
        }
    }
}

/// Check `document` against the schema for `kind`.
///
/// Pure: the input is only read, and the same input always yields the same
/// result. Numeric fields must already be JSON numbers; no coercion happens here.
pub fn validate(document: &Value, kind: DocType) -> ValidationResult {
    let schema = document_schema(kind);
    let mut errors = Vec::new();

    if let Err(found) = schema.validate(document) {
        for error in found {
            errors.push(FieldError::new(
                field_path(&error.instance_path.to_string()),
                error.to_string(),
            ));
        }
    }

    if let Some(label) = document.get("doc_type").and_then(Value::as_str) {
        if let Some(declared) = DocType::from_label(label) {
            if declared != kind {
                errors.push(FieldError::new(
                    "/doc_type",
                    format!("expected {} but document declares {}", kind, declared),
                ));
            }
        }
    }

    errors.extend(check_dates(document));

    if !errors.is_empty() {
        return ValidationResult::Invalid(errors);
    }

    match serde_json::from_value::<Document>(document.clone()) {
        Ok(parsed) => ValidationResult::Valid(parsed),
        Err(err) => ValidationResult::Invalid(vec![FieldError::new("/", err.to_string())]),
    }
}

/// Validate against whichever schema the document's own `doc_type` names.
/// Unrecognised kinds are checked as quotations, which reports the bad label.
pub fn validate_declared(document: &Value) -> ValidationResult {
    let kind = document
        .get("doc_type")
        .and_then(Value::as_str)
        .and_then(DocType::from_label)
        .unwrap_or_default();
    validate(document, kind)
}

fn field_path(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

fn check_dates(document: &Value) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let Some(dates) = document.get("dates").and_then(Value::as_object) else {
        return errors;
    };
    for key in ["issue_date", "due_date", "valid_till"] {
        if let Some(Value::String(raw)) = dates.get(key) {
            if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_err() {
                errors.push(FieldError::new(
                    format!("/dates/{}", key),
                    format!("{:?} is not an ISO date (YYYY-MM-DD)", raw),
                ));
            }
        }
    }
    errors
}

fn document_schema(kind: DocType) -> JSONSchema {
    let optional_text = json!({"type": ["string", "null"]});
    let party = json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "address": optional_text,
            "email": optional_text,
            "phone": optional_text,
            "gstin": optional_text,
            "pan": optional_text,
            "state": optional_text,
            "place_of_supply": optional_text,
            "bank": {
                "type": ["object", "null"],
                "properties": {
                    "account_name": optional_text,
                    "account_no": optional_text,
                    "ifsc": optional_text,
                    "upi_id": optional_text
                }
            }
        }
    });
    let amount = json!({"type": "number", "minimum": 0});
    let item = json!({
        "type": "object",
        "required": ["description", "qty", "unit_price", "unit", "discount", "tax_rate"],
        "properties": {
            "description": {"type": "string", "minLength": 1},
            "qty": amount,
            "unit_price": amount,
            "unit": {"type": "string"},
            "discount": amount,
            "tax_rate": amount,
            "hsn_sac": optional_text
        }
    });

    let mut doc_meta = json!({
        "type": ["object", "null"],
        "properties": {
            "doc_no": optional_text,
            "ref_no": optional_text,
            "po_no": optional_text
        }
    });
    let mut required = vec![
        "doc_type", "locale", "currency", "seller", "buyer", "dates", "items", "totals", "terms",
    ];
    if kind == DocType::TaxInvoice {
        doc_meta = json!({
            "type": "object",
            "required": ["doc_no"],
            "properties": {
                "doc_no": {"type": "string", "minLength": 1},
                "ref_no": optional_text,
                "po_no": optional_text
            }
        });
        required.push("doc_meta");
    }

    let schema = json!({
        "type": "object",
        "required": required,
        "properties": {
            "doc_type": {"type": "string", "enum": ["QUOTATION", "TAX_INVOICE"]},
            "locale": {"type": "string", "minLength": 1},
            "currency": {"type": "string", "minLength": 1},
            "seller": party,
            "buyer": party,
            "doc_meta": doc_meta,
            "dates": {
                "type": "object",
                "required": ["issue_date"],
                "properties": {
                    "issue_date": {"type": "string"},
                    "due_date": optional_text,
                    "valid_till": optional_text
                }
            },
            "items": {"type": "array", "items": item},
            "totals": {
                "type": "object",
                "required": ["subtotal", "discount_total", "tax_total", "grand_total"],
                "properties": {
                    "subtotal": {"type": "number"},
                    "discount_total": {"type": "number"},
                    "tax_total": {"type": "number"},
                    "shipping": {"type": "number"},
                    "round_off": {"type": "number"},
                    "grand_total": {"type": "number"},
                    "amount_in_words": optional_text,
                    "gst": {"type": ["object", "null"]}
                }
            },
            "terms": {
                "type": "object",
                "required": ["title", "bullets"],
                "properties": {
                    "title": {"type": "string"},
                    "bullets": {"type": "array", "minItems": 1, "items": {"type": "string"}}
                }
            },
            "notes": optional_text,
            "payment": {
                "type": ["object", "null"],
                "properties": {
                    "mode": {"enum": ["UPI", "BANK_TRANSFER", "OTHER", null]},
                    "upi_deeplink": optional_text,
                    "instructions": optional_text
                }
            }
        }
    });

    JSONSchema::compile(&schema).expect("Invalid document schema")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_quotation() -> Value {
        json!({
            "doc_type": "QUOTATION",
            "locale": "en-IN",
            "currency": "INR",
            "seller": {"name": "Acme Studio", "state": "GJ"},
            "buyer": {"name": "Globex", "state": "MH"},
            "dates": {"issue_date": "2025-04-01", "valid_till": "2025-04-16"},
            "items": [{
                "description": "Logo design",
                "qty": 1,
                "unit_price": 15000,
                "unit": "pcs",
                "discount": 0,
                "tax_rate": 18
            }],
            "totals": {"subtotal": 0, "discount_total": 0, "tax_total": 0, "grand_total": 0},
            "terms": {"title": "Terms & Conditions", "bullets": ["50% advance"]}
        })
    }

    #[test]
    fn accepts_a_complete_quotation() {
        let document = match validate(&valid_quotation(), DocType::Quotation) {
            ValidationResult::Valid(document) => document,
            other => panic!("expected valid, got {other:?}"),
        };
        assert_eq!(document.doc_type, DocType::Quotation);
        assert_eq!(document.items.len(), 1);
    }

    #[test]
    fn reports_stringified_numbers_with_their_path() {
        let mut doc = valid_quotation();
        doc["items"][0]["qty"] = json!("5");
        let errors = validate(&doc, DocType::Quotation).into_result().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "/items/0/qty"), "{errors:?}");
    }

    #[test]
    fn rejects_unknown_doc_type() {
        let mut doc = valid_quotation();
        doc["doc_type"] = json!("PROJECT_BRIEF");
        let errors = validate(&doc, DocType::Quotation).into_result().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "/doc_type"));
    }

    #[test]
    fn tax_invoice_requires_a_document_number() {
        let mut doc = valid_quotation();
        doc["doc_type"] = json!("TAX_INVOICE");
        let errors = validate(&doc, DocType::TaxInvoice).into_result().unwrap_err();
        assert!(!errors.is_empty());

        doc["doc_meta"] = json!({"doc_no": "INV-001"});
        assert!(validate(&doc, DocType::TaxInvoice).is_valid());
    }

    #[test]
    fn flags_kind_mismatch() {
        let errors = validate(&valid_quotation(), DocType::TaxInvoice)
            .into_result()
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == "/doc_type" && e.reason.contains("expected TAX_INVOICE")));
    }

    #[test]
    fn rejects_non_iso_dates() {
        let mut doc = valid_quotation();
        doc["dates"]["issue_date"] = json!("01/04/2025");
        let errors = validate(&doc, DocType::Quotation).into_result().unwrap_err();
        assert_eq!(errors[0].field, "/dates/issue_date");
    }

    #[test]
    fn is_idempotent() {
        let mut doc = valid_quotation();
        doc["items"][0]["unit_price"] = json!("lots");
        let first = validate(&doc, DocType::Quotation);
        let second = validate(&doc, DocType::Quotation);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_item_list_is_allowed() {
        let mut doc = valid_quotation();
        doc["items"] = json!([]);
        assert!(validate(&doc, DocType::Quotation).is_valid());
    }

    #[test]
    fn declared_kind_selects_schema() {
        let mut doc = valid_quotation();
        doc["doc_type"] = json!("TAX_INVOICE");
        doc["doc_meta"] = json!({"doc_no": "INV-9"});
        assert!(validate_declared(&doc).is_valid());
    }
}
