use serde_json::Value;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::models::{Envelope, FieldError, TotalsResponse};
use crate::services::repair::repair_draft;
use crate::services::totals;
use crate::services::validation::{validate_declared, ValidationResult};

pub fn validate_document(draft: &Value) -> Envelope {
    let span = info_span!("validate", request_id = %Uuid::new_v4());
    let _guard = span.enter();

    if !draft.is_object() {
        return Envelope::failure(vec![FieldError::new("/", "document must be a JSON object")]);
    }
    match validate_declared(draft) {
        ValidationResult::Valid(document) => {
            info!(doc_type = %document.doc_type, "document valid");
            Envelope::success(document.to_value())
        }
        ValidationResult::Invalid(errors) => {
            info!(errors = errors.len(), "document invalid");
            Envelope::failure(errors)
        }
    }
}

pub fn repair_document(draft: &Value, config: &PipelineConfig) -> Envelope {
    let span = info_span!("repair", request_id = %Uuid::new_v4());
    let _guard = span.enter();

    match repair_draft(draft, config) {
        Ok(document) => Envelope::success(document.to_value()),
        Err(err) => {
            warn!(error = %err, "repair failed");
            Envelope::failure(err.field_errors())
        }
    }
}

pub fn compute_totals(draft: &Value, config: &PipelineConfig) -> TotalsResponse {
    let span = info_span!("totals", request_id = %Uuid::new_v4());
    let _guard = span.enter();

    let totals = totals::compute_totals(draft, config);
    info!(grand_total = totals.grand_total, "totals recomputed");
    TotalsResponse { ok: true, totals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repair_envelope_carries_document() {
        let envelope = repair_document(&json!({"doc_type": "INVALID", "items": []}), &PipelineConfig::default());
        assert!(envelope.ok);
        let document = envelope.document.unwrap();
        assert_eq!(document["doc_type"], json!("QUOTATION"));
    }

    #[test]
    fn repair_envelope_absorbs_wrong_types() {
        let envelope = repair_document(&json!({"items": 5, "payment": "upi"}), &PipelineConfig::default());
        assert!(envelope.ok, "{:?}", envelope.errors);
        assert!(envelope.errors.is_empty());
        let document = envelope.document.unwrap();
        assert_eq!(document["items"], json!([]));
        assert_eq!(document["payment"]["mode"], json!("UPI"));
    }

    #[test]
    fn non_object_is_reported_on_root() {
        let envelope = repair_document(&json!(null), &PipelineConfig::default());
        assert_eq!(envelope.errors, vec![FieldError::new("/", "document must be a JSON object")]);
        let envelope = validate_document(&json!("text"));
        assert_eq!(envelope.errors[0].field, "/");
    }

    #[test]
    fn validate_does_not_repair() {
        let envelope = validate_document(&json!({"doc_type": "QUOTATION", "items": []}));
        assert!(!envelope.ok);
        assert!(!envelope.errors.is_empty());
    }
}
