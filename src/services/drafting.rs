use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{DraftingError, RepairError};
use crate::models::{DocType, Document, FieldError};
use crate::services::json_extract::extract_json;
use crate::services::provider::{DraftProvider, PromptPacket};
use crate::services::repair::repair_draft;

/// A free-text requirement plus whatever the caller already knows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftRequest {
    pub requirement: String,
    #[serde(default)]
    pub doc_type: DocType,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub seller: Option<Value>,
    #[serde(default)]
    pub buyer: Option<Value>,
}

/// Ask the provider for a draft and run it through repair.
///
/// When the first answer cannot be repaired, the provider gets one more
/// chance with the remaining errors spelled out.
pub async fn generate_draft(
    provider: &dyn DraftProvider,
    request: &DraftRequest,
    config: &PipelineConfig,
    temperature: f32,
) -> Result<Document, DraftingError> {
    let packet = PromptPacket {
        system_prompt: system_prompt(),
        user_prompt: user_prompt(request, config),
        temperature,
    };

    let raw = provider
        .complete(&packet)
        .await
        .map_err(DraftingError::Provider)?;

    let errors = match attempt(&raw, request, config) {
        Ok(document) => {
            info!(provider = provider.name(), doc_type = %document.doc_type, "draft generated");
            return Ok(document);
        }
        Err(DraftingError::Repair(RepairError::RepairFailed { errors })) => errors,
        Err(DraftingError::Extract(err)) => vec![FieldError::new("/", err.to_string())],
        Err(other) => return Err(other),
    };

    warn!(
        provider = provider.name(),
        errors = errors.len(),
        "provider output unrepairable, asking for a corrected draft"
    );
    let fix = PromptPacket {
        system_prompt: packet.system_prompt,
        user_prompt: fix_prompt(&raw, &errors),
        temperature,
    };
    let raw = provider
        .complete(&fix)
        .await
        .map_err(DraftingError::Provider)?;
    let document = attempt(&raw, request, config)?;
    info!(provider = provider.name(), doc_type = %document.doc_type, "draft generated on retry");
    Ok(document)
}

fn attempt(raw: &str, request: &DraftRequest, config: &PipelineConfig) -> Result<Document, DraftingError> {
    let mut value = extract_json(raw)?;
    apply_request_hints(&mut value, request);
    Ok(repair_draft(&value, config)?)
}

/// The caller's own details win over whatever the model invented for them.
fn apply_request_hints(value: &mut Value, request: &DraftRequest) {
    let Value::Object(fields) = value else {
        return;
    };
    fields.insert("doc_type".to_string(), json!(request.doc_type.as_str()));
    if let Some(currency) = &request.currency {
        fields.insert("currency".to_string(), json!(currency));
    }
    for (key, hint) in [("seller", &request.seller), ("buyer", &request.buyer)] {
        let Some(Value::Object(hint)) = hint else { continue };
        match fields.get_mut(key) {
            Some(Value::Object(party)) => {
                for (name, entry) in hint {
                    party.insert(name.clone(), entry.clone());
                }
            }
            _ => {
                fields.insert(key.to_string(), Value::Object(hint.clone()));
            }
        }
    }
}

fn system_prompt() -> String {
    r#"You draft Indian commercial documents. Return one JSON object only, no markdown.
Fields:
- doc_type ("QUOTATION" | "TAX_INVOICE")
- currency, locale
- seller, buyer ({name, address, email, phone, gstin, state})
- doc_meta ({doc_no})
- dates ({issue_date, valid_till | due_date} as YYYY-MM-DD)
- items ([{description, qty, unit_price, unit, discount (percent), tax_rate (percent), hsn_sac}])
- terms ({title, bullets})
- notes, payment ({mode: UPI | BANK_TRANSFER | OTHER, instructions})
"#
    .to_string()
}

fn user_prompt(request: &DraftRequest, config: &PipelineConfig) -> String {
    let currency = request
        .currency
        .as_deref()
        .unwrap_or(&config.default_currency);
    format!(
        "Requirement:\n{}\n\ndoc_type: {}\ncurrency: {}",
        request.requirement.trim(),
        request.doc_type,
        currency
    )
}

fn fix_prompt(raw: &str, errors: &[FieldError]) -> String {
    let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!(
        "Fix this JSON so it satisfies the fields above. Only output JSON.\nProblems:\n{}\nJSON:\n{}",
        listed.join("\n"),
        raw
    )
}
