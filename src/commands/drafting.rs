use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{Envelope, FieldError};
use crate::services::drafting::{generate_draft, DraftRequest};
use crate::services::provider::{ChatCompletionsProvider, DraftProvider};

pub async fn generate(settings: &Settings, request: &DraftRequest) -> Envelope {
    let provider = match ChatCompletionsProvider::from_settings(&settings.provider) {
        Ok(provider) => provider,
        Err(err) => {
            error!(error = %err, "provider unavailable");
            return Envelope::failure(vec![FieldError::new("provider", "provider is not configured")]);
        }
    };
    generate_with(&provider, settings, request).await
}

pub async fn generate_with(provider: &dyn DraftProvider, settings: &Settings, request: &DraftRequest) -> Envelope {
    let span = info_span!("generate", request_id = %Uuid::new_v4(), provider = provider.name());
    async {
        if request.requirement.trim().is_empty() {
            return Envelope::failure(vec![FieldError::new("requirement", "must not be empty")]);
        }
        match generate_draft(provider, request, &settings.pipeline, settings.provider.temperature()).await {
            Ok(document) => Envelope::success(document.to_value()),
            Err(err) => {
                error!(error = ?err, "draft generation failed");
                Envelope::failure(err.field_errors())
            }
        }
    }
    .instrument(span)
    .await
}
