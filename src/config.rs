use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::{env, fs};

use crate::models::DocType;

/// How a line item's `discount` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountMode {
    /// Percentage of the line subtotal.
    #[default]
    Percent,
    /// Absolute currency amount, capped at the line subtotal.
    Amount,
}

/// Tax split to use when a party's state cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurisdictionDefault {
    #[default]
    IntraState,
    InterState,
}

/// Immutable defaults and policy flags for repair and totals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub default_doc_type: DocType,
    pub discount_mode: DiscountMode,
    pub missing_jurisdiction: JurisdictionDefault,
    pub default_currency: String,
    pub default_locale: String,
    pub default_qty: f64,
    pub quotation_validity_days: u32,
    pub invoice_due_days: u32,
    pub invoice_number_prefix: String,
    pub default_terms: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            default_doc_type: DocType::Quotation,
            discount_mode: DiscountMode::Percent,
            missing_jurisdiction: JurisdictionDefault::IntraState,
            default_currency: "INR".to_string(),
            default_locale: "en-IN".to_string(),
            default_qty: 1.0,
            quotation_validity_days: 15,
            invoice_due_days: 7,
            invoice_number_prefix: "INV".to_string(),
            default_terms: vec![
                "Prices exclusive of applicable taxes unless stated otherwise".to_string(),
                "Payment due within agreed timeline".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openrouter,
    Openai,
    Groq,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "https://api.openai.com/v1",
            ProviderKind::Openrouter => "https://openrouter.ai/api/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "gpt-4o-mini",
            ProviderKind::Openrouter => "openrouter/auto",
            ProviderKind::Groq => "llama-3.1-8b-instant",
        }
    }

    fn key_env_var(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Openrouter => "OPENROUTER_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl ProviderSettings {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.2)
    }

    /// Pick up the API key from `BRIEF2BILL_API_KEY`, else the provider's own variable.
    pub fn resolve_api_key(&mut self) {
        self.api_key = env::var("BRIEF2BILL_API_KEY")
            .or_else(|_| env::var(self.kind.key_env_var()))
            .ok()
            .filter(|key| !key.trim().is_empty());
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub provider: ProviderSettings,
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::from_toml(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Settings::default()
        };
        settings.provider.resolve_api_key();
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
