use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use brief2bill::commands;
use brief2bill::config::{ProviderKind, Settings};
use brief2bill::models::DocType;
use brief2bill::services::drafting::DraftRequest;
use brief2bill::services::json_extract::extract_json;
use brief2bill::services::upi::UpiRequest;

#[derive(Parser)]
#[command(name = "brief2bill", version, about = "Repair, validate and total LLM-drafted quotations and invoices")]
struct Cli {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(long, env = "BRIEF2BILL_CONFIG", default_value = "brief2bill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a draft as-is
    Validate {
        /// JSON file, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Repair a draft and recompute its totals
    Repair {
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Recompute totals only
    Totals {
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Build a UPI payment link
    Upi {
        #[arg(long)]
        upi_id: String,
        #[arg(long)]
        payee: String,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long, default_value = "INR")]
        currency: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        txn_ref: Option<String>,
        #[arg(long)]
        callback_url: Option<String>,
    },
    /// Draft a document from a free-text requirement via an LLM provider
    Generate {
        #[arg(long)]
        requirement: String,
        #[arg(long, value_parser = parse_doc_type, default_value = "QUOTATION")]
        doc_type: DocType,
        #[arg(long)]
        currency: Option<String>,
        /// JSON file with seller details
        #[arg(long)]
        seller: Option<PathBuf>,
        /// JSON file with buyer details
        #[arg(long)]
        buyer: Option<PathBuf>,
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,
        #[arg(long)]
        model: Option<String>,
    },
}

fn parse_doc_type(raw: &str) -> Result<DocType, String> {
    DocType::from_label(raw).ok_or_else(|| format!("unknown doc type {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)?;

    match cli.command {
        Command::Validate { input } => {
            let envelope = commands::documents::validate_document(&read_draft(&input)?);
            emit(&envelope, envelope.ok)
        }
        Command::Repair { input } => {
            let envelope = commands::documents::repair_document(&read_draft(&input)?, &settings.pipeline);
            emit(&envelope, envelope.ok)
        }
        Command::Totals { input } => {
            let response = commands::documents::compute_totals(&read_draft(&input)?, &settings.pipeline);
            emit(&response, response.ok)
        }
        Command::Upi {
            upi_id,
            payee,
            amount,
            currency,
            note,
            txn_ref,
            callback_url,
        } => {
            let request = UpiRequest {
                upi_id,
                payee_name: payee,
                amount,
                currency,
                note,
                txn_ref,
                callback_url,
            };
            match commands::payments::create_upi_link(&request) {
                Ok(pair) => emit(&pair, true),
                Err(message) => {
                    eprintln!("{message}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Generate {
            requirement,
            doc_type,
            currency,
            seller,
            buyer,
            provider,
            model,
        } => {
            if let Some(kind) = provider {
                settings.provider.kind = kind;
                settings.provider.resolve_api_key();
            }
            if model.is_some() {
                settings.provider.model = model;
            }
            let request = DraftRequest {
                requirement,
                doc_type,
                currency,
                seller: seller.as_deref().map(read_draft).transpose()?,
                buyer: buyer.as_deref().map(read_draft).transpose()?,
            };
            let envelope = commands::drafting::generate(&settings, &request).await;
            emit(&envelope, envelope.ok)
        }
    }
}

fn read_draft(path: &Path) -> Result<Value> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Ok(value),
        Err(_) => extract_json(&raw).with_context(|| format!("no JSON document in {}", path.display())),
    }
}

fn emit<T: Serialize>(payload: &T, ok: bool) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
