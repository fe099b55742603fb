use thiserror::Error;

use crate::models::FieldError;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("document is not a JSON object")]
    NotARecord,

    #[error("repair could not produce a valid document ({} remaining errors)", .errors.len())]
    RepairFailed { errors: Vec<FieldError> },
}

impl RepairError {
    /// Field/reason pairs for the client envelope.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            RepairError::NotARecord => vec![FieldError::new("/", "document must be a JSON object")],
            RepairError::RepairFailed { errors } => errors.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("provider response was empty")]
    Empty,

    #[error("no JSON object found in provider response")]
    NoJsonObject,
}

#[derive(Debug, Error)]
pub enum DraftingError {
    #[error("provider call failed: {0}")]
    Provider(#[source] anyhow::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Repair(#[from] RepairError),
}

impl DraftingError {
    /// Field/reason pairs for the client envelope. Upstream details stay in the logs.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            DraftingError::Provider(_) => vec![FieldError::new("provider", "upstream provider error")],
            DraftingError::Extract(err) => vec![FieldError::new("provider", err.to_string())],
            DraftingError::Repair(err) => err.field_errors(),
        }
    }
}
