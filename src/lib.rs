//! Brief2Bill: turn loosely structured LLM drafts into valid quotations and
//! tax invoices with trustworthy totals.
//!
//! The core is [`services::repair::repair_draft`]: normalise `doc_type`, fill
//! in required fields, coerce numbers, validate, then recompute totals.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{DiscountMode, JurisdictionDefault, PipelineConfig, Settings};
pub use error::{DraftingError, ExtractError, RepairError};
pub use models::{DocType, Document, Envelope, FieldError, LineItem, Totals};
pub use services::repair::{repair_draft, repair_value};
pub use services::totals::compute_totals;
pub use services::validation::{validate, ValidationResult};
pub use utils::coerce_number;
