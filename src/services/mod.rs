pub mod drafting;
pub mod json_extract;
pub mod provider;
pub mod repair;
pub mod totals;
pub mod upi;
pub mod validation;
