pub mod documents;
pub mod drafting;
pub mod payments;
