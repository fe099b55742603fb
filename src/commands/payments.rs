use tracing::{info, info_span};
use uuid::Uuid;

use crate::models::UpiLinkResponse;
use crate::services::upi::{generate_link_pair, UpiRequest};

pub fn create_upi_link(request: &UpiRequest) -> Result<UpiLinkResponse, String> {
    let span = info_span!("upi", request_id = %Uuid::new_v4());
    let _guard = span.enter();

    if request.upi_id.trim().is_empty() || !request.upi_id.contains('@') {
        return Err("upi_id must look like name@bank".to_string());
    }
    if request.payee_name.trim().is_empty() {
        return Err("payee_name must not be empty".to_string());
    }
    if let Some(amount) = request.amount {
        if !amount.is_finite() || amount < 0.0 {
            return Err("amount must be a non-negative number".to_string());
        }
    }

    let pair = generate_link_pair(request);
    info!(has_amount = request.amount.is_some(), "upi link generated");
    Ok(pair)
}
