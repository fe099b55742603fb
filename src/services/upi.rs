use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::models::UpiLinkResponse;
use crate::utils::format_decimal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpiRequest {
    pub upi_id: String,
    pub payee_name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub txn_ref: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Build a `upi://pay` deep link. Optional parameters are left out when unset.
pub fn generate_deeplink(request: &UpiRequest) -> String {
    let mut parts = vec![
        format!("upi://pay?pa={}", encode(request.upi_id.trim())),
        format!("pn={}", encode(&request.payee_name)),
    ];
    if let Some(amount) = request.amount.filter(|a| a.is_finite()) {
        parts.push(format!("am={}", format_decimal(amount)));
    }
    parts.push(format!("cu={}", encode(&request.currency)));
    if let Some(note) = request.note.as_deref().filter(|n| !n.is_empty()) {
        parts.push(format!("tn={}", encode(note)));
    }
    if let Some(txn_ref) = request.txn_ref.as_deref().filter(|r| !r.is_empty()) {
        parts.push(format!("tr={}", encode(txn_ref)));
    }
    if let Some(url) = request.callback_url.as_deref().filter(|u| !u.is_empty()) {
        parts.push(format!("url={}", encode(url)));
    }
    parts.join("&")
}

/// QR codes carry the same payload as the deep link.
pub fn generate_link_pair(request: &UpiRequest) -> UpiLinkResponse {
    let deeplink = generate_deeplink(request);
    UpiLinkResponse {
        qr_payload: deeplink.clone(),
        deeplink,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UpiRequest {
        UpiRequest {
            upi_id: "acme@okaxis".to_string(),
            payee_name: "Acme Studio".to_string(),
            amount: Some(11800.0),
            currency: "INR".to_string(),
            note: None,
            txn_ref: None,
            callback_url: None,
        }
    }

    #[test]
    fn encodes_payee_and_formats_amount() {
        assert_eq!(
            generate_deeplink(&request()),
            "upi://pay?pa=acme%40okaxis&pn=Acme%20Studio&am=11800.00&cu=INR"
        );
    }

    #[test]
    fn optional_parts_are_appended_in_order() {
        let mut req = request();
        req.amount = None;
        req.note = Some("Logo & branding".to_string());
        req.txn_ref = Some("INV-20250401".to_string());
        let link = generate_deeplink(&req);
        assert_eq!(
            link,
            "upi://pay?pa=acme%40okaxis&pn=Acme%20Studio&cu=INR&tn=Logo%20%26%20branding&tr=INV-20250401"
        );
    }

    #[test]
    fn qr_payload_matches_deeplink() {
        let pair = generate_link_pair(&request());
        assert_eq!(pair.deeplink, pair.qr_payload);
    }
}
