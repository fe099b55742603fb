use serde_json::Value;
use tracing::warn;

use crate::config::{DiscountMode, JurisdictionDefault, PipelineConfig};
use crate::models::{DocType, Document, GstBreakup, LineItem, Party, SupplyMode, Totals};
use crate::utils::{coerce_number, round_money};

/// Amounts for a single row, before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineAmounts {
    pub subtotal: f64,
    pub discount: f64,
    pub taxable: f64,
    pub tax: f64,
}

/// Compute one line from already-resolved numbers.
///
/// A line whose amounts leave the `f64` range counts as zero.
pub fn line_amounts(qty: f64, unit_price: f64, discount: f64, tax_rate: f64, mode: DiscountMode) -> LineAmounts {
    let qty = qty.max(0.0);
    let unit_price = unit_price.max(0.0);
    let discount = discount.max(0.0);
    let tax_rate = tax_rate.max(0.0);

    let subtotal = qty * unit_price;
    let discount = match mode {
        DiscountMode::Percent => subtotal * discount.min(100.0) / 100.0,
        DiscountMode::Amount => discount.min(subtotal),
    };
    let taxable = subtotal - discount;
    let tax = taxable * tax_rate / 100.0;

    let amounts = LineAmounts {
        subtotal,
        discount,
        taxable,
        tax,
    };
    if [subtotal, discount, taxable, tax].iter().all(|v| v.is_finite()) {
        amounts
    } else {
        warn!(qty, unit_price, tax_rate, "line amounts overflowed, counted as zero");
        LineAmounts::default()
    }
}

/// Recompute totals straight from a raw draft, coercing every numeric field
/// on the way. Works on drafts that would not pass validation.
pub fn compute_totals(draft: &Value, config: &PipelineConfig) -> Totals {
    let lines = draft
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    line_amounts(
                        coerce_number(item.get("qty"), config.default_qty),
                        coerce_number(item.get("unit_price"), 0.0),
                        coerce_number(item.get("discount"), 0.0),
                        coerce_number(item.get("tax_rate"), 0.0),
                        config.discount_mode,
                    )
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let shipping = coerce_number(draft.get("totals").and_then(|t| t.get("shipping")), 0.0);
    let kind = draft
        .get("doc_type")
        .and_then(Value::as_str)
        .and_then(DocType::from_label)
        .unwrap_or(config.default_doc_type);

    let parties = if kind == DocType::TaxInvoice {
        let seller = party_from(draft.get("seller"));
        let buyer = party_from(draft.get("buyer"));
        Some((seller, buyer))
    } else {
        None
    };

    aggregate(
        &lines,
        shipping,
        parties.as_ref().map(|(seller, buyer)| (seller, buyer)),
        config,
    )
}

/// Recompute totals for a validated document.
pub fn compute_document_totals(document: &Document, config: &PipelineConfig) -> Totals {
    let lines: Vec<LineAmounts> = document
        .items
        .iter()
        .map(|item: &LineItem| {
            line_amounts(item.qty, item.unit_price, item.discount, item.tax_rate, config.discount_mode)
        })
        .collect();

    let parties = match document.doc_type {
        DocType::TaxInvoice => Some((&document.seller, &document.buyer)),
        DocType::Quotation => None,
    };

    aggregate(&lines, document.totals.shipping, parties, config)
}

fn party_from(value: Option<&Value>) -> Party {
    value
        .cloned()
        .and_then(|raw| serde_json::from_value::<Party>(raw).ok())
        .unwrap_or_default()
}

fn aggregate(
    lines: &[LineAmounts],
    shipping: f64,
    parties: Option<(&Party, &Party)>,
    config: &PipelineConfig,
) -> Totals {
    let subtotal = round_money(lines.iter().map(|l| l.subtotal).sum());
    let discount_total = round_money(lines.iter().map(|l| l.discount).sum());
    let tax_total = round_money(lines.iter().map(|l| l.tax).sum());
    let shipping = round_money(shipping.max(0.0));

    let unrounded = subtotal - discount_total + tax_total + shipping;
    if !unrounded.is_finite() {
        warn!(lines = lines.len(), "totals overflowed, line amounts counted as zero");
        return aggregate(&[], shipping, parties, config);
    }
    let grand_total = unrounded.round();
    let round_off = round_money(grand_total - unrounded);
    // keep -0.0 out of the output
    let grand_total = if grand_total == 0.0 { 0.0 } else { grand_total };

    let gst = parties.map(|(seller, buyer)| split_tax(tax_total, seller, buyer, config));

    Totals {
        subtotal,
        discount_total,
        tax_total,
        shipping,
        round_off,
        grand_total,
        amount_in_words: Some(amount_in_words(grand_total)),
        gst,
    }
}

/// Decide intra- vs inter-state supply and split `tax_total` accordingly.
pub fn split_tax(tax_total: f64, seller: &Party, buyer: &Party, config: &PipelineConfig) -> GstBreakup {
    let (mode, place_of_supply) = supply_mode(seller, buyer, config);
    match mode {
        SupplyMode::Intra => {
            // exact halving: cgst + sgst == tax_total
            let half = tax_total / 2.0;
            GstBreakup {
                mode,
                cgst: half,
                sgst: half,
                igst: 0.0,
                place_of_supply,
            }
        }
        SupplyMode::Inter => GstBreakup {
            mode,
            cgst: 0.0,
            sgst: 0.0,
            igst: round_money(tax_total),
            place_of_supply,
        },
    }
}

fn supply_mode(seller: &Party, buyer: &Party, config: &PipelineConfig) -> (SupplyMode, Option<String>) {
    let place_of_supply = buyer.state_code();
    if let (Some(from), Some(to)) = (seller.state_code(), buyer.state_code()) {
        let mode = if from == to { SupplyMode::Intra } else { SupplyMode::Inter };
        return (mode, place_of_supply);
    }
    if seller.state_code().is_none() && buyer.state_code().is_none() {
        if let (Some(from), Some(to)) = (seller.gstin_state(), buyer.gstin_state()) {
            let mode = if from == to { SupplyMode::Intra } else { SupplyMode::Inter };
            return (mode, Some(to));
        }
    }
    let mode = match config.missing_jurisdiction {
        JurisdictionDefault::IntraState => SupplyMode::Intra,
        JurisdictionDefault::InterState => SupplyMode::Inter,
    };
    (mode, place_of_supply)
}

const ONES: [&str; 10] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];
const TEENS: [&str; 10] = [
    "Ten", "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen",
    "Eighteen", "Nineteen",
];
const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];
const INDIAN_SCALE: [(u64, &str); 3] = [(10_000_000, "Crore"), (100_000, "Lakh"), (1_000, "Thousand")];

fn below_hundred(n: u64) -> String {
    let n = n as usize;
    match n {
        0..=9 => ONES[n].to_string(),
        10..=19 => TEENS[n - 10].to_string(),
        _ if n % 10 == 0 => TENS[n / 10].to_string(),
        _ => format!("{} {}", TENS[n / 10], ONES[n % 10]),
    }
}

fn below_thousand(n: u64) -> String {
    let hundreds = n / 100;
    let rest = n % 100;
    match (hundreds, rest) {
        (0, _) => below_hundred(rest),
        (h, 0) => format!("{} Hundred", ONES[h as usize]),
        (h, r) => format!("{} Hundred {}", ONES[h as usize], below_hundred(r)),
    }
}

/// Spell out a rupee amount using the Indian numbering system.
pub fn amount_in_words(amount: f64) -> String {
    let amount = if amount.is_finite() { amount.abs() } else { 0.0 };
    let in_paise = (amount * 100.0).round() as u64;
    let rupees = in_paise / 100;
    let paise = in_paise % 100;
    if rupees == 0 && paise == 0 {
        return "Zero Rupees Only".to_string();
    }

    let mut parts = Vec::new();
    let mut remaining = rupees;
    // crores above 99 keep stacking as a plain number of crores
    for (divider, label) in INDIAN_SCALE {
        let count = remaining / divider;
        if count > 0 {
            let spoken = if count >= 100 { below_thousand_or_more(count) } else { below_hundred(count) };
            parts.push(format!("{} {}", spoken, label));
            remaining %= divider;
        }
    }
    if remaining > 0 {
        parts.push(below_thousand(remaining));
    }

    let mut words = if parts.is_empty() {
        "Zero".to_string()
    } else {
        parts.join(" ")
    };
    words.push_str(" Rupees");
    if paise > 0 {
        words.push_str(&format!(" and {} Paise", below_hundred(paise)));
    }
    words.push_str(" Only");
    words
}

fn below_thousand_or_more(n: u64) -> String {
    if n < 1000 {
        below_thousand(n)
    } else {
        let thousands = n / 1000;
        let rest = n % 1000;
        let head = format!("{} Thousand", below_thousand_or_more(thousands));
        if rest == 0 {
            head
        } else {
            format!("{} {}", head, below_thousand(rest))
        }
    }
}
