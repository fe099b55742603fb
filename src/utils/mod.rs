use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::debug;

/// Resolve any JSON value to a finite `f64`, falling back to `default`.
///
/// Numbers pass through, strings are parsed after trimming, and everything
/// else (null, booleans, arrays, objects, garbage text) yields `default`.
/// This never fails.
pub fn coerce_number(value: Option<&Value>, default: f64) -> f64 {
    let resolved = match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match resolved {
        Some(number) if number.is_finite() => number,
        _ => {
            if let Some(raw) = value.filter(|v| !v.is_null()) {
                debug!(raw = %raw, default, "numeric coercion fell back to default");
            }
            if default.is_finite() {
                default
            } else {
                0.0
            }
        }
    }
}

/// Round to two decimal places (paise). Non-finite input becomes 0; values
/// too large to scale are already past paise precision and pass through.
pub fn round_money(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let rounded = (value * 100.0).round() / 100.0;
    if !rounded.is_finite() {
        return value;
    }
    // avoid "-0.00" leaking into documents
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn normalize_date(value: Option<&Value>) -> Option<NaiveDate> {
    let raw = value?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%Y.%m.%d"];
    for fmt in formats.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    None
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_numbers_and_numeric_strings() {
        assert_eq!(coerce_number(Some(&json!(5)), 0.0), 5.0);
        assert_eq!(coerce_number(Some(&json!(2.5)), 0.0), 2.5);
        assert_eq!(coerce_number(Some(&json!("1000")), 0.0), 1000.0);
        assert_eq!(coerce_number(Some(&json!("  18 ")), 0.0), 18.0);
    }

    #[test]
    fn falls_back_for_everything_else() {
        let cases = [
            json!(null),
            json!("10 units"),
            json!("N/A"),
            json!(""),
            json!("NaN"),
            json!("inf"),
            json!(true),
            json!([1, 2]),
            json!({"amount": 3}),
        ];
        for case in cases.iter() {
            assert_eq!(coerce_number(Some(case), 7.0), 7.0, "input {case}");
        }
        assert_eq!(coerce_number(None, 3.0), 3.0);
    }

    #[test]
    fn non_finite_default_is_replaced() {
        assert_eq!(coerce_number(None, f64::NAN), 0.0);
    }

    #[test]
    fn money_rounds_to_paise() {
        assert_eq!(round_money(10.004), 10.0);
        assert_eq!(round_money(10.006), 10.01);
        assert_eq!(round_money(-0.001), 0.0);
        assert_eq!(format_decimal(11800.0), "11800.00");
    }

    #[test]
    fn money_rounding_stays_finite() {
        assert_eq!(round_money(f64::INFINITY), 0.0);
        assert_eq!(round_money(f64::NAN), 0.0);
        assert_eq!(round_money(1e307), 1e307);
    }

    #[test]
    fn dates_accept_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 9);
        assert_eq!(normalize_date(Some(&json!("2025-03-09"))), expected);
        assert_eq!(normalize_date(Some(&json!("09.03.2025"))), expected);
        assert_eq!(normalize_date(Some(&json!("09/03/2025"))), expected);
        assert_eq!(normalize_date(Some(&json!("2025/03/09"))), expected);
        assert_eq!(normalize_date(Some(&json!("someday"))), None);
        assert_eq!(normalize_date(Some(&json!(20250309))), None);
        assert_eq!(normalize_date(None), None);
    }
}
