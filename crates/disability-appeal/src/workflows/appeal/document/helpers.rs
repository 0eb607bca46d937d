//! Formatting helpers exposed to the appeal template.

use chrono::{DateTime, Utc};
use handlebars::{handlebars_helper, Handlebars};
use serde_json::Value;

use crate::workflows::appeal::domain::parse_iso_date;

const MISSING_DATE: &str = "N/A";
const INVALID_DATE: &str = "Invalid Date";

handlebars_helper!(format_date_helper: |value: Json| format_date(value));
handlebars_helper!(bool_to_yes_no_helper: |value: Json| bool_to_yes_no(value));
handlebars_helper!(gt_helper: |left: Json, right: Json| greater_than(left, right));

/// Registers `formatDate`, `boolToYesNo` and `gt` on the registry.
pub fn register(registry: &mut Handlebars<'_>) {
    registry.register_helper("formatDate", Box::new(format_date_helper));
    registry.register_helper("boolToYesNo", Box::new(bool_to_yes_no_helper));
    registry.register_helper("gt", Box::new(gt_helper));
}

/// Short US date (`3/14/2025`), `N/A` for falsy input.
pub fn format_date(value: &Value) -> String {
    if !is_truthy(value) {
        return MISSING_DATE.to_string();
    }

    let instant = match value {
        Value::String(raw) => parse_iso_date(raw),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };

    match instant {
        Some(instant) => instant.format("%-m/%-d/%Y").to_string(),
        None => INVALID_DATE.to_string(),
    }
}

pub fn bool_to_yes_no(value: &Value) -> &'static str {
    if is_truthy(value) {
        "Yes"
    } else {
        "No"
    }
}

/// Numbers compare numerically, strings lexicographically; anything else is coerced
/// to a number when possible and otherwise never greater.
pub fn greater_than(left: &Value, right: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return a > b;
    }

    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// Truthiness as the form front-end understands it: `null`, `false`, `0`, `NaN` and
/// the empty string are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(text) if text.trim().is_empty() => Some(0.0),
        Value::String(text) => text.trim().parse().ok(),
        Value::Array(_) | Value::Object(_) => None,
    }
}
