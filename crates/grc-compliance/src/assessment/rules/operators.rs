use chrono::NaiveTime;
use tracing::warn;

use super::super::domain::FieldValue;
use super::model::Operator;

/// Applies `operator` to a resolved field. `None` means the path did not resolve.
///
/// Never fails: an unsupported operator evaluates to `false`.
pub fn evaluate_operator(
    field: Option<&FieldValue>,
    operator: &Operator,
    expected: &FieldValue,
) -> bool {
    match operator {
        Operator::Equals => strictly_equal(field, expected),
        Operator::NotEquals => !strictly_equal(field, expected),
        Operator::Contains => {
            matches!(field, Some(FieldValue::List(items)) if items.contains(expected))
        }
        Operator::GreaterThan => coerce_number(field) > coerce_number(Some(expected)),
        Operator::LessThan => coerce_number(field) < coerce_number(Some(expected)),
        Operator::In => expected
            .as_list()
            .is_some_and(|items| field.is_some_and(|value| items.contains(value))),
        Operator::NotIn => expected
            .as_list()
            .is_some_and(|items| !field.is_some_and(|value| items.contains(value))),
        Operator::Exists => exists(field),
        Operator::NotExists => !exists(field),
        Operator::Unknown(name) => {
            warn!(operator = %name, "unsupported rule operator evaluated as false");
            false
        }
    }
}

fn strictly_equal(field: Option<&FieldValue>, expected: &FieldValue) -> bool {
    field.is_some_and(|value| value == expected)
}

fn exists(field: Option<&FieldValue>) -> bool {
    match field {
        None | Some(FieldValue::Null) => false,
        Some(FieldValue::Text(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

/// Loose numeric coercion; anything without a numeric reading becomes NaN,
/// which makes both ordering comparisons false.
pub(crate) fn coerce_number(value: Option<&FieldValue>) -> f64 {
    match value {
        None => f64::NAN,
        Some(FieldValue::Null) => 0.0,
        Some(FieldValue::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(FieldValue::Number(number)) => *number,
        Some(FieldValue::Text(text)) => parse_numeric_text(text),
        Some(FieldValue::Date(date)) => {
            date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() as f64
        }
        Some(FieldValue::List(items)) => match items.as_slice() {
            [] => 0.0,
            [FieldValue::Bool(_)] => f64::NAN,
            [single] => coerce_number(Some(single)),
            _ => f64::NAN,
        },
        Some(FieldValue::Record(_)) => f64::NAN,
    }
}

fn parse_numeric_text(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let plain = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if !plain {
        return f64::NAN;
    }

    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
