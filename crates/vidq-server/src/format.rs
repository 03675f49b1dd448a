//! Result normalizer: turns a [`RawResult`] into the text a user sees
//!
//! Numbers get space-separated thousands groups, decimals collapse to integers
//! when they are whole, and anything empty becomes [`NO_DATA`].

use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use thiserror::Error;
use tracing::warn;
use vidq_duck::{RawResult, Value};

/// Shown when a query produced nothing to report
pub const NO_DATA: &str = "Нет данных";

#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("Value is not a finite number: {0}")]
    NonFinite(f64),
}

/// Render a query result for display
pub fn normalize(raw: &RawResult) -> String {
    match raw {
        RawResult::Empty => NO_DATA.to_string(),
        RawResult::Scalar(value) => present(value),
        RawResult::Rows(rows) => match rows.rows.first() {
            None => NO_DATA.to_string(),
            Some(row) if row.len() == 1 => present(&row[0]),
            Some(row) => row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        },
    }
}

/// Render a single value
pub fn present(value: &Value) -> String {
    match value {
        Value::Null => NO_DATA.to_string(),
        Value::Int(i) => group_int(*i),
        Value::Float(x) => format_float(*x).unwrap_or_else(|e| {
            warn!(error = %e, "falling back to plain formatting");
            value.to_string()
        }),
        Value::Decimal(d) => present_decimal(d),
        other => other.to_string(),
    }
}

fn present_decimal(d: &BigDecimal) -> String {
    if d.is_integer() {
        return match d.to_i128() {
            Some(i) => group_int(i),
            None => group_digits(&d.with_scale(0).to_string()),
        };
    }
    match d.to_f64() {
        Some(x) => present(&Value::Float(x)),
        None => d.to_string(),
    }
}

/// `1234567` → `1 234 567`
pub fn group_int(value: i128) -> String {
    group_digits(&value.to_string())
}

/// Floats keep their shortest representation; whole floats keep a `.0`
pub fn format_float(value: f64) -> Result<String, FormatError> {
    if !value.is_finite() {
        return Err(FormatError::NonFinite(value));
    }

    let text = if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    };

    Ok(match text.split_once('.') {
        Some((whole, frac)) => format!("{}.{}", group_digits(whole), frac),
        None => group_digits(&text),
    })
}

fn group_digits(text: &str) -> String {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{}{}", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use vidq_duck::Rows;

    fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> RawResult {
        RawResult::Rows(Rows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    #[test]
    fn test_integers_are_grouped() {
        assert_eq!(normalize(&RawResult::Scalar(Value::Int(1234567))), "1 234 567");
        assert_eq!(normalize(&RawResult::Scalar(Value::Int(999))), "999");
        assert_eq!(normalize(&RawResult::Scalar(Value::Int(1000))), "1 000");
        assert_eq!(normalize(&RawResult::Scalar(Value::Int(-45000))), "-45 000");
        assert_eq!(normalize(&RawResult::Scalar(Value::Int(0))), "0");
    }

    #[test]
    fn test_decimals() {
        let whole = BigDecimal::from_str("100.00").unwrap();
        assert_eq!(normalize(&RawResult::Scalar(Value::Decimal(whole))), "100");

        let big = BigDecimal::from_str("2500000.0").unwrap();
        assert_eq!(normalize(&RawResult::Scalar(Value::Decimal(big))), "2 500 000");

        let frac = BigDecimal::from_str("12.5").unwrap();
        assert_eq!(normalize(&RawResult::Scalar(Value::Decimal(frac))), "12.5");
    }

    #[test]
    fn test_floats() {
        assert_eq!(normalize(&RawResult::Scalar(Value::Float(12.5))), "12.5");
        assert_eq!(normalize(&RawResult::Scalar(Value::Float(1234.25))), "1 234.25");
        assert_eq!(normalize(&RawResult::Scalar(Value::Float(3.0))), "3.0");
    }

    #[test]
    fn test_non_finite_float_degrades() {
        assert!(format_float(f64::NAN).is_err());
        assert_eq!(
            format_float(f64::INFINITY),
            Err(FormatError::NonFinite(f64::INFINITY))
        );
        assert_eq!(normalize(&RawResult::Scalar(Value::Float(f64::INFINITY))), "inf");
    }

    #[test]
    fn test_no_data() {
        assert_eq!(normalize(&RawResult::Empty), NO_DATA);
        assert_eq!(normalize(&RawResult::Scalar(Value::Null)), NO_DATA);
        assert_eq!(normalize(&rows(&["a", "b"], vec![])), NO_DATA);
    }

    #[test]
    fn test_rows_use_first_row() {
        let single = rows(&["n"], vec![vec![Value::Int(5000)], vec![Value::Int(1)]]);
        assert_eq!(normalize(&single), "5 000");

        let wide = rows(
            &["creator_id", "n"],
            vec![vec![Value::Text("abc".to_string()), Value::Int(3)]],
        );
        assert_eq!(normalize(&wide), "abc, 3");
    }

    #[test]
    fn test_text_passes_through() {
        let text = RawResult::Scalar(Value::Text("hello".to_string()));
        assert_eq!(normalize(&text), "hello");
    }
}
