// Utility helpers for parsing cell values and formatting numbers.
//
// This module centralizes the "dirty" spreadsheet string handling so the
// loader can hand typed values to the rest of the code.
use crate::error::{Field, FieldError};
use crate::types::{Cell, DateCode};
use num_format::{Locale, ToFormattedString};

/// Parse a `Week-Day` token such as `"12-3"`.
///
/// - Rejects empty tokens and anything that is not exactly two `-` parts
///   with `FieldError::Format`.
/// - Each part is trimmed and must be an integer; week must be 1-52 and day
///   1-7, otherwise `FieldError::Range`.
pub fn parse_week_day(value: &str) -> Result<DateCode, FieldError> {
    let format_err = || FieldError::Format {
        value: value.to_string(),
    };
    if value.is_empty() {
        return Err(format_err());
    }
    let parts: Vec<&str> = value.split('-').collect();
    let [week_str, day_str] = parts.as_slice() else {
        return Err(format_err());
    };
    let range_err = || FieldError::Range {
        week: week_str.trim().to_string(),
        day: day_str.trim().to_string(),
    };

    let week: u32 = week_str.trim().parse().map_err(|_| range_err())?;
    let day: u32 = day_str.trim().parse().map_err(|_| range_err())?;
    if !(1..=52).contains(&week) || !(1..=7).contains(&day) {
        return Err(range_err());
    }
    Ok(DateCode {
        week,
        day,
        formatted: format!("Week {week}, Day {day}"),
    })
}

/// Bays count: missing is 0, otherwise a finite, non-negative number.
pub fn parse_count(cell: &Cell, field: Field) -> Result<f64, FieldError> {
    let value = match cell {
        Cell::Number(n) => Some(*n),
        other => match other.as_text() {
            None => return Ok(0.0),
            Some(s) => s.parse::<f64>().ok(),
        },
    };
    check_non_negative(value, cell, field)
}

/// Currency amount: missing is 0; text may carry a leading `$` and
/// surrounding whitespace. Thousands separators are not accepted.
pub fn parse_amount(cell: &Cell, field: Field) -> Result<f64, FieldError> {
    let value = match cell {
        Cell::Number(n) => Some(*n),
        other => match other.as_text() {
            None => return Ok(0.0),
            Some(s) => {
                let s = s.strip_prefix('$').unwrap_or(s.as_str()).trim();
                s.parse::<f64>().ok()
            }
        },
    };
    check_non_negative(value, cell, field)
}

fn check_non_negative(value: Option<f64>, cell: &Cell, field: Field) -> Result<f64, FieldError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(FieldError::InvalidField {
            field,
            value: cell.as_text().unwrap_or_default(),
        }),
    }
}

/// Round to 2 decimal places, as shown for currency.
pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators
    // (e.g. `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_money(n: f64) -> String {
    let s = format_number(n, 2);
    match s.strip_prefix('-') {
        Some(abs) => format!("-${abs}"),
        None => format!("${s}"),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
