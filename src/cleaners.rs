/*!
 * Field cleaners
 *
 * Pure per-column transforms. Every cleaner maps each value independently and
 * preserves row order, so a column can be cleaned on a rayon pool without
 * changing the result. Values that cannot be cleaned become `Value::Null`;
 * nothing here returns an error.
 */

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::table::Value;
use crate::constants::{STATUS_CANCELLED, STATUS_CONFIRMED, STATUS_MISSING};

lazy_static! {
    static ref NON_ID_CHARS: Regex = Regex::new(r"[^0-9.]").unwrap();
    static ref NON_DATE_CHARS: Regex = Regex::new(r"[^0-9/-]").unwrap();
    static ref ISO_DASHED: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref ISO_SLASHED: Regex = Regex::new(r"^\d{4}/\d{2}/\d{2}$").unwrap();
    static ref DAY_FIRST_DASHED: Regex = Regex::new(r"^\d{2}-\d{2}-\d{4}$").unwrap();
    static ref MONTH_FIRST_SLASHED: Regex = Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap();
}

/// Apply `f` to every value, in parallel when the `parallel` feature is on
fn map_values<F>(values: &[Value], f: F) -> Vec<Value>
where
    F: Fn(&Value) -> Value + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let mapped: Vec<Value> = values.par_iter().map(f).collect();

    #[cfg(not(feature = "parallel"))]
    let mapped: Vec<Value> = values.iter().map(f).collect();

    mapped
}

/// Count values that were present on input but null after cleaning
pub fn degraded_count(before: &[Value], after: &[Value]) -> usize {
    before
        .iter()
        .zip(after)
        .filter(|(b, a)| !b.is_null() && a.is_null())
        .count()
}

/// Truncate a float toward zero, rejecting values with no i64 equivalent
fn truncate_float(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    // i64::MAX is not exactly representable; 2^63 is the first float out of range
    if t >= -(2f64.powi(63)) && t < 2f64.powi(63) {
        Some(t as i64)
    } else {
        None
    }
}

/// Coerce one value to an integer identifier
///
/// Integers pass through, floats truncate toward zero (`2.9` becomes `2`), and
/// text is reduced to its digits and decimal points before parsing. A sign is
/// not a digit, so `"-3.2"` yields `3`.
pub fn clean_id(value: &Value) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::Int(i) => Some(*i),
        Value::Float(f) => truncate_float(*f),
        Value::Text(s) => {
            let stripped = NON_ID_CHARS.replace_all(s.trim(), "");
            if stripped.is_empty() {
                return None;
            }
            stripped.parse::<f64>().ok().and_then(truncate_float)
        }
        Value::DateTime(_) | Value::Bool(_) => None,
    }
}

/// Clean a whole identifier column
pub fn clean_id_column(values: &[Value]) -> Vec<Value> {
    map_values(values, |v| Value::from(clean_id(v)))
}

/// Parse a date at midnight, keeping only days a nanosecond timestamp can hold
fn parse_with(text: &str, format: &str) -> Option<NaiveDateTime> {
    // 1677-09-21 and 2262-04-11 are only partly representable, so the
    // first and last whole days are the bounds
    let earliest = NaiveDate::from_ymd_opt(1677, 9, 22)?;
    let latest = NaiveDate::from_ymd_opt(2262, 4, 11)?;

    NaiveDate::parse_from_str(text, format)
        .ok()
        .filter(|d| (earliest..=latest).contains(d))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a dirty date string
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `MM/DD/YYYY` after stripping every
/// character other than digits, `/` and `-`. A `DD-MM-YYYY`-shaped value has
/// its dashes replaced with slashes and is then read month-first, so
/// `05-11-2023` is May 11.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let stripped = NON_DATE_CHARS.replace_all(raw.trim(), "");
    if stripped.is_empty() {
        return None;
    }

    if ISO_DASHED.is_match(&stripped) {
        return parse_with(&stripped, "%Y-%m-%d");
    }

    if ISO_SLASHED.is_match(&stripped) {
        return parse_with(&stripped, "%Y/%m/%d");
    }

    let candidate = if DAY_FIRST_DASHED.is_match(&stripped) {
        stripped.replace('-', "/")
    } else {
        stripped.into_owned()
    };

    if MONTH_FIRST_SLASHED.is_match(&candidate) {
        return parse_with(&candidate, "%m/%d/%Y");
    }

    None
}

/// Clean one date value
pub fn clean_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Null => None,
        Value::DateTime(dt) => Some(*dt),
        Value::Float(f) if f.is_nan() => None,
        other => parse_date(&other.to_string()),
    }
}

/// Clean a whole date column
pub fn clean_date_column(values: &[Value]) -> Vec<Value> {
    map_values(values, |v| Value::from(clean_date(v)))
}

/// Map free-text status onto the controlled vocabulary
///
/// Lowercases, keeps only `a`-`z`, then rewrites anything starting with
/// `cancel` to `cancelled` and anything starting with `confirm` to
/// `confirmed`. Other statuses pass through in their letters-only form.
pub fn normalize_status(raw: &str) -> String {
    let letters: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();

    if letters.starts_with("cancel") {
        STATUS_CANCELLED.to_string()
    } else if letters.starts_with("confirm") {
        STATUS_CONFIRMED.to_string()
    } else {
        letters
    }
}

/// Normalize a whole status column
///
/// A missing status is stored as the text `nan`, the same token a
/// string-converted NaN produces upstream.
pub fn normalize_status_column(values: &[Value]) -> Vec<Value> {
    map_values(values, |v| {
        if v.is_null() {
            Value::from(STATUS_MISSING)
        } else {
            Value::Text(normalize_status(&v.to_string()))
        }
    })
}

/// Normalize a whole status column, leaving missing statuses null
pub fn normalize_status_column_keep_null(values: &[Value]) -> Vec<Value> {
    map_values(values, |v| {
        if v.is_null() {
            Value::Null
        } else {
            Value::Text(normalize_status(&v.to_string()))
        }
    })
}
