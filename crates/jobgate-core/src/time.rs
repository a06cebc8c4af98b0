//! Timestamp normalization for job-lifecycle bookkeeping.
//!
//! Job timestamps reach the gateway in several encodings: numeric strings,
//! calendar date-time strings, integer milliseconds, floating seconds and
//! native date-time values. [`normalize_timestamp`] converts all of them to
//! canonical epoch seconds (`f64`).
//!
//! Numeric strings are read asymmetrically: a string containing a `.` is
//! epoch seconds, a string of digits only is epoch milliseconds.

use std::fmt;

use time::format_description::well_known::{Iso8601, Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::error::{CoreError, Result};

/// A time value in one of the accepted source representations.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampInput {
    /// Booleans are never valid timestamps.
    Bool(bool),
    /// Numeric or calendar date-time string.
    Text(String),
    /// Epoch milliseconds.
    Millis(i64),
    /// Epoch seconds.
    Seconds(f64),
    /// Native date-time value.
    DateTime(OffsetDateTime),
    /// A value of a type that has no timestamp reading (null, list, map).
    Unsupported(&'static str),
}

impl fmt::Display for TimestampInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::Millis(ms) => write!(f, "{ms}"),
            Self::Seconds(s) => write!(f, "{s}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Unsupported(kind) => f.write_str(kind),
        }
    }
}

impl From<&str> for TimestampInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TimestampInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for TimestampInput {
    fn from(value: i64) -> Self {
        Self::Millis(value)
    }
}

impl From<f64> for TimestampInput {
    fn from(value: f64) -> Self {
        Self::Seconds(value)
    }
}

impl From<bool> for TimestampInput {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<OffsetDateTime> for TimestampInput {
    fn from(value: OffsetDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<serde_json::Value> for TimestampInput {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) => Self::Text(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Millis(i)
                } else if n.is_u64() {
                    Self::Unsupported("integer out of range")
                } else {
                    n.as_f64().map_or(Self::Unsupported("number"), Self::Seconds)
                }
            }
            Value::Null => Self::Unsupported("null"),
            Value::Array(_) => Self::Unsupported("array"),
            Value::Object(_) => Self::Unsupported("object"),
        }
    }
}

/// Convert `input` to epoch seconds.
///
/// On failure, `assign_default_on_failure` selects between logging the
/// problem and returning the current time, or returning
/// [`CoreError::Normalization`] carrying the offending input.
pub fn normalize_timestamp(
    input: impl Into<TimestampInput>,
    assign_default_on_failure: bool,
) -> Result<f64> {
    let input = input.into();
    match convert(&input) {
        Ok(seconds) => Ok(seconds),
        Err(reason) if assign_default_on_failure => {
            tracing::info!(
                input = %input,
                reason = %reason,
                "Cannot convert time input into timestamp, using current time"
            );
            Ok(now_epoch_seconds())
        }
        Err(reason) => Err(CoreError::normalization(input.to_string(), reason)),
    }
}

/// Current wall-clock time as epoch seconds.
pub fn now_epoch_seconds() -> f64 {
    datetime_to_seconds(OffsetDateTime::now_utc())
}

/// Calendar years a normalized timestamp may fall in.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Convert epoch seconds back into a date-time, if representable.
///
/// Only years 1 through 9999 are accepted.
pub fn from_epoch_seconds(seconds: f64) -> Result<OffsetDateTime> {
    if !seconds.is_finite() {
        return Err(CoreError::normalization(
            seconds.to_string(),
            "value is not finite",
        ));
    }
    let nanos = (seconds * 1_000_000_000.0).round() as i128;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|e| CoreError::normalization(seconds.to_string(), e.to_string()))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&dt.year()) {
        return Err(CoreError::normalization(
            seconds.to_string(),
            format!("year {} is out of range", dt.year()),
        ));
    }
    Ok(dt)
}

fn convert(input: &TimestampInput) -> std::result::Result<f64, String> {
    let seconds = match input {
        TimestampInput::Bool(_) => return Err("boolean is not a timestamp".to_string()),
        TimestampInput::Text(text) => convert_text(text)?,
        TimestampInput::Millis(ms) => *ms as f64 / 1000.0,
        TimestampInput::Seconds(s) => *s,
        TimestampInput::DateTime(dt) => datetime_to_seconds(*dt),
        TimestampInput::Unsupported(kind) => return Err(format!("{kind} is not a timestamp")),
    };

    from_epoch_seconds(seconds).map_err(|e| match e {
        CoreError::Normalization { reason, .. } => reason,
        other => other.to_string(),
    })?;
    Ok(seconds)
}

fn convert_text(text: &str) -> std::result::Result<f64, String> {
    if is_numeric_text(text) {
        if text.contains('.') {
            text.parse::<f64>().map_err(|e| e.to_string())
        } else {
            text.parse::<i64>()
                .map(|ms| ms as f64 / 1000.0)
                .map_err(|e| e.to_string())
        }
    } else {
        parse_calendar(text)
            .map(datetime_to_seconds)
            .ok_or_else(|| "unrecognized date-time format".to_string())
    }
}

/// Digits only, after removing at most one `.`.
fn is_numeric_text(text: &str) -> bool {
    let stripped = text.replacen('.', "", 1);
    !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit())
}

fn datetime_to_seconds(dt: OffsetDateTime) -> f64 {
    dt.unix_timestamp() as f64 + f64::from(dt.nanosecond()) / 1_000_000_000.0
}

/// Permissive calendar parsing. Values without an offset are read as UTC.
fn parse_calendar(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(text, &Rfc2822))
        .or_else(|_| OffsetDateTime::parse(text, &Iso8601::DEFAULT))
        .or_else(|_| {
            OffsetDateTime::parse(
                text,
                format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
                ),
            )
        })
        .or_else(|_| {
            OffsetDateTime::parse(
                text,
                format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
                ),
            )
        })
        .ok()
        .or_else(|| parse_naive(text).map(PrimitiveDateTime::assume_utc))
        .or_else(|| parse_date(text).map(|d| d.midnight().assume_utc()))
}

fn parse_naive(text: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        text,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day] [hour]:[minute]"))
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
        )
    })
    .ok()
}

fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .or_else(|_| Date::parse(text, format_description!("[year]/[month]/[day]")))
        .ok()
}
