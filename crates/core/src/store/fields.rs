//! Typed access to the fields of one record.
//!
//! Strict accessors return a [`FieldError`] on malformed input, which aborts
//! the whole table read. Lenient accessors substitute a fallback instead.

use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::errors::FieldError;

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A decoded record paired with its column names.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    values: &'a [String],
    columns: &'a [&'a str],
}

impl<'a> Fields<'a> {
    pub fn new(values: &'a [String], columns: &'a [&'a str]) -> Self {
        Self { values, columns }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn column(&self, index: usize) -> &str {
        self.columns.get(index).copied().unwrap_or("?")
    }

    fn error(&self, index: usize, reason: impl Into<String>) -> FieldError {
        FieldError::new(self.column(index), self.raw(index), reason)
    }

    /// The raw field, or `""` when the record is too short to have it.
    pub fn raw(&self, index: usize) -> &'a str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn text(&self, index: usize) -> String {
        self.raw(index).to_string()
    }

    /// `None` for a missing or blank field.
    pub fn optional(&self, index: usize) -> Option<String> {
        let value = self.raw(index);
        (!value.trim().is_empty()).then(|| value.to_string())
    }

    pub fn date_time(&self, index: usize) -> Result<NaiveDateTime, FieldError> {
        parse_date_time(self.raw(index)).ok_or_else(|| self.error(index, "expected ISO-8601 date-time"))
    }

    pub fn optional_date_time(&self, index: usize) -> Result<Option<NaiveDateTime>, FieldError> {
        if self.raw(index).is_empty() {
            return Ok(None);
        }
        self.date_time(index).map(Some)
    }

    /// An empty field means "now".
    pub fn date_time_or_now(&self, index: usize) -> Result<NaiveDateTime, FieldError> {
        Ok(self
            .optional_date_time(index)?
            .unwrap_or_else(|| Local::now().naive_local()))
    }

    pub fn optional_date(&self, index: usize) -> Result<Option<NaiveDate>, FieldError> {
        let raw = self.raw(index);
        if raw.is_empty() {
            return Ok(None);
        }
        parse_date(raw)
            .map(Some)
            .ok_or_else(|| self.error(index, "expected ISO-8601 date"))
    }

    /// An empty field reads as zero.
    pub fn int_or_zero(&self, index: usize) -> Result<i32, FieldError> {
        let raw = self.raw(index);
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse::<i32>()
            .map_err(|e| self.error(index, format!("expected integer: {e}")))
    }

    pub fn decimal(&self, index: usize) -> Result<Decimal, FieldError> {
        Decimal::from_str(self.raw(index))
            .map_err(|e| self.error(index, format!("expected decimal: {e}")))
    }

    /// `None` for an empty field; anything else must be a decimal.
    pub fn optional_decimal(&self, index: usize) -> Result<Option<Decimal>, FieldError> {
        if self.raw(index).is_empty() {
            return Ok(None);
        }
        self.decimal(index).map(Some)
    }

    /// A number, or `None` when blank or unparsable.
    pub fn lenient_f64(&self, index: usize) -> Option<f64> {
        self.raw(index).trim().parse::<f64>().ok()
    }

    /// Parse an enum value, failing on unknown names.
    pub fn parse<T: FromStr>(&self, index: usize) -> Result<T, FieldError> {
        self.raw(index)
            .parse::<T>()
            .map_err(|_| self.error(index, "unknown value"))
    }

    /// Parse an enum value, substituting `fallback` for unknown names.
    pub fn parse_or<T: FromStr>(&self, index: usize, fallback: T) -> T {
        self.raw(index).parse::<T>().unwrap_or(fallback)
    }
}

/// Parse the stored date-time forms (`YYYY-MM-DDTHH:MM[:SS[.f]]`). Every
/// component must be zero-padded to its full width.
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    if !is_iso_date_time(raw) {
        return None;
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse a stored `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if !matches_shape(raw, DATE_SHAPE) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

const DATE_SHAPE: &str = "dddd-dd-dd";
const MINUTE_SHAPE: &str = "dddd-dd-ddTdd:dd";

/// `d` stands for one ASCII digit, every other byte must match exactly.
fn matches_shape(raw: &str, shape: &str) -> bool {
    raw.len() == shape.len()
        && raw.bytes().zip(shape.bytes()).all(|(c, s)| match s {
            b'd' => c.is_ascii_digit(),
            _ => c == s,
        })
}

fn is_iso_date_time(raw: &str) -> bool {
    if raw.len() < MINUTE_SHAPE.len() || !raw.is_char_boundary(MINUTE_SHAPE.len()) {
        return false;
    }
    let (minutes, rest) = raw.split_at(MINUTE_SHAPE.len());
    if !matches_shape(minutes, MINUTE_SHAPE) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    let Some(seconds) = rest.strip_prefix(':') else {
        return false;
    };
    let (Some(secs), Some(fraction)) = (seconds.get(..2), seconds.get(2..)) else {
        return false;
    };
    if !matches_shape(secs, "dd") {
        return false;
    }
    match fraction.strip_prefix('.') {
        None => fraction.is_empty(),
        Some(digits) => (1..=9).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// Render an optional value as a field, `""` for `None`.
pub fn or_empty<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["id", "when", "count", "amount"];

    fn values(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_date_time_forms() {
        assert!(parse_date_time("2024-05-01T09:30").is_some());
        assert!(parse_date_time("2024-05-01T09:30:15").is_some());
        assert!(parse_date_time("2024-05-01T09:30:15.123456789").is_some());
        assert!(parse_date_time("2024-05-01 09:30").is_none());
        assert!(parse_date_time("01/05/2024").is_none());
    }

    #[test]
    fn test_unpadded_components_are_rejected() {
        assert!(parse_date("2024-05-01").is_some());
        assert!(parse_date("2024-5-1").is_none());
        assert!(parse_date("2024-05-01 ").is_none());
        assert!(parse_date_time("2024-5-1T9:30").is_none());
        assert!(parse_date_time("2024-05-01T9:30").is_none());
        assert!(parse_date_time("2024-05-01T09:30:5").is_none());
        assert!(parse_date_time("2024-05-01T09:30:15.").is_none());
        assert!(parse_date_time("2024-05-01T09:30:15.1234567890").is_none());
        assert!(parse_date_time("2024-05-01T09:30:15.5").is_some());

        let v = values(&["p1", "2024-5-1", "", ""]);
        let err = Fields::new(&v, COLUMNS).optional_date(1).unwrap_err();
        assert_eq!(err.column, "when");
        assert_eq!(err.value, "2024-5-1");
    }

    #[test]
    fn test_strict_date_time_names_column() {
        let v = values(&["a1", "tomorrow", "", ""]);
        let fields = Fields::new(&v, COLUMNS);
        let err = fields.date_time(1).unwrap_err();
        assert_eq!(err.column, "when");
        assert_eq!(err.value, "tomorrow");
    }

    #[test]
    fn test_empty_values() {
        let v = values(&["a1", "", "", ""]);
        let fields = Fields::new(&v, COLUMNS);
        assert_eq!(fields.optional_date_time(1).unwrap(), None);
        assert_eq!(fields.int_or_zero(2).unwrap(), 0);
        assert!(fields.decimal(3).is_err());
        assert_eq!(fields.optional(3), None);
    }

    #[test]
    fn test_missing_trailing_fields_read_as_empty() {
        let v = values(&["a1"]);
        let fields = Fields::new(&v, COLUMNS);
        assert_eq!(fields.raw(3), "");
        assert_eq!(fields.lenient_f64(3), None);
    }

    #[test]
    fn test_numbers() {
        let v = values(&["a1", "", "12", "188.00"]);
        let fields = Fields::new(&v, COLUMNS);
        assert_eq!(fields.int_or_zero(2).unwrap(), 12);
        assert_eq!(fields.decimal(3).unwrap().to_string(), "188.00");

        let v = values(&["a1", "", "twelve", "x"]);
        let fields = Fields::new(&v, COLUMNS);
        assert!(fields.int_or_zero(2).is_err());
        assert_eq!(fields.lenient_f64(3), None);
    }
}
