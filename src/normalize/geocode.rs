//! Municipality code normalization to the 7-digit IBGE form.

pub const GEOCODE_WIDTH: usize = 7;

/// A scalar that may hold a municipality code.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeValue<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
    Missing,
}

impl<'a> From<&'a str> for GeocodeValue<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for GeocodeValue<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value.as_str())
    }
}

impl From<i64> for GeocodeValue<'_> {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for GeocodeValue<'_> {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for GeocodeValue<'_> {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<'a, T: Into<GeocodeValue<'a>>> From<Option<T>> for GeocodeValue<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Normalize to exactly 7 digits, or `""` when the value cannot be a code.
///
/// Numbers are truncated to integers before any digit is read, so a code
/// stored as `1508159.0` stays `1508159`. Leading zeros are restored; more
/// than seven digits is not a code. Never panics.
pub fn normalize_geocode<'a>(value: impl Into<GeocodeValue<'a>>) -> String {
    let digits = match value.into() {
        GeocodeValue::Missing => return String::new(),
        GeocodeValue::Integer(number) => number.unsigned_abs().to_string(),
        GeocodeValue::Float(number) => match float_digits(number) {
            Some(digits) => digits,
            None => return String::new(),
        },
        GeocodeValue::Text(text) => text_digits(text),
    };

    if digits.is_empty() || digits.len() > GEOCODE_WIDTH {
        return String::new();
    }
    format!("{digits:0>width$}", width = GEOCODE_WIDTH)
}

fn float_digits(number: f64) -> Option<String> {
    if !number.is_finite() {
        return None;
    }
    let truncated = number.trunc().abs();
    if truncated >= 1e15 {
        return None;
    }
    Some((truncated as u64).to_string())
}

fn text_digits(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    // Numeric text ("1508159.0", "1.508159e6") goes through the numeric path.
    let numeric_shape = trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
        && trimmed.chars().any(|ch| ch.is_ascii_digit());
    if numeric_shape && trimmed.contains(['.', 'e', 'E']) {
        if let Ok(number) = trimmed.parse::<f64>() {
            return float_digits(number).unwrap_or_default();
        }
    }
    trimmed.chars().filter(char::is_ascii_digit).collect()
}
