//! Numeric interpretation of text cells.
//!
//! Values arrive in Brazilian notation (`1.234,56`, `12,5%`) as often as in
//! plain decimal notation. A lone cell tries the plain form first and then the
//! localized one; a column picks one [`Notation`] for all of its cells.

/// Cell texts treated as missing, besides blanks.
const MISSING_TOKENS: [&str; 12] = [
    "na", "n/a", "nan", "-nan", "null", "none", "<na>", "#n/a", "#n/a n/a", "-1.#ind", "1.#qnan", "#na",
];

pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed.to_lowercase().as_str())
}

fn plain_numeric_shape(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
}

/// Parse a decimal in plain (`1234.56`, `1e3`) or localized (`1.234,56`,
/// `12,5 %`) notation. Blanks, missing markers and non-finite results are `None`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return None;
    }
    if plain_numeric_shape(trimmed) {
        if let Ok(value) = trimmed.parse::<f64>() {
            return Some(value).filter(|v| v.is_finite());
        }
    }
    parse_localized(trimmed)
}

/// `.` groups thousands and `,` marks the decimals.
fn parse_localized(trimmed: &str) -> Option<f64> {
    let localized: String = trimmed
        .chars()
        .filter(|ch| *ch != '.' && *ch != '%' && !ch.is_whitespace())
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect();
    if !plain_numeric_shape(&localized) {
        return None;
    }
    localized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `1.234.567`: two or more three-digit groups after the leading one.
fn has_repeated_thousand_groups(text: &str) -> bool {
    let digits = text.trim_start_matches(['-', '+']);
    let mut groups = digits.split('.');
    let lead_ok = groups
        .next()
        .is_some_and(|lead| (1..=3).contains(&lead.len()) && lead.bytes().all(|b| b.is_ascii_digit()));
    let rest: Vec<&str> = groups.collect();
    lead_ok
        && rest.len() >= 2
        && rest
            .iter()
            .all(|group| group.len() == 3 && group.bytes().all(|b| b.is_ascii_digit()))
}

/// Number notation shared by every cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    Plain,
    Localized,
}

impl Notation {
    /// Localized as soon as one present cell has a decimal comma or repeated
    /// thousand groups, so `12.345` and `1.234.567` agree within a column.
    pub fn detect<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let localized = cells
            .into_iter()
            .map(str::trim)
            .filter(|cell| !is_missing(cell))
            .any(|cell| cell.contains(',') || has_repeated_thousand_groups(cell));
        if localized {
            Notation::Localized
        } else {
            Notation::Plain
        }
    }

    pub fn parse(self, raw: &str) -> Option<f64> {
        match self {
            Notation::Plain => parse_decimal(raw),
            Notation::Localized => {
                let trimmed = raw.trim();
                if is_missing(trimmed) {
                    return None;
                }
                parse_localized(trimmed)
            }
        }
    }
}

/// Whole number, or `None` when the cell is missing or has a fractional part.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let value = parse_decimal(raw)?;
    if value.fract() != 0.0 || value.abs() >= 9.0e15 {
        return None;
    }
    Some(value as i64)
}

/// Text form of a parsed value; integral values carry no decimal point.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

/// A column holds values when more than half of its non-missing cells parse
/// as decimals in the column's notation. A column with no data at all is not
/// a value column.
pub fn is_value_column<'a>(cells: impl IntoIterator<Item = &'a str>) -> bool {
    let cells: Vec<&str> = cells.into_iter().collect();
    let notation = Notation::detect(cells.iter().copied());
    let mut present = 0usize;
    let mut numeric = 0usize;
    for cell in cells {
        if is_missing(cell) {
            continue;
        }
        present += 1;
        if notation.parse(cell).is_some() {
            numeric += 1;
        }
    }
    present > 0 && numeric * 2 > present
}
