use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase ASCII identifier: accents stripped, every run of other
/// characters collapsed to a single `_`, no leading or trailing `_`.
pub fn slugify(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_separator = false;
    for ch in folded.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// Indicator identity: `<category>__<source>__<theme>`, each part slugified.
pub fn build_indicator_id(category: &str, source: &str, theme: &str) -> String {
    format!(
        "{}__{}__{}",
        slugify(category),
        slugify(source),
        slugify(theme)
    )
}

fn forbidden_filename_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("static pattern"))
}

/// Make a label usable as a file or directory name on every platform.
pub fn safe_filename(name: &str) -> String {
    let replaced = forbidden_filename_chars().replace_all(name.trim(), "_");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "_".to_string()
    } else {
        collapsed
    }
}

const UNIT_SUFFIXES: &[(&str, &str)] = &[
    ("%", "perc"),
    ("percent", "perc"),
    ("porcentagem", "perc"),
    ("ha", "ha"),
    ("hectare", "ha"),
    ("hectares", "ha"),
    ("km2", "km2"),
    ("m2", "m2"),
    ("r$", "rs"),
    ("rs", "rs"),
    ("reais", "rs"),
    ("pessoas", "pessoas"),
    ("pessoa", "pessoas"),
];

const SUFFIX_LABELS: &[(&str, &str)] = &[
    ("perc", "%"),
    ("ha", "ha"),
    ("km2", "km²"),
    ("m2", "m²"),
    ("rs", "R$"),
    ("pessoas", "pessoas"),
];

fn known_suffix(unit: &str) -> String {
    UNIT_SUFFIXES
        .iter()
        .find(|(raw, _)| *raw == unit)
        .map(|(_, suffix)| suffix.to_string())
        .unwrap_or_else(|| slugify(unit))
}

/// Column-name suffix for a unit written in parentheses, e.g. `R$/ha` -> `rs_por_ha`.
/// Units outside the table are slugified verbatim.
pub fn unit_to_suffix(raw: &str) -> String {
    let unit: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| if ch == '²' { '2' } else { ch })
        .collect();
    if unit.is_empty() {
        return String::new();
    }

    match unit.split_once('/') {
        Some((left, right)) => format!("{}_por_{}", known_suffix(left), known_suffix(right))
            .trim_matches('_')
            .to_string(),
        None => known_suffix(&unit),
    }
}

/// Display unit for a canonical suffix (`perc` -> `%`), if the suffix is known.
pub fn unit_label_for_suffix(suffix: &str) -> Option<&'static str> {
    SUFFIX_LABELS
        .iter()
        .find(|(known, _)| *known == suffix)
        .map(|(_, label)| *label)
}

/// Display unit inferred from the last `_` segment of a variable name.
pub fn unit_label_for_variable(variable: &str) -> Option<&'static str> {
    let lowered = variable.trim().to_lowercase();
    let suffix = lowered.rsplit('_').next().unwrap_or("");
    unit_label_for_suffix(suffix)
}
