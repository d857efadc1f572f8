use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Category given to files sitting directly under the raw root.
pub const ROOT_CATEGORY: &str = "(raiz)";

/// Metadata encoded in a raw file name: `"<source> - <theme> - <scope>.csv"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameParts {
    pub source: String,
    pub theme: String,
    pub scope: String,
}

fn padded_hyphen() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+-\s+").expect("static pattern"))
}

/// Split on hyphens with whitespace on both sides, at most three parts.
///
/// A hyphen inside a word ("Uso-do-solo") is never a separator. Everything
/// after the second separator stays in `scope`, and a name with a single part
/// uses it as both source and theme.
pub fn parse_filename_parts(file_name: &str) -> FilenameParts {
    let stem = if file_name.to_ascii_lowercase().ends_with(".csv") {
        &file_name[..file_name.len() - 4]
    } else {
        file_name
    };
    let parts: Vec<&str> = padded_hyphen()
        .splitn(stem.trim(), 3)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let source = parts.first().copied().unwrap_or_default().to_string();
    let theme = parts
        .get(1)
        .map_or_else(|| source.clone(), |theme| theme.to_string());
    let scope = parts.get(2).copied().unwrap_or_default().to_string();
    FilenameParts {
        source,
        theme,
        scope,
    }
}

/// First directory beneath `root`, or [`ROOT_CATEGORY`] for top-level files.
pub fn category_for(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return ROOT_CATEGORY.to_string();
    };
    let components: Vec<_> = relative.components().collect();
    if components.len() < 2 {
        return ROOT_CATEGORY.to_string();
    }
    components[0].as_os_str().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_part_names_split_into_source_theme_scope() {
        let parts = parse_filename_parts("IBGE - População residente - Municípios PA.csv");
        assert_eq!(parts.source, "IBGE");
        assert_eq!(parts.theme, "População residente");
        assert_eq!(parts.scope, "Municípios PA");
    }

    #[test]
    fn unpadded_hyphen_inside_theme_is_not_a_separator() {
        let parts = parse_filename_parts("MapBiomas - Uso-do-solo - 2010-2020.csv");
        assert_eq!(parts.source, "MapBiomas");
        assert_eq!(parts.theme, "Uso-do-solo");
        assert_eq!(parts.scope, "2010-2020");
    }

    #[test]
    fn scope_keeps_everything_after_the_second_separator() {
        let parts = parse_filename_parts("INPE - Desmatamento - Amazônia - série anual.CSV");
        assert_eq!(parts.theme, "Desmatamento");
        assert_eq!(parts.scope, "Amazônia - série anual");
    }

    #[test]
    fn single_part_name_reuses_source_as_theme() {
        let parts = parse_filename_parts("IDHM.csv");
        assert_eq!(parts.source, "IDHM");
        assert_eq!(parts.theme, "IDHM");
        assert_eq!(parts.scope, "");
    }

    #[test]
    fn category_is_first_directory_under_root() {
        let root = Path::new("/raw");
        assert_eq!(
            category_for(root, Path::new("/raw/Socioeconomia/sub/a.csv")),
            "Socioeconomia"
        );
        assert_eq!(category_for(root, Path::new("/raw/a.csv")), ROOT_CATEGORY);
    }
}
