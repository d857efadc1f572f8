use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::ingest::filename::{category_for, parse_filename_parts, FilenameParts};
use crate::normalize::{normalize_column_name, SynonymDictionary};
use crate::table::{read_delimited_detailed, Table};

/// One raw input file with the metadata derived from its location and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub path: PathBuf,
    pub file_name: String,
    pub category: String,
    pub parts: FilenameParts,
}

impl RawFile {
    pub fn from_path(root: &Path, path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            category: category_for(root, path),
            parts: parse_filename_parts(&file_name),
            file_name,
            path: path.to_path_buf(),
        }
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Every `.csv` file under `root`, in lexicographic path order.
pub fn discover_raw_files(root: &Path) -> Vec<RawFile> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_csv(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|path| RawFile::from_path(root, path))
        .collect()
}

/// Read a raw file and canonicalize its column names.
///
/// The error is the reason recorded in the read-error report.
pub fn read_raw_table(raw: &RawFile, dictionary: &SynonymDictionary) -> Result<Table, String> {
    let file = read_delimited_detailed(&raw.path).map_err(|err| err.to_string())?;
    debug!(
        file = %raw.path.display(),
        encoding = ?file.encoding,
        delimiter = %char::from(file.delimiter),
        rows = file.table.len(),
        "raw file parsed"
    );

    let mut table = file.table;
    table.headers = table
        .headers
        .iter()
        .map(|label| normalize_column_name(label, dictionary))
        .collect();
    table.dedupe_headers();
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovery_is_sorted_and_only_picks_csv_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("Social")).expect("mkdir");
        fs::create_dir_all(root.join("Ambiental")).expect("mkdir");
        fs::write(root.join("Social/IBGE - Renda.csv"), "a\n").expect("write");
        fs::write(root.join("Ambiental/INPE - Fogo.csv"), "a\n").expect("write");
        fs::write(root.join("Ambiental/notas.txt"), "x").expect("write");
        fs::write(root.join("Solto.csv"), "a\n").expect("write");

        let files = discover_raw_files(root);
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["INPE - Fogo.csv", "IBGE - Renda.csv", "Solto.csv"]);
        assert_eq!(files[0].category, "Ambiental");
        assert_eq!(files[0].parts.theme, "Fogo");
        assert_eq!(files[2].category, "(raiz)");
    }

    #[test]
    fn raw_headers_are_normalized_and_deduplicated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("IBGE - Área - PA.csv");
        fs::write(&path, "Código do Município;Área (ha);area_ha\n1500602;10;11\n").expect("write");

        let raw = RawFile::from_path(dir.path(), &path);
        let table = read_raw_table(&raw, &SynonymDictionary::default()).expect("reads");
        assert_eq!(table.headers, vec!["codigo_do_municipio", "area_ha", "area_ha_2"]);
    }

    #[test]
    fn unparseable_file_reports_a_reason() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quebrado.csv");
        fs::write(&path, "a;b\n1;2;3;4\n").expect("write");
        let raw = RawFile::from_path(dir.path(), &path);
        let reason = read_raw_table(&raw, &SynonymDictionary::default()).unwrap_err();
        assert!(reason.contains("expected 2 fields"), "{reason}");
    }
}
