//! Text tables: delimited-file reading with encoding and delimiter detection,
//! delimited and spreadsheet writing, and the column operations the stages share.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rust_xlsxwriter::Workbook;

use crate::error::{PipelineError, Result};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
pub const DELIMITER_CANDIDATES: [u8; 3] = [b';', b',', b'\t'];
pub const DEFAULT_DELIMITER: u8 = b';';

const XLSX_MAX_ROWS: usize = 1_048_576;
const XLSX_MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Decode as UTF-8 (BOM stripped), falling back to Latin-1, which accepts any byte.
pub fn decode_bytes(bytes: &[u8]) -> (String, TextEncoding) {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => (body.iter().map(|&b| char::from(b)).collect(), TextEncoding::Latin1),
    }
}

/// Drop a leading `sep=<char>` line written by spreadsheet tools.
pub fn strip_separator_hint(text: &str) -> &str {
    let first_line = text.lines().next().unwrap_or("");
    let is_hint = first_line
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sep="));
    if !is_hint {
        return text;
    }
    match text.find('\n') {
        Some(end) => &text[end + 1..],
        None => "",
    }
}

/// Most frequent candidate delimiter on the header line; ties go to the
/// earlier candidate and a header without any candidate uses `;`.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let mut best = DEFAULT_DELIMITER;
    let mut best_count = 0usize;
    for candidate in DELIMITER_CANDIDATES {
        let count = header.bytes().filter(|&b| b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// In-memory table of text cells. Every row has `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map_or("", String::as_str))
    }

    /// Cell of `row` under column `name`, or `""`.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.column_index(name)
            .and_then(|index| row.get(index))
            .map_or("", String::as_str)
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Set `name` to `value` on every row, adding the column if needed.
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        match self.column_index(name) {
            Some(index) => {
                for row in &mut self.rows {
                    row[index] = value.to_string();
                }
            }
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.to_string());
                }
            }
        }
    }

    /// Add or overwrite column `name` with one computed value per row.
    pub fn set_column_with(&mut self, name: &str, mut compute: impl FnMut(&[String]) -> String) {
        let values: Vec<String> = self.rows.iter().map(|row| compute(row)).collect();
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
    }

    pub fn retain_rows(&mut self, keep: impl FnMut(&Vec<String>) -> bool) {
        self.rows.retain(keep);
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|header| !names.contains(&header.as_str()))
            .collect();
        self.project(|index| keep[index]);
    }

    /// Move the listed columns (those present) to the front, in the given order.
    pub fn reorder_first(&mut self, first: &[&str]) {
        let mut order: Vec<usize> = first
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        let leading: HashSet<usize> = order.iter().copied().collect();
        order.extend((0..self.width()).filter(|index| !leading.contains(index)));

        self.headers = order.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&i| std::mem::take(&mut row[i])).collect();
        }
    }

    fn project(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let kept: Vec<usize> = (0..self.width()).filter(|&i| keep(i)).collect();
        self.headers = kept.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = kept.iter().map(|&i| std::mem::take(&mut row[i])).collect();
        }
    }

    /// Suffix repeated labels with `_2`, `_3`, ... keeping the first as is.
    pub fn dedupe_headers(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        for header in &mut self.headers {
            if seen.insert(header.clone()) {
                continue;
            }
            let mut n = 2;
            while seen.contains(&format!("{header}_{n}")) {
                n += 1;
            }
            *header = format!("{header}_{n}");
            seen.insert(header.clone());
        }
    }

    /// Stack tables; the result has the union of columns in first-seen order
    /// and missing cells are empty.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut headers: Vec<String> = Vec::new();
        for table in &tables {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }
        let mut combined = Table::new(headers);
        for table in tables {
            let positions: Vec<usize> = table
                .headers
                .iter()
                .map(|h| combined.column_index(h).unwrap_or_default())
                .collect();
            for row in table.rows {
                let mut out = vec![String::new(); combined.width()];
                for (cell, &target) in row.into_iter().zip(&positions) {
                    out[target] = cell;
                }
                combined.rows.push(out);
            }
        }
        combined
    }
}

/// Parse delimited text. Blank header labels become `Unnamed: <i>` and repeated
/// labels get `.1`, `.2`; short rows are padded, long rows are an error.
pub fn parse_table(text: &str, delimiter: u8) -> std::result::Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let raw_headers = reader.headers().map_err(|err| err.to_string())?.clone();
    if raw_headers.is_empty() || (raw_headers.len() == 1 && raw_headers[0].trim().is_empty()) {
        return Err("no columns to parse from file".to_string());
    }

    let mut headers: Vec<String> = Vec::with_capacity(raw_headers.len());
    for (index, label) in raw_headers.iter().enumerate() {
        let label = label.trim_start_matches('\u{feff}').trim();
        let mut name = if label.is_empty() {
            format!("Unnamed: {index}")
        } else {
            label.to_string()
        };
        let base = name.clone();
        let mut n = 1;
        while headers.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        headers.push(name);
    }

    let width = headers.len();
    let mut table = Table::new(headers);
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| err.to_string())?;
        if record.len() > width {
            return Err(format!(
                "expected {width} fields in data row {}, saw {}",
                line + 1,
                record.len()
            ));
        }
        table.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

/// A delimited file read with detection.
#[derive(Debug, Clone)]
pub struct DelimitedFile {
    pub table: Table,
    pub encoding: TextEncoding,
    pub delimiter: u8,
}

/// Read a delimited file of unknown encoding and delimiter.
pub fn read_delimited_detailed(path: impl AsRef<Path>) -> Result<DelimitedFile> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| PipelineError::io(path, err))?;
    let (text, encoding) = decode_bytes(&bytes);
    let body = strip_separator_hint(&text);
    let delimiter = detect_delimiter(body);
    let table = parse_table(body, delimiter).map_err(|message| PipelineError::Malformed {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(DelimitedFile {
        table,
        encoding,
        delimiter,
    })
}

pub fn read_delimited(path: impl AsRef<Path>) -> Result<Table> {
    read_delimited_detailed(path).map(|file| file.table)
}

/// Read a file written by this crate (known delimiter).
pub fn read_table(path: impl AsRef<Path>, delimiter: u8) -> Result<Table> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| PipelineError::io(path, err))?;
    let (text, _) = decode_bytes(&bytes);
    parse_table(&text, delimiter).map_err(|message| PipelineError::Malformed {
        path: path.to_path_buf(),
        message,
    })
}

fn open_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| PipelineError::io(path, err))?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

fn lossy_headers(reader: &mut csv::Reader<BufReader<File>>, path: &Path) -> Result<Vec<String>> {
    let headers = reader
        .byte_headers()
        .map_err(|err| PipelineError::csv(path, err))?;
    Ok(headers
        .iter()
        .map(|raw| {
            String::from_utf8_lossy(raw)
                .trim_start_matches('\u{feff}')
                .to_string()
        })
        .collect())
}

/// Header row only; the body is never read.
pub fn read_headers(path: impl AsRef<Path>, delimiter: u8) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = open_reader(path, delimiter)?;
    lossy_headers(&mut reader, path)
}

/// Values of one column, streamed; `None` when the column does not exist.
pub fn read_column(
    path: impl AsRef<Path>,
    delimiter: u8,
    name: &str,
) -> Result<Option<Vec<String>>> {
    let path = path.as_ref();
    let mut reader = open_reader(path, delimiter)?;
    let headers = lossy_headers(&mut reader, path)?;
    let Some(index) = headers.iter().position(|header| header == name) else {
        return Ok(None);
    };

    let mut values = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .map_err(|err| PipelineError::csv(path, err))?
    {
        let value = record
            .get(index)
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .unwrap_or_default();
        values.push(value);
    }
    Ok(Some(values))
}

/// Write `table` as delimited UTF-8 text, optionally with a BOM.
pub fn write_table(path: impl AsRef<Path>, table: &Table, delimiter: u8, bom: bool) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }
    let file = File::create(path).map_err(|err| PipelineError::io(path, err))?;
    let mut buffered = BufWriter::new(file);
    if bom {
        buffered
            .write_all(UTF8_BOM)
            .map_err(|err| PipelineError::io(path, err))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(buffered);
    writer
        .write_record(&table.headers)
        .map_err(|err| PipelineError::csv(path, err))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|err| PipelineError::csv(path, err))?;
    }
    writer.flush().map_err(|err| PipelineError::io(path, err))?;
    Ok(())
}

/// Plain decimal cells are written as numbers; integers with leading zeros
/// (codes) stay text.
fn spreadsheet_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed != cell {
        return None;
    }
    let digits = trimmed.trim_start_matches('-');
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return None;
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Write `table` as a single-sheet `.xlsx` workbook. Cells under
/// `text_columns` are always written as strings.
pub fn write_workbook(path: impl AsRef<Path>, table: &Table, text_columns: &[&str]) -> Result<()> {
    let path = path.as_ref();
    let spreadsheet_error = |message: String| PipelineError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };
    if table.len() + 1 > XLSX_MAX_ROWS || table.width() > XLSX_MAX_COLUMNS {
        return Err(spreadsheet_error(format!(
            "{} rows x {} columns exceeds the worksheet limit",
            table.len(),
            table.width()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }

    let text_only: Vec<bool> = table
        .headers
        .iter()
        .map(|header| text_columns.contains(&header.as_str()))
        .collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in table.headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, header.as_str())
            .map_err(|e| spreadsheet_error(e.to_string()))?;
    }
    for (row_index, row) in table.rows.iter().enumerate() {
        let excel_row = (row_index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let number = if text_only.get(col).copied().unwrap_or(false) {
                None
            } else {
                spreadsheet_number(cell)
            };
            let written = match number {
                Some(number) => sheet.write_number(excel_row, col as u16, number).map(|_| ()),
                None => sheet
                    .write_string(excel_row, col as u16, cell.as_str())
                    .map(|_| ()),
            };
            written.map_err(|e| spreadsheet_error(e.to_string()))?;
        }
    }
    workbook
        .save(path)
        .map_err(|e| spreadsheet_error(e.to_string()))
}
