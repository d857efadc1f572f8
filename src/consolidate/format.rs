//! Final physical format of a consolidated base. The streamed delimited file
//! is the intermediate for every format.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use flate2::write::GzEncoder;
use flate2::Compression;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info, warn};

use crate::config::OutputFormat;
use crate::consolidate::long::NUMERIC_COLUMN;
use crate::consolidate::value::{parse_decimal, parse_integer};
use crate::error::{PipelineError, Result};
use crate::table::UTF8_BOM;

const INTEGER_COLUMNS: [&str; 3] = ["ano", "mes", "territorio_id"];
const BATCH_ROWS: usize = 65_536;

/// Where a base ended up and in which format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalOutput {
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// `<intermediate>.gz` sibling, e.g. `base.csv` -> `base.csv.gz`.
pub fn gzip_path(intermediate: &Path) -> PathBuf {
    let mut name = intermediate.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Parquet path next to the intermediate (`base.csv` -> `base.parquet`).
pub fn parquet_path(intermediate: &Path) -> PathBuf {
    intermediate.with_extension("parquet")
}

pub fn gzip_file(source: &Path, target: &Path) -> Result<()> {
    let input = File::open(source).map_err(|err| PipelineError::io(source, err))?;
    let output = File::create(target).map_err(|err| PipelineError::io(target, err))?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut BufReader::new(input), &mut encoder).map_err(|err| PipelineError::io(target, err))?;
    encoder
        .finish()
        .and_then(|mut inner| io::Write::flush(&mut inner))
        .map_err(|err| PipelineError::io(target, err))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

fn column_kind(name: &str) -> ColumnKind {
    if INTEGER_COLUMNS.contains(&name) {
        ColumnKind::Integer
    } else if name == NUMERIC_COLUMN {
        ColumnKind::Float
    } else {
        ColumnKind::Text
    }
}

fn arrow_schema(headers: &[String]) -> SchemaRef {
    let fields: Vec<Field> = headers
        .iter()
        .map(|name| {
            let data_type = match column_kind(name) {
                ColumnKind::Integer => DataType::Int64,
                ColumnKind::Float => DataType::Float64,
                ColumnKind::Text => DataType::Utf8,
            };
            Field::new(name.as_str(), data_type, true)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

fn build_batch(schema: &SchemaRef, rows: &[csv::StringRecord]) -> std::result::Result<RecordBatch, String> {
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let cells = rows.iter().map(|row| row.get(index).unwrap_or("").trim());
            let array: ArrayRef = match column_kind(field.name()) {
                ColumnKind::Integer => {
                    let mut builder = Int64Builder::with_capacity(rows.len());
                    for cell in cells {
                        builder.append_option(parse_integer(cell));
                    }
                    Arc::new(builder.finish())
                }
                ColumnKind::Float => {
                    let mut builder = Float64Builder::with_capacity(rows.len());
                    for cell in cells {
                        builder.append_option(parse_decimal(cell));
                    }
                    Arc::new(builder.finish())
                }
                ColumnKind::Text => {
                    let mut builder = StringBuilder::new();
                    for cell in cells {
                        if cell.is_empty() {
                            builder.append_null();
                        } else {
                            builder.append_value(cell);
                        }
                    }
                    Arc::new(builder.finish())
                }
            };
            array
        })
        .collect();
    RecordBatch::try_new(schema.clone(), columns).map_err(|err| err.to_string())
}

/// Re-read the intermediate in batches and write a typed parquet file.
pub fn write_parquet_from_csv(source: &Path, target: &Path, separator: u8) -> Result<usize> {
    let parquet_error = |message: String| PipelineError::Parquet {
        path: target.to_path_buf(),
        message,
    };

    let mut input = BufReader::new(File::open(source).map_err(|err| PipelineError::io(source, err))?);
    let mut bom = [0u8; 3];
    let read = input.read(&mut bom).map_err(|err| PipelineError::io(source, err))?;
    let prefix: &[u8] = if read == 3 && bom == UTF8_BOM { &[] } else { &bom[..read] };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .from_reader(prefix.chain(input));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| PipelineError::csv(source, err))?
        .iter()
        .map(str::to_string)
        .collect();
    let schema = arrow_schema(&headers);

    let output = File::create(target).map_err(|err| PipelineError::io(target, err))?;
    let properties = WriterProperties::builder()
        .set_compression(ParquetCompression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(output, schema.clone(), Some(properties))
        .map_err(|err| parquet_error(err.to_string()))?;

    let mut total = 0usize;
    let mut pending: Vec<csv::StringRecord> = Vec::with_capacity(BATCH_ROWS);
    for record in reader.records() {
        pending.push(record.map_err(|err| PipelineError::csv(source, err))?);
        if pending.len() == BATCH_ROWS {
            let batch = build_batch(&schema, &pending).map_err(parquet_error)?;
            writer.write(&batch).map_err(|err| parquet_error(err.to_string()))?;
            total += pending.len();
            pending.clear();
        }
    }
    if !pending.is_empty() {
        let batch = build_batch(&schema, &pending).map_err(parquet_error)?;
        writer.write(&batch).map_err(|err| parquet_error(err.to_string()))?;
        total += pending.len();
    }
    writer.close().map_err(|err| parquet_error(err.to_string()))?;
    Ok(total)
}

fn remove_intermediate(intermediate: &Path, keep: bool) {
    if keep {
        return;
    }
    match fs::remove_file(intermediate) {
        Ok(()) => debug!(file = %intermediate.display(), "intermediate removed"),
        Err(err) => warn!(file = %intermediate.display(), error = %err, "intermediate not removed"),
    }
}

/// Turn the streamed intermediate into the requested format.
///
/// Parquet failures fall back to gzip. The intermediate is removed unless
/// `keep_intermediate` is set or it is itself the final output.
pub fn finalize(
    intermediate: &Path,
    format: OutputFormat,
    separator: u8,
    keep_intermediate: bool,
) -> Result<FinalOutput> {
    match format {
        OutputFormat::Csv => Ok(FinalOutput {
            path: intermediate.to_path_buf(),
            format,
        }),
        OutputFormat::CsvGz => {
            let target = gzip_path(intermediate);
            gzip_file(intermediate, &target)?;
            remove_intermediate(intermediate, keep_intermediate);
            Ok(FinalOutput {
                path: target,
                format,
            })
        }
        OutputFormat::Parquet => {
            let target = parquet_path(intermediate);
            match write_parquet_from_csv(intermediate, &target, separator) {
                Ok(rows) => {
                    info!(file = %target.display(), rows, "parquet written");
                    remove_intermediate(intermediate, keep_intermediate);
                    Ok(FinalOutput {
                        path: target,
                        format,
                    })
                }
                Err(err) => {
                    warn!(file = %target.display(), error = %err, "parquet failed, falling back to gzip");
                    let _ = fs::remove_file(&target);
                    finalize(intermediate, OutputFormat::CsvGz, separator, keep_intermediate)
                }
            }
        }
    }
}
