//! Importer: normalizes raw tabular, workbook and JSON input into a
//! canonical [`Dataset`].

mod records;
mod source;

pub use records::{OutcomeClass, Record, build_dataset, classify_outcome};
pub use source::{ImportedDataset, SourceMetadata};

use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::dataset::Dataset;
use crate::error::{MetaPoolError, Result};

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Importer configuration.
#[derive(Debug, Clone, Default)]
pub struct ImporterConfig {
    /// Delimiter for delimited text (None = auto-detect).
    pub delimiter: Option<u8>,
}

/// Imports raw files into canonical datasets.
#[derive(Debug, Clone, Default)]
pub struct Importer {
    config: ImporterConfig,
}

impl Importer {
    /// Create an importer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ImporterConfig) -> Self {
        Self { config }
    }

    /// Import a file, dispatching on its extension.
    pub fn import_path(&self, path: impl AsRef<Path>) -> Result<ImportedDataset> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let (contents, size_bytes) = read_file(path)?;
        let hash = format!("sha256:{:x}", Sha256::digest(&contents));

        let (dataset, format) = match extension.as_str() {
            "csv" | "tsv" | "txt" => {
                let delimiter = match self.config.delimiter {
                    Some(d) => d,
                    None => detect_delimiter(&contents)?,
                };
                let format = match delimiter {
                    b'\t' => "tsv",
                    b',' => "csv",
                    _ => "delimited",
                };
                (self.parse_delimited(&contents, delimiter)?, format)
            }
            "xlsx" | "xls" | "ods" => (self.parse_workbook(path)?, "xlsx"),
            "json" => (self.parse_json(&contents)?, "json"),
            other => {
                return Err(MetaPoolError::UnsupportedFormat(format!(
                    "unrecognized extension '{other}'"
                )));
            }
        };

        info!(
            file = %path.display(),
            format,
            n_studies = dataset.studies.len(),
            n_outcomes = dataset.outcomes.len(),
            "imported dataset"
        );

        let source = SourceMetadata::new(
            path.to_path_buf(),
            hash,
            size_bytes,
            format.to_string(),
            dataset.outcomes.len(),
        );

        Ok(ImportedDataset { dataset, source })
    }

    /// Parse delimited text with a header row.
    pub fn parse_delimited(&self, bytes: &[u8], delimiter: u8) -> Result<Dataset> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.is_empty() {
            return Err(MetaPoolError::EmptyInput("No columns found".into()));
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
                .collect();
            records.push(record);
        }

        if records.is_empty() {
            return Err(MetaPoolError::EmptyInput("No data records found".into()));
        }

        build_dataset(&records)
    }

    /// Parse the first worksheet of a spreadsheet workbook.
    fn parse_workbook(&self, path: &Path) -> Result<Dataset> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| MetaPoolError::MalformedStructure("workbook has no worksheets".into()))?;

        let range = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or_else(|| {
                MetaPoolError::MalformedStructure("first worksheet has no rows".into())
            })?
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut records = Vec::new();
        for row in rows {
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .filter_map(|(header, cell)| {
                    cell_to_value(cell).map(|value| (header.clone(), value))
                })
                .collect();
            if !record.is_empty() {
                records.push(record);
            }
        }

        if records.is_empty() {
            return Err(MetaPoolError::MalformedStructure(
                "first worksheet has no data rows".into(),
            ));
        }

        build_dataset(&records)
    }

    /// Parse JSON: either a structured dataset or a flat record array.
    pub fn parse_json(&self, bytes: &[u8]) -> Result<Dataset> {
        let value: Value = serde_json::from_slice(bytes)?;
        self.dataset_from_json(value)
    }

    /// Normalize an already-parsed JSON value.
    pub fn dataset_from_json(&self, value: Value) -> Result<Dataset> {
        match value {
            Value::Object(ref map)
                if map.contains_key("studies")
                    && map.contains_key("outcomes")
                    && map.contains_key("outcome_type") =>
            {
                let dataset: Dataset = serde_json::from_value(value)?;
                dataset.check_schema()?;
                Ok(dataset)
            }
            Value::Array(elements) => {
                if elements.is_empty() {
                    return Err(MetaPoolError::EmptyInput("No data records found".into()));
                }
                let records = elements
                    .into_iter()
                    .map(|element| match element {
                        Value::Object(map) => Ok(map.into_iter().collect::<IndexMap<_, _>>()),
                        _ => Err(MetaPoolError::MalformedStructure(
                            "record array elements must be objects".into(),
                        )),
                    })
                    .collect::<Result<Vec<Record>>>()?;
                build_dataset(&records)
            }
            _ => Err(MetaPoolError::MalformedStructure(
                "Invalid JSON structure. Expected either a structured dataset or an array of records."
                    .into(),
            )),
        }
    }
}

fn read_file(path: &Path) -> Result<(Vec<u8>, u64)> {
    let mut file = File::open(path).map_err(|e| MetaPoolError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).map_err(|e| MetaPoolError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let size = contents.len() as u64;
    Ok((contents, size))
}

/// Convert a spreadsheet cell into a record value. Empty cells are dropped
/// so placeholder defaults apply.
fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| Value::String(trimmed.to_string()))
        }
        Data::Int(i) => Some(Value::Number((*i).into())),
        // Spreadsheets store counts and years as floats; integral values
        // become integer-backed numbers so count fields parse.
        Data::Float(f) if f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(f) => {
            Some(Value::Number((*f as i64).into()))
        }
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .or_else(|| Some(Value::String(f.to_string()))),
        Data::Bool(b) => Some(Value::Bool(*b)),
        other => Some(Value::String(other.to_string())),
    }
}

/// Detect the delimiter by scoring consistency across the first lines.
fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if lines.is_empty() {
        return Err(MetaPoolError::EmptyInput("No lines to analyze".into()));
    }

    let mut best = (b',', 0usize);
    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_outside_quotes(line, delim as char))
            .collect();
        let first = counts[0];
        if first == 0 {
            continue;
        }

        let consistent = counts.iter().all(|&c| c == first);
        let score = if consistent {
            first * 1000 + usize::from(delim == b'\t') * 100
        } else {
            first
        };

        if score > best.1 {
            best = (delim, score);
        }
    }

    Ok(best.0)
}

fn count_outside_quotes(line: &str, delimiter: char) -> usize {
    let mut count = 0;
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}
