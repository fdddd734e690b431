//! Flat-record normalization shared by the delimited, workbook and JSON paths.
//!
//! All three raw shapes reduce to a sequence of key/value records; this module
//! classifies the outcome type from the first record and builds the canonical
//! dataset from the rest.

use indexmap::IndexMap;
use serde_json::Value;

use crate::dataset::{
    BinaryOutcome, ContinuousOutcome, Dataset, Outcome, OutcomeType,
    PLACEHOLDER_COMPARISON, PLACEHOLDER_INTERVENTION, PLACEHOLDER_OUTCOME, Study,
};
use crate::error::{MetaPoolError, Result};

/// One flat input row, keyed by column name in source order.
pub type Record = IndexMap<String, Value>;

/// Outcome type classification, computed exactly once per dataset from key
/// presence in the first record and never re-derived downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Binary,
    Continuous,
    Ambiguous,
}

/// Classify a record array from its first record.
pub fn classify_outcome(first: &Record) -> OutcomeClass {
    let is_binary =
        first.contains_key("events_treatment") && first.contains_key("events_control");
    let is_continuous =
        first.contains_key("mean_treatment") && first.contains_key("mean_control");

    if is_binary {
        OutcomeClass::Binary
    } else if is_continuous {
        OutcomeClass::Continuous
    } else {
        OutcomeClass::Ambiguous
    }
}

/// Build a canonical dataset from flat records.
///
/// Studies are deduplicated by id with first-occurrence-wins field values;
/// every record contributes exactly one outcome. The returned dataset has
/// passed the schema check.
pub fn build_dataset(records: &[Record]) -> Result<Dataset> {
    let Some(first) = records.first() else {
        return Err(MetaPoolError::EmptyInput("No data records found".into()));
    };

    let outcome_type = match classify_outcome(first) {
        OutcomeClass::Binary => OutcomeType::Binary,
        OutcomeClass::Continuous => OutcomeType::Continuous,
        OutcomeClass::Ambiguous => return Err(MetaPoolError::AmbiguousOutcomeType),
    };

    let mut studies: IndexMap<String, Study> = IndexMap::new();
    let mut outcomes = Vec::with_capacity(records.len());

    for (idx, record) in records.iter().enumerate() {
        let row = idx + 1;
        let study_id = text_field(record, "study_id").ok_or_else(|| {
            MetaPoolError::Schema(format!("record {row}: missing 'study_id'"))
        })?;

        studies.entry(study_id.clone()).or_insert_with(|| Study {
            id: study_id.clone(),
            authors: text_field(record, "authors").unwrap_or_else(|| "Unknown".into()),
            year: int_field_or(record, "year", 2000),
            title: text_field(record, "title").unwrap_or_else(|| "Unknown".into()),
            journal: text_field(record, "journal"),
            doi: text_field(record, "doi"),
        });

        let outcome = match outcome_type {
            OutcomeType::Binary => Outcome::Binary(BinaryOutcome {
                study_id,
                events_treatment: count_field(record, row, "events_treatment")?,
                n_treatment: count_field(record, row, "n_treatment")?,
                events_control: count_field(record, row, "events_control")?,
                n_control: count_field(record, row, "n_control")?,
            }),
            OutcomeType::Continuous => Outcome::Continuous(ContinuousOutcome {
                study_id,
                mean_treatment: float_field(record, "mean_treatment"),
                sd_treatment: float_field(record, "sd_treatment"),
                n_treatment: count_field(record, row, "n_treatment")?,
                mean_control: float_field(record, "mean_control"),
                sd_control: float_field(record, "sd_control"),
                n_control: count_field(record, row, "n_control")?,
            }),
        };
        outcomes.push(outcome);
    }

    let dataset = Dataset {
        studies: studies.into_values().collect(),
        outcomes,
        outcome_type,
        outcome_name: text_field(first, "outcome")
            .unwrap_or_else(|| PLACEHOLDER_OUTCOME.into()),
        intervention: text_field(first, "intervention")
            .unwrap_or_else(|| PLACEHOLDER_INTERVENTION.into()),
        comparison: text_field(first, "comparison")
            .unwrap_or_else(|| PLACEHOLDER_COMPARISON.into()),
    };

    dataset.check_schema()?;
    Ok(dataset)
}

/// Non-empty text value for a key, if present.
fn text_field(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer field with a fallback for absent, unparseable or out-of-range
/// values. Out-of-range numbers take the fallback rather than wrapping.
fn int_field_or(record: &Record, key: &str, default: i32) -> i32 {
    match record.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Required non-negative count field. Parse failures surface as schema
/// errors naming the record and field, never as silently dropped rows.
fn count_field(record: &Record, row: usize, key: &str) -> Result<u32> {
    let parsed = match record.get(key) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        MetaPoolError::Schema(format!(
            "record {row}: '{key}' is not a non-negative integer"
        ))
    })
}

/// Float field. Absent or unparseable values become NaN so the dataset
/// schema check rejects them with the field name attached.
fn float_field(record: &Record, key: &str) -> f64 {
    match record.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
