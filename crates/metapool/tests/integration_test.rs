//! End-to-end tests for the import and validation stages.

use std::io::Write;
use tempfile::{Builder, NamedTempFile};

use metapool::{
    MetaPool, MetaPoolError, Outcome, OutcomeType, ValidationLevel,
};

/// Helper to create a temporary file with the given suffix and content.
fn create_test_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file
}

fn binary_csv() -> NamedTempFile {
    let content = "\
study_id,authors,year,title,events_treatment,n_treatment,events_control,n_control
smith2020,Smith et al.,2020,Aspirin for stroke prevention,12,150,20,148
jones2019,Jones et al.,2019,Aspirin after TIA,8,90,15,95
garcia2021,Garcia et al.,2021,Low-dose aspirin trial,5,200,9,210
";
    create_test_file(".csv", content)
}

fn continuous_tsv() -> NamedTempFile {
    let content = "\
study_id\tauthors\tyear\tmean_treatment\tsd_treatment\tn_treatment\tmean_control\tsd_control\tn_control
lee2018\tLee et al.\t2018\t5.2\t1.1\t40\t6.8\t1.3\t38
chen2020\tChen et al.\t2020\t4.9\t0.9\t55\t6.1\t1.2\t57
";
    create_test_file(".tsv", content)
}

// =============================================================================
// Import Tests
// =============================================================================

#[test]
fn test_import_binary_csv() {
    let file = binary_csv();
    let pool = MetaPool::new();

    let imported = pool.import(file.path()).expect("Import failed");
    let dataset = imported.dataset;

    assert_eq!(dataset.outcome_type, OutcomeType::Binary);
    assert_eq!(dataset.studies.len(), 3);
    assert_eq!(dataset.outcomes.len(), 3);
    assert_eq!(dataset.total_participants(), 150 + 148 + 90 + 95 + 200 + 210);
    assert!(matches!(dataset.outcomes[0], Outcome::Binary(_)));

    assert_eq!(imported.source.format, "csv");
    assert_eq!(imported.source.record_count, 3);
    assert!(imported.source.hash.starts_with("sha256:"));
}

#[test]
fn test_import_continuous_tsv() {
    let file = continuous_tsv();
    let pool = MetaPool::new();

    let imported = pool.import(file.path()).expect("Import failed");
    let dataset = imported.dataset;

    assert_eq!(dataset.outcome_type, OutcomeType::Continuous);
    assert_eq!(dataset.studies.len(), 2);
    assert!(matches!(dataset.outcomes[0], Outcome::Continuous(_)));
}

#[test]
fn test_import_structured_json() {
    let content = r#"{
        "studies": [
            {"id": "s1", "authors": "A", "year": 2020, "title": "T1"},
            {"id": "s2", "authors": "B", "year": 2021, "title": "T2"}
        ],
        "outcomes": [
            {"study_id": "s1", "events_treatment": 3, "n_treatment": 30,
             "events_control": 6, "n_control": 30},
            {"study_id": "s2", "events_treatment": 4, "n_treatment": 45,
             "events_control": 7, "n_control": 44}
        ],
        "outcome_type": "binary",
        "outcome_name": "Mortality",
        "intervention": "Drug",
        "comparison": "Placebo"
    }"#;
    let file = create_test_file(".json", content);
    let pool = MetaPool::new();

    let imported = pool.import(file.path()).expect("Import failed");
    assert_eq!(imported.dataset.outcome_name, "Mortality");
    assert_eq!(imported.dataset.studies.len(), 2);
}

#[test]
fn test_import_record_array_json() {
    let content = r#"[
        {"study_id": "s1", "authors": "A", "year": 2020,
         "events_treatment": 3, "n_treatment": 30,
         "events_control": 6, "n_control": 30},
        {"study_id": "s2", "authors": "B", "year": 2021,
         "events_treatment": 4, "n_treatment": 45,
         "events_control": 7, "n_control": 44}
    ]"#;
    let file = create_test_file(".json", content);
    let pool = MetaPool::new();

    let imported = pool.import(file.path()).expect("Import failed");
    assert_eq!(imported.dataset.outcome_type, OutcomeType::Binary);
    assert_eq!(imported.dataset.studies.len(), 2);
}

#[test]
fn test_import_unsupported_extension() {
    let file = create_test_file(".parquet", "not really parquet");
    let pool = MetaPool::new();

    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::UnsupportedFormat(_)));
}

#[test]
fn test_import_header_only_csv() {
    let file = create_test_file(".csv", "study_id,events_treatment,n_treatment\n");
    let pool = MetaPool::new();

    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::EmptyInput(_)));
}

#[test]
fn test_import_ambiguous_records() {
    let file = create_test_file(".csv", "study_id,authors,year\ns1,A,2020\n");
    let pool = MetaPool::new();

    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::AmbiguousOutcomeType));
}

#[test]
fn test_import_missing_file() {
    let pool = MetaPool::new();
    let err = pool.import("/nonexistent/trials.csv").unwrap_err();
    assert!(matches!(err, MetaPoolError::Io { .. }));
}

// =============================================================================
// Workbook Import Tests
// =============================================================================

/// Write an xlsx workbook with the given rows to a temp file.
fn create_xlsx_file(rows: &[Vec<&str>], numeric_from_col: usize) -> NamedTempFile {
    let file = Builder::new()
        .suffix(".xlsx")
        .tempfile()
        .expect("Failed to create temp file");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if r > 0 && c >= numeric_from_col {
                let value: f64 = cell.parse().expect("Numeric fixture cell");
                sheet
                    .write(r as u32, c as u16, value)
                    .expect("Failed to write cell");
            } else {
                sheet
                    .write(r as u32, c as u16, *cell)
                    .expect("Failed to write cell");
            }
        }
    }
    workbook.save(file.path()).expect("Failed to save workbook");
    file
}

#[test]
fn test_import_binary_xlsx() {
    let file = create_xlsx_file(
        &[
            vec![
                "study_id",
                "authors",
                "year",
                "events_treatment",
                "n_treatment",
                "events_control",
                "n_control",
            ],
            vec!["smith2020", "Smith et al.", "2020", "12", "150", "20", "148"],
            vec!["jones2019", "Jones et al.", "2019", "8", "90", "15", "95"],
        ],
        2,
    );
    let pool = MetaPool::new();

    let imported = pool.import(file.path()).expect("Import failed");
    let dataset = imported.dataset;

    assert_eq!(dataset.outcome_type, OutcomeType::Binary);
    assert_eq!(dataset.studies.len(), 2);
    assert_eq!(dataset.studies[0].year, 2020);
    assert_eq!(dataset.total_participants(), 150 + 148 + 90 + 95);
    assert_eq!(imported.source.format, "xlsx");
}

#[test]
fn test_import_xlsx_empty_worksheet() {
    let file = Builder::new()
        .suffix(".xlsx")
        .tempfile()
        .expect("Failed to create temp file");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    workbook.add_worksheet();
    workbook.save(file.path()).expect("Failed to save workbook");

    let pool = MetaPool::new();
    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::MalformedStructure(_)));
    assert!(err.to_string().contains("no rows"));
}

#[test]
fn test_import_xlsx_header_only() {
    let file = create_xlsx_file(
        &[vec!["study_id", "events_treatment", "n_treatment"]],
        1,
    );
    let pool = MetaPool::new();

    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::MalformedStructure(_)));
    assert!(err.to_string().contains("no data rows"));
}

#[test]
fn test_import_non_workbook_xlsx() {
    let file = create_test_file(".xlsx", "not a workbook at all");
    let pool = MetaPool::new();

    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::Workbook(_)));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_clean_dataset() {
    let file = binary_csv();
    let pool = MetaPool::new();
    let imported = pool.import(file.path()).expect("Import failed");

    let report = pool.validate(&imported.dataset);
    assert!(report.valid);
    assert!(report.errors.is_empty());
    // Comprehensive validation always suggests risk-of-bias and GRADE steps.
    assert!(!report.suggestions.is_empty());
}

#[test]
fn test_validate_single_study_fails() {
    let content = "\
study_id,events_treatment,n_treatment,events_control,n_control
only2020,4,50,9,55
";
    let file = create_test_file(".csv", content);
    let pool = MetaPool::new();
    let imported = pool.import(file.path()).expect("Import failed");

    let report = pool.validate(&imported.dataset);
    assert!(!report.valid);
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("at least 2 studies"))
    );
}

#[test]
fn test_validate_basic_level_skips_quality_rules() {
    let file = binary_csv();
    let pool = MetaPool::new();
    let imported = pool.import(file.path()).expect("Import failed");

    let report = pool.validate_at(&imported.dataset, ValidationLevel::Basic);
    assert!(report.valid);
    assert!(report.suggestions.is_empty());
}

#[test]
fn test_validate_flags_small_groups() {
    let content = "\
study_id,events_treatment,n_treatment,events_control,n_control
tiny2020,1,8,2,9
tiny2021,2,7,1,8
";
    let file = create_test_file(".csv", content);
    let pool = MetaPool::new();
    let imported = pool.import(file.path()).expect("Import failed");

    let report = pool.validate(&imported.dataset);
    assert!(report.valid);
    assert!(report.warnings.iter().any(|w| w.contains("Small treatment group")));
    assert!(report.warnings.iter().any(|w| w.contains("underpowered")));
}

// =============================================================================
// Importer Edge Cases
// =============================================================================

#[test]
fn test_duplicate_study_rows_collapse_to_one_study() {
    let content = "\
study_id,authors,year,events_treatment,n_treatment,events_control,n_control
multi2020,Multi et al.,2020,3,40,6,41
multi2020,Multi et al.,2020,2,40,5,41
other2021,Other et al.,2021,4,60,8,62
";
    let file = create_test_file(".csv", content);
    let pool = MetaPool::new();
    let imported = pool.import(file.path()).expect("Import failed");

    assert_eq!(imported.dataset.studies.len(), 2);
    assert_eq!(imported.dataset.outcomes.len(), 3);
}

#[test]
fn test_bad_count_cell_is_schema_error() {
    let content = "\
study_id,events_treatment,n_treatment,events_control,n_control
bad2020,three,40,6,41
ok2021,4,60,8,62
";
    let file = create_test_file(".csv", content);
    let pool = MetaPool::new();

    let err = pool.import(file.path()).unwrap_err();
    assert!(matches!(err, MetaPoolError::Schema(_)));
    assert!(err.to_string().contains("events_treatment"));
}
