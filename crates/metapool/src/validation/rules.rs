//! Rule engine for checking datasets against systematic-review standards.
//!
//! Rules run in a fixed order and their message text is stable for identical
//! input, so reports are directly comparable in tests and across runs.

use indexmap::IndexMap;

use crate::dataset::{Dataset, Outcome};
use crate::dataset::{PLACEHOLDER_COMPARISON, PLACEHOLDER_INTERVENTION};

use super::report::{ValidationLevel, ValidationResult};

/// A single validation rule, pure over the dataset.
pub trait Rule {
    fn name(&self) -> &'static str;
    fn check(&self, dataset: &Dataset, report: &mut ValidationResult);
}

/// Meta-analysis requires at least 2 studies.
pub struct MinimumStudies;

impl Rule for MinimumStudies {
    fn name(&self) -> &'static str {
        "minimum_studies"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        if dataset.studies.len() < 2 {
            report.error(format!(
                "Meta-analysis requires at least 2 studies. Current: {}",
                dataset.studies.len()
            ));
        }
    }
}

/// Every study must have at least one outcome row.
pub struct OutcomeCoverage;

impl Rule for OutcomeCoverage {
    fn name(&self) -> &'static str {
        "outcome_coverage"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        for study in &dataset.studies {
            let covered = dataset.outcomes.iter().any(|o| o.study_id() == study.id);
            if !covered {
                report.error(format!("Study {} is missing outcome data", study.id));
            }
        }
    }
}

/// No duplicate study ids.
pub struct DuplicateStudyIds;

impl Rule for DuplicateStudyIds {
    fn name(&self) -> &'static str {
        "duplicate_study_ids"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for study in &dataset.studies {
            *counts.entry(study.id.as_str()).or_insert(0) += 1;
        }
        let duplicates: Vec<&str> = counts
            .iter()
            .filter(|&(_, &count)| count > 1)
            .map(|(&id, _)| id)
            .collect();
        if !duplicates.is_empty() {
            report.error(format!(
                "Duplicate study IDs found: {}",
                duplicates.join(", ")
            ));
        }
    }
}

/// Small arms (n < 10) deserve a sensitivity analysis.
pub struct SampleSize;

impl Rule for SampleSize {
    fn name(&self) -> &'static str {
        "sample_size"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        for outcome in &dataset.outcomes {
            let label = dataset.study_label(outcome.study_id());
            if outcome.n_treatment() < 10 {
                report.warn(format!(
                    "{label}: Small treatment group (n={}). Consider sensitivity analysis.",
                    outcome.n_treatment()
                ));
            }
            if outcome.n_control() < 10 {
                report.warn(format!(
                    "{label}: Small control group (n={}). Consider sensitivity analysis.",
                    outcome.n_control()
                ));
            }
        }
    }
}

/// Zero-event handling for binary outcomes.
pub struct ZeroEvents;

impl Rule for ZeroEvents {
    fn name(&self) -> &'static str {
        "zero_events"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        for outcome in &dataset.outcomes {
            let Outcome::Binary(o) = outcome else {
                continue;
            };
            let label = dataset.study_label(&o.study_id);
            if o.events_treatment == 0 || o.events_control == 0 {
                report.warn(format!(
                    "{label}: Zero events detected. Continuity correction will be applied."
                ));
            }
            if o.events_treatment == 0 && o.events_control == 0 {
                report.suggest(format!(
                    "{label}: Double-zero study. Consider excluding from analysis per Cochrane Handbook 10.4.4."
                ));
            }
        }
    }
}

/// Standard-deviation plausibility for continuous outcomes.
pub struct StandardDeviation;

impl Rule for StandardDeviation {
    fn name(&self) -> &'static str {
        "standard_deviation"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        for outcome in &dataset.outcomes {
            let Outcome::Continuous(o) = outcome else {
                continue;
            };
            let label = dataset.study_label(&o.study_id);
            if o.sd_treatment == 0.0 || o.sd_control == 0.0 {
                report.error(format!("{label}: Standard deviation cannot be zero"));
                continue;
            }
            if o.sd_treatment < o.mean_treatment.abs() * 0.01 {
                report.warn(format!(
                    "{label}: Suspiciously small SD in treatment group. Please verify."
                ));
            }
            if o.sd_control < o.mean_control.abs() * 0.01 {
                report.warn(format!(
                    "{label}: Suspiciously small SD in control group. Please verify."
                ));
            }
        }
    }
}

/// Aggregate participant count and power.
pub struct ParticipantCount;

impl Rule for ParticipantCount {
    fn name(&self) -> &'static str {
        "participant_count"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        let total = dataset.total_participants();
        report.suggest(format!("Total participants across all studies: {total}"));
        if total < 100 {
            report.warn(
                "Small total sample size (n<100). Meta-analysis may be underpowered.",
            );
        }
    }
}

/// Flag studies much older than the median publication year.
pub struct YearDispersion;

impl Rule for YearDispersion {
    fn name(&self) -> &'static str {
        "year_dispersion"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        if dataset.studies.is_empty() {
            return;
        }
        let mut years: Vec<i32> = dataset.studies.iter().map(|s| s.year).collect();
        years.sort_unstable();
        let median = years[years.len() / 2];

        let old = dataset
            .studies
            .iter()
            .filter(|s| s.year < median - 10)
            .count();
        if old > 0 {
            report.suggest(format!(
                "{old} studies are >10 years older than median. Consider subgroup analysis by publication year."
            ));
        }
    }
}

/// Cochrane-standard completeness: PICO descriptions, DOIs, and the
/// always-recommended risk-of-bias and certainty assessments.
pub struct CochraneCompleteness;

impl Rule for CochraneCompleteness {
    fn name(&self) -> &'static str {
        "cochrane_completeness"
    }

    fn check(&self, dataset: &Dataset, report: &mut ValidationResult) {
        if dataset.intervention.is_empty() || dataset.intervention == PLACEHOLDER_INTERVENTION {
            report.suggest("Provide detailed intervention description for PICO framework");
        }
        if dataset.comparison.is_empty() || dataset.comparison == PLACEHOLDER_COMPARISON {
            report.suggest("Provide detailed comparison/control description for PICO framework");
        }

        let missing_doi = dataset.studies.iter().filter(|s| s.doi.is_none()).count();
        if missing_doi > 0 {
            report.suggest(format!(
                "{missing_doi} studies missing DOI. Add DOIs for better traceability."
            ));
        }

        report.suggest(
            "Perform risk of bias assessment using Cochrane RoB 2 tool for RCTs or ROBINS-I for non-randomized studies",
        );
        report.suggest("Consider GRADE assessment to evaluate certainty of evidence");
    }
}

/// Runs rules over a dataset in a deterministic order.
pub struct ValidationEngine {
    basic: Vec<Box<dyn Rule + Send + Sync>>,
    comprehensive: Vec<Box<dyn Rule + Send + Sync>>,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self {
            basic: vec![
                Box::new(MinimumStudies),
                Box::new(OutcomeCoverage),
                Box::new(DuplicateStudyIds),
            ],
            comprehensive: vec![
                Box::new(SampleSize),
                Box::new(ZeroEvents),
                Box::new(StandardDeviation),
                Box::new(ParticipantCount),
                Box::new(YearDispersion),
                Box::new(CochraneCompleteness),
            ],
        }
    }

    /// Run the configured rules and produce a full report.
    pub fn validate(&self, dataset: &Dataset, level: ValidationLevel) -> ValidationResult {
        let mut report = ValidationResult::new();

        for rule in &self.basic {
            rule.check(dataset, &mut report);
        }
        if level == ValidationLevel::Comprehensive {
            for rule in &self.comprehensive {
                rule.check(dataset, &mut report);
            }
        }

        report.finish()
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}
