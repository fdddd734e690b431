//! Studies, outcomes and the immutable dataset they form.

use serde::{Deserialize, Serialize};

use crate::error::{MetaPoolError, Result};

/// Placeholder used when the input carries no outcome name.
pub(crate) const PLACEHOLDER_OUTCOME: &str = "Primary outcome";
/// Placeholder used when the input carries no intervention description.
pub(crate) const PLACEHOLDER_INTERVENTION: &str = "Intervention";
/// Placeholder used when the input carries no comparison description.
pub(crate) const PLACEHOLDER_COMPARISON: &str = "Control";

/// A single trial included in the review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    /// Unique study identifier.
    pub id: String,
    /// Author list as cited.
    pub authors: String,
    /// Publication year.
    pub year: i32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl Study {
    /// Citation-style label, "authors (year)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.authors, self.year)
    }

    fn check_schema(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(MetaPoolError::Schema("study id must not be empty".into()));
        }
        if !(1900..=2100).contains(&self.year) {
            return Err(MetaPoolError::Schema(format!(
                "study '{}': year {} outside 1900-2100",
                self.id, self.year
            )));
        }
        Ok(())
    }
}

/// Event counts for a dichotomous outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOutcome {
    pub study_id: String,
    pub events_treatment: u32,
    pub n_treatment: u32,
    pub events_control: u32,
    pub n_control: u32,
}

/// Mean/SD summaries for a continuous outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousOutcome {
    pub study_id: String,
    pub mean_treatment: f64,
    pub sd_treatment: f64,
    pub n_treatment: u32,
    pub mean_control: f64,
    pub sd_control: f64,
    pub n_control: u32,
}

/// One outcome row. The variant must agree with the dataset-wide
/// [`OutcomeType`]; [`Dataset::check_schema`] enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Binary(BinaryOutcome),
    Continuous(ContinuousOutcome),
}

impl Outcome {
    pub fn study_id(&self) -> &str {
        match self {
            Outcome::Binary(o) => &o.study_id,
            Outcome::Continuous(o) => &o.study_id,
        }
    }

    pub fn n_treatment(&self) -> u32 {
        match self {
            Outcome::Binary(o) => o.n_treatment,
            Outcome::Continuous(o) => o.n_treatment,
        }
    }

    pub fn n_control(&self) -> u32 {
        match self {
            Outcome::Binary(o) => o.n_control,
            Outcome::Continuous(o) => o.n_control,
        }
    }

    /// Total participants contributed by this row. Widened so the sum of
    /// two full-range arms cannot overflow.
    pub fn n_total(&self) -> u64 {
        u64::from(self.n_treatment()) + u64::from(self.n_control())
    }

    fn outcome_type(&self) -> OutcomeType {
        match self {
            Outcome::Binary(_) => OutcomeType::Binary,
            Outcome::Continuous(_) => OutcomeType::Continuous,
        }
    }
}

/// Dataset-wide outcome kind. Never mixed within one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
    Binary,
    Continuous,
}

impl OutcomeType {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeType::Binary => "binary",
            OutcomeType::Continuous => "continuous",
        }
    }
}

/// A complete, immutable meta-analysis dataset.
///
/// Datasets produced by the importer have passed [`Dataset::check_schema`];
/// the validator and the analysis bridge only read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub studies: Vec<Study>,
    pub outcomes: Vec<Outcome>,
    pub outcome_type: OutcomeType,
    #[serde(default = "default_outcome_name")]
    pub outcome_name: String,
    #[serde(default = "default_intervention")]
    pub intervention: String,
    #[serde(default = "default_comparison")]
    pub comparison: String,
}

fn default_outcome_name() -> String {
    PLACEHOLDER_OUTCOME.to_string()
}

fn default_intervention() -> String {
    PLACEHOLDER_INTERVENTION.to_string()
}

fn default_comparison() -> String {
    PLACEHOLDER_COMPARISON.to_string()
}

impl Dataset {
    /// Look up a study by id.
    pub fn study(&self, id: &str) -> Option<&Study> {
        self.studies.iter().find(|s| s.id == id)
    }

    /// Citation label for a study id, falling back to the id itself.
    pub fn study_label(&self, id: &str) -> String {
        self.study(id)
            .map(|s| s.label())
            .unwrap_or_else(|| id.to_string())
    }

    /// Sum of participants across all outcome rows.
    pub fn total_participants(&self) -> u64 {
        self.outcomes.iter().map(Outcome::n_total).sum()
    }

    /// Check the dataset against the canonical shape: every numeric field
    /// finite and in range, every outcome referencing a known study, every
    /// outcome variant matching the dataset-wide outcome type.
    pub fn check_schema(&self) -> Result<()> {
        for study in &self.studies {
            study.check_schema()?;
        }

        for (row, outcome) in self.outcomes.iter().enumerate() {
            if outcome.outcome_type() != self.outcome_type {
                return Err(MetaPoolError::Schema(format!(
                    "outcome row {}: {} data in a {} dataset",
                    row + 1,
                    outcome.outcome_type().label(),
                    self.outcome_type.label()
                )));
            }

            if self.study(outcome.study_id()).is_none() {
                return Err(MetaPoolError::Schema(format!(
                    "outcome row {}: unknown study_id '{}'",
                    row + 1,
                    outcome.study_id()
                )));
            }

            if outcome.n_treatment() < 1 || outcome.n_control() < 1 {
                return Err(MetaPoolError::Schema(format!(
                    "outcome row {}: group sizes must be at least 1",
                    row + 1
                )));
            }

            match outcome {
                Outcome::Binary(o) => {
                    if o.events_treatment > o.n_treatment || o.events_control > o.n_control {
                        return Err(MetaPoolError::Schema(format!(
                            "outcome row {}: event count exceeds group size",
                            row + 1
                        )));
                    }
                }
                Outcome::Continuous(o) => {
                    for (field, value) in [
                        ("mean_treatment", o.mean_treatment),
                        ("sd_treatment", o.sd_treatment),
                        ("mean_control", o.mean_control),
                        ("sd_control", o.sd_control),
                    ] {
                        if !value.is_finite() {
                            return Err(MetaPoolError::Schema(format!(
                                "outcome row {}: '{}' is not a number",
                                row + 1,
                                field
                            )));
                        }
                    }
                    if o.sd_treatment < 0.0 || o.sd_control < 0.0 {
                        return Err(MetaPoolError::Schema(format!(
                            "outcome row {}: standard deviation must not be negative",
                            row + 1
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
