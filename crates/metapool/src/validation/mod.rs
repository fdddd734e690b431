//! Layered rule engine producing non-fatal methodological reports.

mod report;
mod rules;

pub use report::{ValidationLevel, ValidationResult};
pub use rules::{
    CochraneCompleteness, DuplicateStudyIds, MinimumStudies, OutcomeCoverage, ParticipantCount,
    Rule, SampleSize, StandardDeviation, ValidationEngine, YearDispersion, ZeroEvents,
};
