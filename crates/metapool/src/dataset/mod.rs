//! Canonical data model for meta-analysis datasets and engine results.

mod model;
mod results;

pub use model::{BinaryOutcome, ContinuousOutcome, Dataset, Outcome, OutcomeType, Study};
pub(crate) use model::{PLACEHOLDER_COMPARISON, PLACEHOLDER_INTERVENTION, PLACEHOLDER_OUTCOME};
pub use results::{
    AnalysisResult, BeggTest, BiasAssessment, BiasTest, EffectMeasure, EffectSize, EggerTest,
    Heterogeneity, Model, StudyEffect, TrimFill,
};
