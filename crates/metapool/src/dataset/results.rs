//! Shapes returned by the statistical engine.
//!
//! These mirror the JSON the engine writes: field names like `I2` and the
//! uppercase effect measures are part of the wire contract. Each shape has a
//! `check_schema` method that rejects non-finite or out-of-range values, so
//! nothing downstream of a successful check has to re-validate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MetaPoolError, Result};

/// A point estimate with its confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub estimate: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Percent weight of the study in the pooled estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl EffectSize {
    pub fn check_schema(&self) -> Result<()> {
        for (field, value) in [
            ("estimate", self.estimate),
            ("lower_ci", self.lower_ci),
            ("upper_ci", self.upper_ci),
        ] {
            if !value.is_finite() {
                return Err(MetaPoolError::Schema(format!(
                    "effect size '{field}' is not a number"
                )));
            }
        }
        if self.lower_ci > self.upper_ci {
            return Err(MetaPoolError::Schema(format!(
                "effect size interval inverted: {} > {}",
                self.lower_ci, self.upper_ci
            )));
        }
        if let Some(p) = self.p_value {
            if !(0.0..=1.0).contains(&p) {
                return Err(MetaPoolError::Schema(format!(
                    "effect size p_value {p} outside [0, 1]"
                )));
            }
        }
        if let Some(w) = self.weight {
            if !(0.0..=100.0).contains(&w) {
                return Err(MetaPoolError::Schema(format!(
                    "effect size weight {w} outside [0, 100]"
                )));
            }
        }
        Ok(())
    }
}

/// Between-study heterogeneity statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heterogeneity {
    /// I² as a percentage.
    #[serde(rename = "I2")]
    pub i2: f64,
    /// Cochran's Q.
    #[serde(rename = "Q")]
    pub q: f64,
    pub df: u32,
    pub p_value: f64,
    pub tau2: f64,
}

impl Heterogeneity {
    pub fn check_schema(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.i2) {
            return Err(MetaPoolError::Schema(format!(
                "I2 {} outside [0, 100]",
                self.i2
            )));
        }
        if !self.q.is_finite() || self.q < 0.0 {
            return Err(MetaPoolError::Schema(format!("Q {} must be >= 0", self.q)));
        }
        if !(0.0..=1.0).contains(&self.p_value) {
            return Err(MetaPoolError::Schema(format!(
                "heterogeneity p_value {} outside [0, 1]",
                self.p_value
            )));
        }
        if !self.tau2.is_finite() || self.tau2 < 0.0 {
            return Err(MetaPoolError::Schema(format!(
                "tau2 {} must be >= 0",
                self.tau2
            )));
        }
        Ok(())
    }
}

/// Per-study effect within an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyEffect {
    pub study_id: String,
    pub effect_size: EffectSize,
}

/// The effect measure pooled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectMeasure {
    /// Odds ratio.
    OR,
    /// Risk ratio.
    RR,
    /// Mean difference.
    MD,
    /// Standardized mean difference.
    SMD,
    /// Hazard ratio.
    HR,
}

impl EffectMeasure {
    /// Ratio measures have a null value of 1, difference measures of 0.
    pub fn null_value(&self) -> f64 {
        if self.is_ratio() { 1.0 } else { 0.0 }
    }

    pub fn is_ratio(&self) -> bool {
        matches!(self, EffectMeasure::OR | EffectMeasure::RR | EffectMeasure::HR)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectMeasure::OR => "OR",
            EffectMeasure::RR => "RR",
            EffectMeasure::MD => "MD",
            EffectMeasure::SMD => "SMD",
            EffectMeasure::HR => "HR",
        }
    }
}

impl fmt::Display for EffectMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pooling assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Fixed,
    Random,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Fixed => "fixed",
            Model::Random => "random",
        }
    }
}

/// A complete pooled analysis as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub effect_measure: EffectMeasure,
    pub model: Model,
    pub pooled_effect: EffectSize,
    pub heterogeneity: Heterogeneity,
    pub study_effects: Vec<StudyEffect>,
    pub n_studies: u32,
    pub n_participants: u32,
}

impl AnalysisResult {
    pub fn check_schema(&self) -> Result<()> {
        if self.n_studies < 1 {
            return Err(MetaPoolError::Schema("n_studies must be at least 1".into()));
        }
        if self.n_participants < 1 {
            return Err(MetaPoolError::Schema(
                "n_participants must be at least 1".into(),
            ));
        }
        self.pooled_effect.check_schema()?;
        self.heterogeneity.check_schema()?;
        for effect in &self.study_effects {
            effect.effect_size.check_schema()?;
        }
        Ok(())
    }
}

/// Egger's regression test for funnel plot asymmetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EggerTest {
    pub intercept: f64,
    pub p_value: f64,
}

/// Begg's rank correlation test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeggTest {
    pub tau: f64,
    pub p_value: f64,
}

/// Trim-and-fill adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimFill {
    pub n_missing: u32,
    pub adjusted_effect: EffectSize,
}

/// One publication-bias method: either a computed result or the engine's
/// explicit insufficient-data marker (the methods require at least 3 studies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BiasTest<T> {
    Computed(T),
    InsufficientData { error: String },
}

/// Publication-bias assessment across the requested methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egger_test: Option<BiasTest<EggerTest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begg_test: Option<BiasTest<BeggTest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_fill: Option<BiasTest<TrimFill>>,
}

impl BiasAssessment {
    pub fn check_schema(&self) -> Result<()> {
        if let Some(BiasTest::Computed(egger)) = &self.egger_test {
            check_p_value("egger_test", egger.p_value)?;
        }
        if let Some(BiasTest::Computed(begg)) = &self.begg_test {
            check_p_value("begg_test", begg.p_value)?;
        }
        if let Some(BiasTest::Computed(trim_fill)) = &self.trim_fill {
            trim_fill.adjusted_effect.check_schema()?;
        }
        Ok(())
    }
}

fn check_p_value(test: &str, p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(MetaPoolError::Schema(format!(
            "{test} p_value {p} outside [0, 1]"
        )));
    }
    Ok(())
}
