//! Deterministic interpretation of engine results.
//!
//! Pure functions mapping numeric results into the advisory text a reviewer
//! acts on. Band boundaries and wording follow the Cochrane Handbook
//! (heterogeneity per section 10.10.2).

use crate::dataset::{AnalysisResult, BiasAssessment, BiasTest};

/// Significance threshold for publication-bias tests.
pub const BIAS_SIGNIFICANCE_THRESHOLD: f64 = 0.10;

/// Cochrane I² band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeterogeneityBand {
    Low,
    Moderate,
    Substantial,
    Considerable,
}

impl HeterogeneityBand {
    /// Band an I² percentage. Boundaries are inclusive on the low side:
    /// I² = 40 is still low, I² = 60 still moderate, I² = 75 still
    /// substantial.
    pub fn from_i2(i2: f64) -> Self {
        if i2 <= 40.0 {
            HeterogeneityBand::Low
        } else if i2 <= 60.0 {
            HeterogeneityBand::Moderate
        } else if i2 <= 75.0 {
            HeterogeneityBand::Substantial
        } else {
            HeterogeneityBand::Considerable
        }
    }

    pub fn advisory(&self) -> &'static str {
        match self {
            HeterogeneityBand::Low => {
                "Low heterogeneity (I² ≤ 40%). Heterogeneity might not be important."
            }
            HeterogeneityBand::Moderate => {
                "Moderate heterogeneity (40% < I² ≤ 60%). May represent moderate heterogeneity."
            }
            HeterogeneityBand::Substantial => {
                "Substantial heterogeneity (60% < I² ≤ 75%). May represent substantial heterogeneity."
            }
            HeterogeneityBand::Considerable => {
                "Considerable heterogeneity (I² > 75%). Represents considerable heterogeneity. Consider not pooling studies or using a random-effects model."
            }
        }
    }
}

/// Advisory sentence for an I² percentage.
pub fn interpret_heterogeneity(i2: f64) -> String {
    HeterogeneityBand::from_i2(i2).advisory().to_string()
}

/// Ordered, cumulative recommendation list for an analysis.
pub fn recommendations(result: &AnalysisResult) -> Vec<String> {
    let mut out = Vec::new();

    if result.heterogeneity.i2 > 75.0 {
        out.push("High heterogeneity detected. Consider:".to_string());
        out.push("  - Investigating sources of heterogeneity through subgroup analysis".to_string());
        out.push("  - Using meta-regression to explore covariates".to_string());
        out.push("  - Examining whether pooling is appropriate".to_string());
    }

    if result.heterogeneity.p_value < 0.10 {
        out.push(format!(
            "Significant heterogeneity (Q-test p={:.3}). Random-effects model is recommended.",
            result.heterogeneity.p_value
        ));
    }

    if result.n_studies < 5 {
        out.push("Small number of studies (n<5). Interpret results with caution.".to_string());
        out.push(
            "Publication bias assessment may not be reliable with few studies.".to_string(),
        );
    }

    let null = result.effect_measure.null_value();
    if result.pooled_effect.lower_ci < null && result.pooled_effect.upper_ci > null {
        if result.effect_measure.is_ratio() {
            out.push(
                "Confidence interval crosses 1.0, suggesting no statistically significant effect."
                    .to_string(),
            );
        } else {
            out.push(
                "Confidence interval crosses 0, suggesting no statistically significant effect."
                    .to_string(),
            );
        }
    }

    if result.n_participants < 100 {
        out.push(
            "Small total sample size. Meta-analysis may be underpowered to detect meaningful effects."
                .to_string(),
        );
    }

    out
}

/// Textual interpretation of a publication-bias assessment, in fixed method
/// order: Egger, Begg, trim-and-fill.
pub fn interpret_bias(assessment: &BiasAssessment) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(egger) = &assessment.egger_test {
        match egger {
            BiasTest::InsufficientData { error } => out.push(format!("Egger's test: {error}")),
            BiasTest::Computed(test) => {
                if test.p_value < BIAS_SIGNIFICANCE_THRESHOLD {
                    out.push(format!(
                        "Egger's test suggests potential publication bias (p={:.3}, p<0.10)",
                        test.p_value
                    ));
                } else {
                    out.push(format!(
                        "Egger's test does not suggest publication bias (p={:.3})",
                        test.p_value
                    ));
                }
            }
        }
    }

    if let Some(begg) = &assessment.begg_test {
        match begg {
            BiasTest::InsufficientData { error } => out.push(format!("Begg's test: {error}")),
            BiasTest::Computed(test) => {
                if test.p_value < BIAS_SIGNIFICANCE_THRESHOLD {
                    out.push(format!(
                        "Begg's test suggests potential publication bias (p={:.3}, p<0.10)",
                        test.p_value
                    ));
                } else {
                    out.push(format!(
                        "Begg's test does not suggest publication bias (p={:.3})",
                        test.p_value
                    ));
                }
            }
        }
    }

    if let Some(trim_fill) = &assessment.trim_fill {
        match trim_fill {
            BiasTest::InsufficientData { error } => out.push(format!("Trim-and-fill: {error}")),
            BiasTest::Computed(test) => {
                if test.n_missing > 0 {
                    out.push(format!(
                        "Trim-and-fill suggests {} potentially missing studies due to publication bias",
                        test.n_missing
                    ));
                    out.push(format!(
                        "Adjusted pooled estimate: {:.3} (95% CI: {:.3} to {:.3})",
                        test.adjusted_effect.estimate,
                        test.adjusted_effect.lower_ci,
                        test.adjusted_effect.upper_ci
                    ));
                } else {
                    out.push("Trim-and-fill does not suggest missing studies".to_string());
                }
            }
        }
    }

    out
}
