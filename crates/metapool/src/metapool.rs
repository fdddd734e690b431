//! Main MetaPool struct and public API.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bridge::script::{self, BiasMethod};
use crate::bridge::{
    EngineConfig, FOREST_PLOT_HEIGHT_PX, FOREST_PLOT_WIDTH_PX, FUNNEL_PLOT_SIZE_PX,
    ForestPlotOptions, PLOT_DPI, REngine,
};
use crate::dataset::{
    AnalysisResult, BiasAssessment, Dataset, EffectMeasure, Model,
};
use crate::error::Result;
use crate::import::{ImportedDataset, Importer, ImporterConfig};
use crate::interpret;
use crate::validation::{ValidationEngine, ValidationLevel, ValidationResult};

/// Engine packages the statistical procedures depend on.
pub const REQUIRED_PACKAGES: [&str; 3] = ["metafor", "meta", "jsonlite"];

/// Configuration for the full pipeline.
#[derive(Debug, Clone, Default)]
pub struct MetaPoolConfig {
    /// Importer configuration.
    pub importer: ImporterConfig,
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Validation depth applied by [`MetaPool::validate`].
    pub validation_level: ValidationLevel,
}

/// A pooled analysis together with its deterministic interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedAnalysis {
    pub result: AnalysisResult,
    /// Cochrane banding of the observed I².
    pub heterogeneity_interpretation: String,
    /// Ordered methodological recommendations. Empty for a clean result.
    pub recommendations: Vec<String>,
}

/// A publication-bias assessment together with its interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedBias {
    pub assessment: BiasAssessment,
    pub funnel_plot: Option<PlotArtifact>,
    pub interpretation: Vec<String>,
}

/// A plot the engine wrote to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotArtifact {
    pub path: std::path::PathBuf,
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
}

/// The meta-analysis pipeline: import, validate, analyze, interpret.
///
/// Statistical work runs in an external R process; everything else is
/// in-process and deterministic. Instances hold no per-run state, so one
/// `MetaPool` can serve concurrent analyses.
pub struct MetaPool {
    config: MetaPoolConfig,
    importer: Importer,
    validation: ValidationEngine,
    engine: REngine,
}

impl Default for MetaPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaPool {
    /// Create a pipeline with default configuration: `Rscript` on PATH, no
    /// timeout, comprehensive validation.
    pub fn new() -> Self {
        Self::with_config(MetaPoolConfig::default())
    }

    pub fn with_config(config: MetaPoolConfig) -> Self {
        let importer = Importer::with_config(config.importer.clone());
        let engine = REngine::with_config(config.engine.clone());
        Self {
            config,
            importer,
            validation: ValidationEngine::new(),
            engine,
        }
    }

    pub fn config(&self) -> &MetaPoolConfig {
        &self.config
    }

    /// Import a dataset from a CSV, TSV, Excel or JSON file.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<ImportedDataset> {
        self.importer.import_path(path)
    }

    /// Validate a dataset at the configured level.
    pub fn validate(&self, dataset: &Dataset) -> ValidationResult {
        self.validation
            .validate(dataset, self.config.validation_level)
    }

    /// Validate a dataset at an explicit level.
    pub fn validate_at(&self, dataset: &Dataset, level: ValidationLevel) -> ValidationResult {
        self.validation.validate(dataset, level)
    }

    /// Run the pooled analysis in the engine and attach its interpretation.
    ///
    /// The engine result is schema-checked before interpretation, so a
    /// malformed engine response surfaces as a `Schema` error rather than as
    /// nonsense text.
    pub async fn analyze(
        &self,
        dataset: &Dataset,
        effect_measure: EffectMeasure,
        model: Model,
    ) -> Result<AnnotatedAnalysis> {
        dataset.check_schema()?;
        let rendered = script::meta_analysis(dataset, effect_measure, model)?;
        let value = self.engine.execute(rendered).await?;
        let result: AnalysisResult = serde_json::from_value(value)?;
        result.check_schema()?;

        info!(
            measure = %result.effect_measure,
            model = result.model.as_str(),
            n_studies = result.n_studies,
            "analysis complete"
        );

        Ok(AnnotatedAnalysis {
            heterogeneity_interpretation: interpret::interpret_heterogeneity(
                result.heterogeneity.i2,
            ),
            recommendations: interpret::recommendations(&result),
            result,
        })
    }

    /// Render a forest plot for a prior analysis.
    pub async fn forest_plot(
        &self,
        analysis: &AnalysisResult,
        options: &ForestPlotOptions,
    ) -> Result<PlotArtifact> {
        let rendered = script::forest_plot(analysis, options)?;
        self.engine.execute(rendered).await?;
        Ok(PlotArtifact {
            path: options.output_path.clone(),
            width_px: FOREST_PLOT_WIDTH_PX,
            height_px: FOREST_PLOT_HEIGHT_PX,
            dpi: PLOT_DPI,
        })
    }

    /// Assess publication bias for a prior analysis.
    ///
    /// `funnel_path` is required when `methods` includes
    /// [`BiasMethod::FunnelPlot`] and ignored otherwise.
    pub async fn assess_bias(
        &self,
        analysis: &AnalysisResult,
        methods: &[BiasMethod],
        funnel_path: Option<&Path>,
    ) -> Result<AnnotatedBias> {
        let rendered = script::publication_bias(analysis, methods, funnel_path)?;
        let value = self.engine.execute(rendered).await?;
        let assessment: BiasAssessment = serde_json::from_value(value)?;
        assessment.check_schema()?;

        let mut interpretation = interpret::interpret_bias(&assessment);
        if analysis.n_studies < 10 {
            interpretation.push(
                "Publication bias tests have limited power with fewer than 10 studies. Interpret results with caution."
                    .to_string(),
            );
        }

        let funnel_plot = if methods.contains(&BiasMethod::FunnelPlot) {
            funnel_path.map(|path| PlotArtifact {
                path: path.to_path_buf(),
                width_px: FUNNEL_PLOT_SIZE_PX,
                height_px: FUNNEL_PLOT_SIZE_PX,
                dpi: PLOT_DPI,
            })
        } else {
            None
        };

        Ok(AnnotatedBias {
            interpretation,
            assessment,
            funnel_plot,
        })
    }

    /// Check which of the engine packages the pipeline needs are installed.
    ///
    /// Degrades to an all-false map when the engine is unavailable, so
    /// callers can report missing prerequisites instead of failing.
    pub async fn check_packages(&self) -> std::collections::HashMap<String, bool> {
        self.engine.check_packages(&REQUIRED_PACKAGES).await
    }
}
