//! MetaPool: a systematic-review meta-analysis pipeline.
//!
//! MetaPool imports study-level data from common tabular formats, validates
//! it against Cochrane-style methodological checks, runs pooled analyses in
//! an external R process, and turns the numeric results into deterministic
//! textual interpretation.
//!
//! # Core Principles
//!
//! - **Strict at the boundary**: every dataset and engine result is
//!   schema-checked before anything downstream consumes it
//! - **Engine at arm's length**: R is a child process exchanging JSON
//!   through scoped temp files, never a linked dependency
//! - **Deterministic interpretation**: identical numbers always yield
//!   identical advisory text
//!
//! # Example
//!
//! ```no_run
//! use metapool::{EffectMeasure, MetaPool, Model};
//!
//! # async fn run() -> metapool::Result<()> {
//! let pool = MetaPool::new();
//! let imported = pool.import("trials.csv")?;
//!
//! let report = pool.validate(&imported.dataset);
//! for warning in &report.warnings {
//!     eprintln!("warning: {warning}");
//! }
//!
//! let analysis = pool
//!     .analyze(&imported.dataset, EffectMeasure::OR, Model::Random)
//!     .await?;
//! println!("{}", analysis.heterogeneity_interpretation);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod dataset;
pub mod error;
pub mod import;
pub mod interpret;
pub mod validation;

mod metapool;

pub use crate::metapool::{
    AnnotatedAnalysis, AnnotatedBias, MetaPool, MetaPoolConfig, PlotArtifact, REQUIRED_PACKAGES,
};
pub use bridge::{BiasMethod, EngineConfig, ForestPlotOptions, REngine};
pub use dataset::{
    AnalysisResult, BiasAssessment, BiasTest, Dataset, EffectMeasure, EffectSize, Heterogeneity,
    Model, Outcome, OutcomeType, Study,
};
pub use error::{MetaPoolError, Result};
pub use import::{ImportedDataset, Importer, ImporterConfig, SourceMetadata};
pub use validation::{ValidationEngine, ValidationLevel, ValidationResult};
