//! Process-boundary bridge to the external R statistics engine.
//!
//! Callers hand a dataset or a prior analysis to a procedure constructor,
//! get back a rendered script, and execute it through [`REngine`]. Scripts
//! and results travel through uniquely named temporary files that are
//! removed on every exit path.

mod engine;
pub mod script;
mod tempfiles;

pub use engine::{EngineConfig, REngine};
pub use script::{
    BiasMethod, FOREST_PLOT_HEIGHT_PX, FOREST_PLOT_WIDTH_PX, FUNNEL_PLOT_SIZE_PX,
    ForestPlotOptions, PLOT_DPI, RenderedScript,
};
pub use tempfiles::TempFileGuard;
