//! Engine script generation.
//!
//! Each procedure is a fixed R template with named `{{slots}}`. Rendering is
//! one well-defined step: the request payload is serialized with serde_json,
//! escaped into a single-quoted R string literal, and substituted into the
//! template. Data never touches the procedure body any other way.

use std::path::Path;

use serde::Serialize;

use crate::dataset::{AnalysisResult, Dataset, EffectMeasure, Model, Outcome, OutcomeType, Study};
use crate::error::Result;

use super::tempfiles::TempFileGuard;

/// Forest plot raster conventions.
pub const FOREST_PLOT_WIDTH_PX: u32 = 3000;
pub const FOREST_PLOT_HEIGHT_PX: u32 = 2000;
/// Funnel plot raster conventions.
pub const FUNNEL_PLOT_SIZE_PX: u32 = 2400;
/// Resolution for all generated plots.
pub const PLOT_DPI: u32 = 300;

/// Publication-bias methods the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasMethod {
    FunnelPlot,
    EggerTest,
    BeggTest,
    TrimFill,
}

impl BiasMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiasMethod::FunnelPlot => "funnel_plot",
            BiasMethod::EggerTest => "egger_test",
            BiasMethod::BeggTest => "begg_test",
            BiasMethod::TrimFill => "trim_fill",
        }
    }
}

/// Options for forest plot rendering.
#[derive(Debug, Clone)]
pub struct ForestPlotOptions {
    pub output_path: std::path::PathBuf,
    pub confidence_level: f64,
}

impl ForestPlotOptions {
    pub fn new(output_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            confidence_level: 0.95,
        }
    }
}

/// A procedure script ready for execution: the body, the reserved script
/// path, and the reserved result path when the procedure writes one.
#[derive(Debug)]
pub struct RenderedScript {
    procedure: &'static str,
    body: String,
    script_file: TempFileGuard,
    result_file: Option<TempFileGuard>,
}

impl RenderedScript {
    /// Wrap an already complete script body. Used directly by tests and by
    /// the procedure constructors below.
    pub fn new(procedure: &'static str, body: String, result_file: Option<TempFileGuard>) -> Self {
        Self {
            procedure,
            body,
            script_file: TempFileGuard::new(procedure, "R"),
            result_file,
        }
    }

    pub fn procedure(&self) -> &'static str {
        self.procedure
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn script_path(&self) -> &Path {
        self.script_file.path()
    }

    pub fn result_path(&self) -> Option<&Path> {
        self.result_file.as_ref().map(|g| g.path())
    }
}

/// Escape a string for inclusion in a single-quoted R literal.
fn escape_single_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Substitute named `{{slots}}` in a template body.
fn render(template: &str, slots: &[(&str, &str)]) -> String {
    let mut body = template.to_string();
    for (name, value) in slots {
        body = body.replace(&format!("{{{{{name}}}}}"), value);
    }
    body
}

fn payload_slot(payload: &impl Serialize) -> Result<String> {
    Ok(escape_single_quoted(&serde_json::to_string(payload)?))
}

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    effect_measure: EffectMeasure,
    model: Model,
    outcome_type: OutcomeType,
    studies: &'a [Study],
    outcomes: &'a [Outcome],
}

#[derive(Serialize)]
struct ForestPlotRequest<'a> {
    analysis: &'a AnalysisResult,
    output_path: &'a str,
    confidence_level: f64,
    width_px: u32,
    height_px: u32,
    dpi: u32,
}

#[derive(Serialize)]
struct BiasRequest<'a> {
    analysis: &'a AnalysisResult,
    methods: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    funnel_path: Option<&'a str>,
    funnel_size_px: u32,
    dpi: u32,
}

#[derive(Serialize)]
struct ProbeRequest<'a> {
    packages: &'a [&'a str],
}

const META_ANALYSIS_TEMPLATE: &str = r#"library(metafor)
library(jsonlite)

input <- fromJSON('{{input_json}}', simplifyDataFrame = TRUE)
outcomes <- input$outcomes
measure <- input$effect_measure

if (input$outcome_type == "binary") {
  es <- escalc(measure = measure,
               ai = outcomes$events_treatment, n1i = outcomes$n_treatment,
               ci = outcomes$events_control, n2i = outcomes$n_control)
} else {
  es <- escalc(measure = measure,
               m1i = outcomes$mean_treatment, sd1i = outcomes$sd_treatment,
               n1i = outcomes$n_treatment,
               m2i = outcomes$mean_control, sd2i = outcomes$sd_control,
               n2i = outcomes$n_control)
}

method <- if (input$model == "fixed") "FE" else "REML"
fit <- rma(yi = es$yi, vi = es$vi, method = method)

is_ratio <- measure %in% c("OR", "RR", "HR")
tr <- function(x) if (is_ratio) exp(x) else x
w <- weights(fit)

study_effects <- lapply(seq_len(nrow(outcomes)), function(i) {
  half <- 1.96 * sqrt(es$vi[i])
  list(
    study_id = outcomes$study_id[i],
    effect_size = list(
      estimate = tr(es$yi[i]),
      lower_ci = tr(es$yi[i] - half),
      upper_ci = tr(es$yi[i] + half),
      weight = w[i]
    )
  )
})

result <- list(
  effect_measure = measure,
  model = input$model,
  pooled_effect = list(
    estimate = tr(as.numeric(fit$b)),
    lower_ci = tr(fit$ci.lb),
    upper_ci = tr(fit$ci.ub),
    p_value = fit$pval
  ),
  heterogeneity = list(
    I2 = fit$I2,
    Q = fit$QE,
    df = fit$k - 1,
    p_value = fit$QEp,
    tau2 = fit$tau2
  ),
  study_effects = study_effects,
  n_studies = length(unique(outcomes$study_id)),
  n_participants = sum(outcomes$n_treatment) + sum(outcomes$n_control)
)

write_json(result, '{{result_path}}', auto_unbox = TRUE, digits = 10)
"#;

const FOREST_PLOT_TEMPLATE: &str = r#"library(metafor)
library(jsonlite)

input <- fromJSON('{{input_json}}', simplifyDataFrame = FALSE)
analysis <- input$analysis
effects <- analysis$study_effects

estimates <- sapply(effects, function(x) x$effect_size$estimate)
lower_ci <- sapply(effects, function(x) x$effect_size$lower_ci)
upper_ci <- sapply(effects, function(x) x$effect_size$upper_ci)
weights <- sapply(effects, function(x) {
  if (is.null(x$effect_size$weight)) 1 else x$effect_size$weight
})
study_ids <- sapply(effects, function(x) x$study_id)

png(input$output_path, width = input$width_px, height = input$height_px,
    res = input$dpi)
par(mar = c(5, 10, 4, 2))

forest(
  x = estimates,
  ci.lb = lower_ci,
  ci.ub = upper_ci,
  slab = study_ids,
  xlab = paste0(analysis$effect_measure,
                " (", input$confidence_level * 100, "% CI)"),
  main = "Forest Plot",
  refline = ifelse(analysis$effect_measure %in% c("OR", "RR", "HR"), 1, 0),
  pch = 19,
  psize = sqrt(weights),
  cex = 0.8
)

addpoly(
  x = analysis$pooled_effect$estimate,
  ci.lb = analysis$pooled_effect$lower_ci,
  ci.ub = analysis$pooled_effect$upper_ci,
  row = -1,
  mlab = paste(analysis$model, "effects model"),
  cex = 0.9
)

dev.off()

write_json(list(success = TRUE, output_path = input$output_path),
           '{{result_path}}', auto_unbox = TRUE)
"#;

const PUBLICATION_BIAS_TEMPLATE: &str = r#"library(metafor)
library(jsonlite)

input <- fromJSON('{{input_json}}', simplifyDataFrame = FALSE)
analysis <- input$analysis
effects <- analysis$study_effects

n_studies <- length(effects)
estimates <- sapply(effects, function(x) x$effect_size$estimate)
lower_ci <- sapply(effects, function(x) x$effect_size$lower_ci)
upper_ci <- sapply(effects, function(x) x$effect_size$upper_ci)
se <- (upper_ci - lower_ci) / (2 * 1.96)

insufficient <- function(name) {
  list(error = paste0("Insufficient studies for ", name,
                      " (minimum 3 required)"))
}

bias_results <- list()

if ("funnel_plot" %in% input$methods && !is.null(input$funnel_path)) {
  png(input$funnel_path, width = input$funnel_size_px,
      height = input$funnel_size_px, res = input$dpi)
  funnel(estimates, se,
         xlab = analysis$effect_measure,
         ylab = "Standard Error",
         main = "Funnel Plot for Publication Bias Assessment")
  dev.off()
  bias_results$funnel_plot <- list(generated = TRUE, path = input$funnel_path)
}

if ("egger_test" %in% input$methods) {
  if (n_studies >= 3) {
    egger <- regtest(estimates, sei = se, model = "rma")
    bias_results$egger_test <- list(
      intercept = as.numeric(egger$fit$b[1]),
      p_value = egger$pval
    )
  } else {
    bias_results$egger_test <- insufficient("Egger's test")
  }
}

if ("begg_test" %in% input$methods) {
  if (n_studies >= 3) {
    begg <- ranktest(estimates, sei = se)
    bias_results$begg_test <- list(
      tau = begg$tau,
      p_value = begg$pval
    )
  } else {
    bias_results$begg_test <- insufficient("Begg's test")
  }
}

if ("trim_fill" %in% input$methods) {
  if (n_studies >= 3) {
    res <- rma(yi = estimates, sei = se)
    tf <- trimfill(res)
    bias_results$trim_fill <- list(
      n_missing = tf$k0,
      adjusted_effect = list(
        estimate = as.numeric(tf$b[1]),
        lower_ci = tf$ci.lb[1],
        upper_ci = tf$ci.ub[1]
      )
    )
  } else {
    bias_results$trim_fill <- insufficient("trim-and-fill")
  }
}

write_json(bias_results, '{{result_path}}', auto_unbox = TRUE, digits = 10)
"#;

const PACKAGE_PROBE_TEMPLATE: &str = r#"library(jsonlite)

input <- fromJSON('{{input_json}}')
available <- lapply(input$packages, function(p) {
  requireNamespace(p, quietly = TRUE)
})
names(available) <- input$packages

write_json(available, '{{result_path}}', auto_unbox = TRUE)
"#;

/// Pooled-effect estimation for a dataset.
pub fn meta_analysis(
    dataset: &Dataset,
    effect_measure: EffectMeasure,
    model: Model,
) -> Result<RenderedScript> {
    let request = AnalysisRequest {
        effect_measure,
        model,
        outcome_type: dataset.outcome_type,
        studies: &dataset.studies,
        outcomes: &dataset.outcomes,
    };
    let result_file = TempFileGuard::new("meta_analysis_result", "json");
    let body = render(
        META_ANALYSIS_TEMPLATE,
        &[
            ("input_json", payload_slot(&request)?.as_str()),
            ("result_path", &result_file.path().to_string_lossy()),
        ],
    );
    Ok(RenderedScript::new("meta_analysis", body, Some(result_file)))
}

/// Forest plot rendering at the caller-specified path.
pub fn forest_plot(
    analysis: &AnalysisResult,
    options: &ForestPlotOptions,
) -> Result<RenderedScript> {
    let output_path = options.output_path.to_string_lossy();
    let request = ForestPlotRequest {
        analysis,
        output_path: &output_path,
        confidence_level: options.confidence_level,
        width_px: FOREST_PLOT_WIDTH_PX,
        height_px: FOREST_PLOT_HEIGHT_PX,
        dpi: PLOT_DPI,
    };
    let result_file = TempFileGuard::new("forest_plot_result", "json");
    let body = render(
        FOREST_PLOT_TEMPLATE,
        &[
            ("input_json", payload_slot(&request)?.as_str()),
            ("result_path", &result_file.path().to_string_lossy()),
        ],
    );
    Ok(RenderedScript::new("forest_plot", body, Some(result_file)))
}

/// Publication-bias tests, with an optional funnel plot.
pub fn publication_bias(
    analysis: &AnalysisResult,
    methods: &[BiasMethod],
    funnel_path: Option<&Path>,
) -> Result<RenderedScript> {
    let funnel = funnel_path.map(|p| p.to_string_lossy().into_owned());
    let request = BiasRequest {
        analysis,
        methods: methods.iter().map(BiasMethod::as_str).collect(),
        funnel_path: funnel.as_deref(),
        funnel_size_px: FUNNEL_PLOT_SIZE_PX,
        dpi: PLOT_DPI,
    };
    let result_file = TempFileGuard::new("publication_bias_result", "json");
    let body = render(
        PUBLICATION_BIAS_TEMPLATE,
        &[
            ("input_json", payload_slot(&request)?.as_str()),
            ("result_path", &result_file.path().to_string_lossy()),
        ],
    );
    Ok(RenderedScript::new("publication_bias", body, Some(result_file)))
}

/// Probe whether the named add-on packages are importable.
pub fn package_probe(packages: &[&str]) -> Result<RenderedScript> {
    let request = ProbeRequest { packages };
    let result_file = TempFileGuard::new("package_probe_result", "json");
    let body = render(
        PACKAGE_PROBE_TEMPLATE,
        &[
            ("input_json", payload_slot(&request)?.as_str()),
            ("result_path", &result_file.path().to_string_lossy()),
        ],
    );
    Ok(RenderedScript::new("package_probe", body, Some(result_file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{BinaryOutcome, OutcomeType, Study};

    fn dataset() -> Dataset {
        Dataset {
            studies: vec![Study {
                id: "o'brien 2015".to_string(),
                authors: "O'Brien et al.".to_string(),
                year: 2015,
                title: "Trial".to_string(),
                journal: None,
                doi: None,
            }],
            outcomes: vec![Outcome::Binary(BinaryOutcome {
                study_id: "o'brien 2015".to_string(),
                events_treatment: 5,
                n_treatment: 50,
                events_control: 8,
                n_control: 50,
            })],
            outcome_type: OutcomeType::Binary,
            outcome_name: "Mortality".to_string(),
            intervention: "Drug A".to_string(),
            comparison: "Placebo".to_string(),
        }
    }

    #[test]
    fn test_escape_single_quoted() {
        assert_eq!(escape_single_quoted(r"a'b\c"), r"a\'b\\c");
    }

    #[test]
    fn test_meta_analysis_script_embeds_escaped_payload() {
        let script = meta_analysis(&dataset(), EffectMeasure::OR, Model::Random).unwrap();
        assert!(script.body().contains(r"o\'brien 2015"));
        assert!(!script.body().contains("{{input_json}}"));
        assert!(!script.body().contains("{{result_path}}"));
        let result_path = script.result_path().unwrap().to_string_lossy().into_owned();
        assert!(script.body().contains(&result_path));
    }

    #[test]
    fn test_probe_script_lists_packages() {
        let script = package_probe(&["metafor", "meta"]).unwrap();
        assert!(script.body().contains("metafor"));
        assert!(script.procedure() == "package_probe");
    }

    #[test]
    fn test_distinct_script_paths() {
        let a = meta_analysis(&dataset(), EffectMeasure::OR, Model::Fixed).unwrap();
        let b = meta_analysis(&dataset(), EffectMeasure::OR, Model::Fixed).unwrap();
        assert_ne!(a.script_path(), b.script_path());
        assert_ne!(a.result_path(), b.result_path());
    }
}
