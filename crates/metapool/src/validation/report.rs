//! Validation report types.

use serde::{Deserialize, Serialize};

/// How deep the rule engine should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Structural requirements only.
    Basic,
    /// Structural requirements plus quality, statistical and
    /// Cochrane-completeness checks.
    #[default]
    Comprehensive,
}

/// Methodological findings for a dataset.
///
/// This is data, never an error channel: a dataset that fails every check
/// still produces a fully populated report, and `valid` reflects only the
/// presence of errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn suggest(&mut self, message: impl Into<String>) {
        self.suggestions.push(message.into());
    }

    /// Recompute `valid` from the collected errors.
    pub fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tracks_errors_only() {
        let mut report = ValidationResult::new();
        report.warn("a warning");
        report.suggest("a suggestion");
        let report = report.finish();
        assert!(report.valid);

        let mut report = ValidationResult::new();
        report.error("an error");
        let report = report.finish();
        assert!(!report.valid);
    }
}
