//! Configuration for the fixed-point interpreter.

/// Configuration for the fixed-point interpreter.
///
/// Controls the roots of the analysis, reporting of unavailable callees, and the budgets
/// that stop a run which does not converge.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Entry function; started with top arguments (default: none, every uncalled defined
    /// function is a root).
    pub entry: Option<String>,

    /// Log every unavailable callee once (default: true).
    pub report_missing: bool,

    /// Maximum function visits before the run gives up (default: 10 000).
    pub max_function_visits: usize,

    /// Maximum block passes of a single function visit (default: 1 000).
    pub max_block_passes: usize,

    /// Passes over a function before block inputs are widened (default: 8).
    pub widening_delay: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            entry: None,
            report_missing: true,
            max_function_visits: 10_000,
            max_block_passes: 1_000,
            widening_delay: 8,
        }
    }
}

impl InterpreterConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the analysis at `name`.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Delays widening so value sets built up over a few dozen passes stay exact.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            widening_delay: 64,
            max_block_passes: 10_000,
            ..Self::default()
        }
    }

    /// Small budgets and immediate widening, for large modules.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            report_missing: false,
            max_function_visits: 1_000,
            max_block_passes: 100,
            widening_delay: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = InterpreterConfig::default();
        assert!(default.report_missing);
        assert_eq!(default.widening_delay, 8);
        assert!(InterpreterConfig::precise().widening_delay > default.widening_delay);
        assert_eq!(InterpreterConfig::quick().widening_delay, 0);
        assert_eq!(
            InterpreterConfig::new().with_entry("main").entry.as_deref(),
            Some("main")
        );
    }
}
