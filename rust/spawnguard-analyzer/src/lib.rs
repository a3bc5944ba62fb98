//! Spawnguard Analyzer
//!
//! Reports spawned tasks that do not install their own fault guard. Input is
//! a type-checked compilation unit (see [`analysis::ast`]); output is one
//! diagnostic per offending spawn statement plus the safety facts other units
//! may import.

pub mod analysis;
pub mod diagnostics;
pub mod session;
pub mod testing;

use analysis::ast::Unit;
use analysis::facts::FactError;
use analysis::guard::DEFAULT_FAULT_CAPTURE;
use serde::{Deserialize, Serialize};
use session::{Session, UnitReport};

use thiserror::Error;

// ── Analyzer options ────────────────────────────────────────────────

/// Options for one analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// Name of the builtin that absorbs an in-flight fault. Default: `recover`.
    pub fault_capture: String,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self { fault_capture: DEFAULT_FAULT_CAPTURE.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot import facts for module '{module}': {source}")]
    FactImport {
        module: String,
        #[source]
        source: FactError,
    },
    #[error("import cycle between units: {}", .0.join(", "))]
    ImportCycle(Vec<String>),
    #[error("module '{0}' is provided by more than one unit")]
    DuplicateUnit(String),
    #[error("invalid unit: {0}")]
    Unit(#[from] serde_json::Error),
}

/// Decode one unit from its JSON form.
pub fn parse_unit(text: &str) -> Result<Unit, AnalysisError> {
    Ok(serde_json::from_str(text)?)
}

/// Analyze a single self-contained unit with a fresh fact store.
pub fn analyze(unit: &Unit, options: &AnalyzerOptions) -> UnitReport {
    let mut session = Session::new(options.clone());
    session.analyze_unit(unit)
}
