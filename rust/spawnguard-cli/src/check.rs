//! `spawnguard check` and `spawnguard facts`.

use crate::config::OutputFormat;
use spawnguard_analyzer::analysis::ast::Unit;
use spawnguard_analyzer::analysis::facts::{CallableId, FactArchive, FactError, SafetyFact};
use spawnguard_analyzer::diagnostics::spawn_diagnostics;
use spawnguard_analyzer::session::Session;
use spawnguard_analyzer::{parse_unit, AnalysisError, AnalyzerOptions};

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Unit {
        path: PathBuf,
        #[source]
        source: AnalysisError,
    },
    #[error("{}: {source}", path.display())]
    Facts {
        path: PathBuf,
        #[source]
        source: FactError,
    },
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub analyzer: AnalyzerOptions,
    pub format: OutputFormat,
    pub facts_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct CheckSummary {
    pub units: usize,
    pub spawns: usize,
    pub diagnostics: usize,
    /// Units skipped because their imported facts could not be loaded
    pub failed: Vec<(String, String)>,
    /// Fact archives written to the facts directory
    pub written: Vec<PathBuf>,
}

impl CheckSummary {
    pub fn is_success(&self) -> bool {
        self.diagnostics == 0 && self.failed.is_empty()
    }
}

/// Read and decode unit files, in the order given.
pub fn load_units(paths: &[PathBuf]) -> Result<Vec<Unit>, CliError> {
    paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .map_err(|source| CliError::Read { path: path.clone(), source })?;
            parse_unit(&text).map_err(|source| CliError::Unit { path: path.clone(), source })
        })
        .collect()
}

/// File holding the archive of `module` inside `dir`.
pub fn archive_path(dir: &Path, module: &str) -> PathBuf {
    dir.join(format!("{}.facts.json", module.replace('/', "__")))
}

/// Archive of `module` from `dir`, or `None` when none was written.
pub fn load_archive(dir: &Path, module: &str) -> Result<Option<FactArchive>, FactError> {
    let path = archive_path(dir, module);
    if !path.is_file() {
        debug!(module, path = %path.display(), "no fact archive");
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    FactArchive::from_json(&text).map(Some)
}

/// Analyse `units` in dependency order and render diagnostics to `out`.
pub fn run_check(units: &[Unit], options: &CheckOptions, out: &mut dyn Write) -> Result<CheckSummary, CliError> {
    let mut session = Session::new(options.analyzer.clone());
    let outcomes = session.analyze_all(units, |module| match &options.facts_dir {
        Some(dir) => load_archive(dir, module),
        None => Ok(None),
    })?;

    let mut summary = CheckSummary { units: units.len(), ..CheckSummary::default() };
    for outcome in outcomes {
        let report = match outcome.result {
            Ok(report) => report,
            Err(err) => {
                summary.failed.push((outcome.module, err.to_string()));
                continue;
            }
        };
        summary.spawns += report.spawns;
        summary.diagnostics += report.findings.len();

        let unit = &units[outcome.index];
        for diag in spawn_diagnostics(unit, &report.findings, &options.analyzer.fault_capture) {
            match options.format {
                OutputFormat::Ansi => write!(out, "{}", diag.render_ansi())?,
                OutputFormat::Plain => write!(out, "{}", diag.render_plain())?,
                OutputFormat::Json => {
                    let line = diag.render_json().map_err(std::io::Error::from)?;
                    writeln!(out, "{}", line)?;
                }
            }
        }

        if let Some(dir) = &options.facts_dir {
            let path = write_archive(dir, &session.export_archive(&report.module))?;
            summary.written.push(path);
        }
    }

    Ok(summary)
}

fn write_archive(dir: &Path, archive: &FactArchive) -> Result<PathBuf, CliError> {
    std::fs::create_dir_all(dir).map_err(|source| CliError::Write { path: dir.to_path_buf(), source })?;
    let path = archive_path(dir, &archive.module);
    let json = archive
        .to_json()
        .map_err(|source| CliError::Facts { path: path.clone(), source })?;
    std::fs::write(&path, json).map_err(|source| CliError::Write { path: path.clone(), source })?;
    Ok(path)
}

/// Decode every entry of the archive at `path`.
pub fn read_facts(path: &Path) -> Result<(String, Vec<(CallableId, SafetyFact)>), CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let facts = |source| CliError::Facts { path: path.to_path_buf(), source };
    let archive = FactArchive::from_json(&text).map_err(facts)?;
    let entries = archive.decode().map_err(facts)?;
    Ok((archive.module, entries))
}
