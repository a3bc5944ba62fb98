//! Rendered diagnostics with source snippets, colors, and suggestions.

use crate::analysis::ast::Unit;
use crate::analysis::validate::SpawnReport;
use serde::Serialize;

/// Stable code of the unguarded-spawn diagnostic.
pub const SPAWN_CODE: &str = "SG001";

/// Severity level for diagnostics. Every finding of the analyzer is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
        }
    }
}

/// A rendered diagnostic with source context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
    #[serde(skip)]
    pub underline: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Build the diagnostic for a flagged spawn. `source` is the text of the
    /// file the report points into, when available.
    pub fn from_spawn(report: &SpawnReport, source: Option<&str>, fault_capture: &str) -> Self {
        let located = !report.span.is_dummy();
        let (line, col) = if located { (Some(report.span.line), Some(report.span.col)) } else { (None, None) };

        let source_line = match (source, line) {
            (Some(src), Some(l)) => get_source_line(src, l),
            _ => None,
        };
        let underline = source_line.as_ref().map(|text| {
            let col = report.span.col.clamp(1, text.len() + 1);
            let rest = text.get(col - 1..).unwrap_or("").trim_end().chars().count();
            let extent = report.span.end.saturating_sub(report.span.start);
            let len = if extent > 0 { extent.min(rest.max(1)) } else { rest };
            make_underline(col, len)
        });

        Diagnostic {
            severity: Severity::Error,
            code: Some(SPAWN_CODE.to_string()),
            message: report.message.clone(),
            file: Some(report.file.clone()),
            line,
            col,
            source_line,
            underline,
            suggestions: vec![format!(
                "install a deferred guard that calls `{}` at the top of the spawned function",
                fault_capture
            )],
        }
    }

    /// Render with ANSI colors for terminal
    pub fn render_ansi(&self) -> String {
        self.render(true)
    }

    /// Render without colors (for logs, tests)
    pub fn render_plain(&self) -> String {
        self.render(false)
    }

    fn render(&self, color: bool) -> String {
        let paint = |style: fn(&str) -> String, text: &str| if color { style(text) } else { text.to_string() };
        let gutter = paint(cyan, "|");
        let mut out = String::new();

        // Header: error[SG001]: message
        out.push_str(&paint(red, self.severity.label()));
        if let Some(ref code) = self.code {
            out.push_str(&format!("[{}]", paint(bold, code)));
        }
        out.push_str(&format!(": {}\n", paint(bold, &self.message)));

        // Location: --> file:line:col
        if let Some(ref file) = self.file {
            let arrow = paint(cyan, "-->");
            match (self.line, self.col) {
                (Some(line), Some(col)) => out.push_str(&format!("  {} {}:{}:{}\n", arrow, file, line, col)),
                _ => out.push_str(&format!("  {} {}\n", arrow, file)),
            }
        }

        // Source line with underline
        if let (Some(line_num), Some(ref line_text), Some(ref underline)) =
            (self.line, &self.source_line, &self.underline)
        {
            let num = format!("{:>3}", line_num);
            out.push_str(&format!("   {}\n", gutter));
            out.push_str(&format!("{} {} {}\n", paint(cyan, &num), gutter, line_text));
            out.push_str(&format!("   {} {}\n", gutter, paint(red, underline)));
        }

        if !self.suggestions.is_empty() {
            out.push_str(&format!("   {}\n", gutter));
            for suggestion in &self.suggestions {
                out.push_str(&format!("   {} {}: {}\n", paint(cyan, "="), paint(cyan, "help"), suggestion));
            }
        }

        out
    }

    /// One-line JSON object for machine consumers.
    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Diagnostics for every finding of `unit`, in report order.
pub fn spawn_diagnostics(unit: &Unit, findings: &[SpawnReport], fault_capture: &str) -> Vec<Diagnostic> {
    findings
        .iter()
        .map(|report| {
            let source = unit
                .files
                .iter()
                .find(|f| f.path == report.file)
                .and_then(|f| f.source.as_deref());
            Diagnostic::from_spawn(report, source, fault_capture)
        })
        .collect()
}

// ── ANSI color helpers ──────────────────────────────────────────────

pub fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

pub fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

// Source line extraction
fn get_source_line(source: &str, line: usize) -> Option<String> {
    source.lines().nth(line.checked_sub(1)?).map(|s| s.to_string())
}

fn make_underline(col: usize, len: usize) -> String {
    format!("{}{}", " ".repeat(col.saturating_sub(1)), "^".repeat(len.max(1)))
}
