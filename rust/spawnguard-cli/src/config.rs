//! Configuration file parsing for `spawnguard.toml`.
//!
//! Searches the current directory then its ancestors; defaults apply when no
//! file is found.

use serde::{Deserialize, Serialize};
use spawnguard_analyzer::AnalyzerOptions;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "spawnguard.toml";
pub const DEFAULT_LOG_FILTER: &str = "spawnguard=warn";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct SpawnguardConfig {
    #[serde(default)]
    pub analysis: AnalyzerOptions,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct OutputSection {
    #[serde(default)]
    pub format: OutputFormat,
    /// Directory holding one fact archive per analysed module
    #[serde(default)]
    pub facts_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Ansi,
    Plain,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogSection {
    /// `tracing` filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl SpawnguardConfig {
    /// Load `spawnguard.toml`, searching the current dir then parents.
    /// Returns the defaults and no path when no file exists.
    pub fn load() -> Result<(Option<PathBuf>, Self), String> {
        match Self::find() {
            Some(path) => Self::load_from(&path).map(|cfg| (Some(path), cfg)),
            None => Ok((None, Self::default())),
        }
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("invalid toml in '{}': {}", path.display(), e))
    }

    fn find() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Parse a TOML string directly (useful for testing and embedding).
    pub fn from_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Generate a default `spawnguard.toml` template.
    pub fn default_template() -> &'static str {
        r#"# Spawnguard Configuration

[analysis]
# Builtin that absorbs an in-flight fault inside a deferred guard
fault_capture = "recover"

[output]
# ansi | plain | json
format = "ansi"
# Fact archives are read from and written to this directory
# facts_dir = ".spawnguard/facts"

[log]
# Used when RUST_LOG is unset
filter = "spawnguard=warn"
"#
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_returns_default() {
        let cfg = SpawnguardConfig::from_str("").unwrap();
        assert_eq!(cfg, SpawnguardConfig::default());
        assert_eq!(cfg.analysis.fault_capture, "recover");
        assert_eq!(cfg.output.format, OutputFormat::Ansi);
        assert_eq!(cfg.log.filter, DEFAULT_LOG_FILTER);
        assert!(cfg.output.facts_dir.is_none());
    }

    #[test]
    fn parse_full_config() {
        let cfg = SpawnguardConfig::from_str(
            r#"
[analysis]
fault_capture = "rescue"

[output]
format = "json"
facts_dir = "build/facts"

[log]
filter = "spawnguard_analyzer=debug"
"#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.fault_capture, "rescue");
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert_eq!(cfg.output.facts_dir, Some(PathBuf::from("build/facts")));
        assert_eq!(cfg.log.filter, "spawnguard_analyzer=debug");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = SpawnguardConfig::from_str("[output]\nformat = \"plain\"\n").unwrap();
        assert_eq!(cfg.output.format, OutputFormat::Plain);
        assert_eq!(cfg.analysis.fault_capture, "recover");
        assert_eq!(cfg.log.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(SpawnguardConfig::from_str("[output\nformat = ").is_err());
        assert!(SpawnguardConfig::from_str("[output]\nformat = \"html\"\n").is_err());
    }

    #[test]
    fn default_template_round_trips() {
        let cfg = SpawnguardConfig::from_str(SpawnguardConfig::default_template()).unwrap();
        assert_eq!(cfg, SpawnguardConfig::default());
    }

    #[test]
    fn load_from_missing_file_names_path() {
        let err = SpawnguardConfig::load_from(Path::new("/nonexistent/spawnguard.toml")).unwrap_err();
        assert!(err.contains("/nonexistent/spawnguard.toml"));
    }
}
