//! End-to-end runs of the check pipeline over units on disk.

use spawnguard_analyzer::analysis::ast::Unit;
use spawnguard_analyzer::testing::*;
use spawnguard_analyzer::AnalyzerOptions;
use spawnguard_cli::check::{archive_path, load_units, read_facts, run_check, CheckOptions, CliError};
use spawnguard_cli::config::OutputFormat;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("spawnguard-cli-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_unit(dir: &PathBuf, unit: &Unit) -> PathBuf {
    let path = dir.join(format!("{}.json", unit.module.replace('/', "_")));
    std::fs::write(&path, serde_json::to_string_pretty(unit).unwrap()).unwrap();
    path
}

fn options(format: OutputFormat, facts_dir: Option<PathBuf>) -> CheckOptions {
    CheckOptions { analyzer: AnalyzerOptions::default(), format, facts_dir }
}

fn lib_unit() -> Unit {
    unit("lib", vec![function("serve", vec![guard(), risky()]), function("leak", vec![risky()])], vec![])
}

fn app_unit() -> Unit {
    let mut app = unit(
        "app",
        vec![function(
            "main",
            vec![spawn_at(func_ref("lib", "serve"), 4), spawn_at(func_ref("lib", "leak"), 5)],
        )],
        vec![],
    );
    app.imports = vec!["lib".into()];
    app
}

#[test]
fn check_reports_plain_diagnostics() {
    let dir = scratch_dir("plain");
    let paths = vec![write_unit(&dir, &app_unit()), write_unit(&dir, &lib_unit())];
    let units = load_units(&paths).unwrap();

    let mut out = Vec::new();
    let summary = run_check(&units, &options(OutputFormat::Plain, None), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(summary.units, 2);
    assert_eq!(summary.spawns, 2);
    assert_eq!(summary.diagnostics, 1);
    assert!(!summary.is_success());
    assert!(text.contains("error[SG001]: spawned task does not install a fault guard"));
    assert!(text.contains("app/main.go:5:2"));
    assert!(!text.contains("app/main.go:4:2"));
}

#[test]
fn check_emits_one_json_line_per_finding() {
    let dir = scratch_dir("json");
    let paths = vec![write_unit(&dir, &lib_unit()), write_unit(&dir, &app_unit())];
    let units = load_units(&paths).unwrap();

    let mut out = Vec::new();
    run_check(&units, &options(OutputFormat::Json, None), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["code"], "SG001");
    assert_eq!(value["file"], "app/main.go");
}

#[test]
fn facts_persist_across_invocations() {
    let dir = scratch_dir("facts");
    let facts_dir = dir.join("facts");

    // first run: the library alone
    let lib_paths = vec![write_unit(&dir, &lib_unit())];
    let units = load_units(&lib_paths).unwrap();
    let summary = run_check(&units, &options(OutputFormat::Plain, Some(facts_dir.clone())), &mut Vec::new()).unwrap();
    assert_eq!(summary.written, vec![archive_path(&facts_dir, "lib")]);

    let (module, entries) = read_facts(&archive_path(&facts_dir, "lib")).unwrap();
    assert_eq!(module, "lib");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0.name, "serve");

    // second run: the application, reusing the library's facts
    let app_paths = vec![write_unit(&dir, &app_unit())];
    let units = load_units(&app_paths).unwrap();
    let mut out = Vec::new();
    let summary = run_check(&units, &options(OutputFormat::Plain, Some(facts_dir.clone())), &mut out).unwrap();
    assert_eq!(summary.diagnostics, 1);
    assert!(summary.failed.is_empty());
}

#[test]
fn corrupt_archive_skips_the_importing_unit() {
    let dir = scratch_dir("corrupt");
    let facts_dir = dir.join("facts");
    std::fs::create_dir_all(&facts_dir).unwrap();
    std::fs::write(
        archive_path(&facts_dir, "lib"),
        r#"{"format":1,"module":"lib","entries":[{"callable":{"module":"lib","name":"serve","kind":"function"},"fact":"GuaranteedUnsafe"}]}"#,
    )
    .unwrap();

    let other = unit("other", vec![function("main", vec![spawn(func_lit(vec![risky()]))])], vec![]);
    let paths = vec![write_unit(&dir, &app_unit()), write_unit(&dir, &other)];
    let units = load_units(&paths).unwrap();

    let summary = run_check(&units, &options(OutputFormat::Plain, Some(facts_dir.clone())), &mut Vec::new()).unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "app");
    assert!(summary.failed[0].1.contains("GuaranteedUnsafe"));
    // the unrelated unit still ran
    assert_eq!(summary.diagnostics, 1);
    assert!(read_facts(&archive_path(&facts_dir, "lib")).is_err());
}

#[test]
fn unreadable_unit_is_an_error() {
    let dir = scratch_dir("bad-unit");
    let path = dir.join("broken.json");
    std::fs::write(&path, "{\"module\": [1, 2]}").unwrap();
    let err = load_units(&[path.clone()]).unwrap_err();
    assert!(matches!(err, CliError::Unit { .. }));
    assert!(err.to_string().contains("broken.json"));

    let missing = dir.join("missing.json");
    assert!(matches!(load_units(&[missing]), Err(CliError::Read { .. })));
}
