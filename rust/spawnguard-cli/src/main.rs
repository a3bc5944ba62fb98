//! Spawnguard CLI, the command-line interface for the spawn guard analyzer.

use clap::{Parser as ClapParser, Subcommand};
use spawnguard_cli::check::{self, CheckOptions};
use spawnguard_cli::colors::{bold, gray, green, red, status_label};
use spawnguard_cli::config::{OutputFormat, SpawnguardConfig, CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "spawnguard", version, about = "Report spawned tasks that do not install a fault guard")]
struct Cli {
    /// Use this config file instead of searching for spawnguard.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse type-checked units (JSON) and report unguarded spawns
    Check {
        /// Unit files, in any order
        #[arg(required = true)]
        units: Vec<PathBuf>,

        /// Output format for diagnostics
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Directory to read imported fact archives from and write new ones to
        #[arg(long)]
        facts_dir: Option<PathBuf>,

        /// Name of the fault-capture builtin
        #[arg(long)]
        fault_capture: Option<String>,
    },
    /// List the facts stored in an archive
    Facts {
        #[arg()]
        archive: PathBuf,
    },
    /// Create a spawnguard.toml in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    init_logging(&config.log.filter);

    match cli.command {
        Commands::Check {
            units,
            format,
            facts_dir,
            fault_capture,
        } => {
            let mut options = CheckOptions {
                analyzer: config.analysis,
                format: config.output.format,
                facts_dir: config.output.facts_dir,
            };
            if let Some(format) = format {
                options.format = format;
            }
            if facts_dir.is_some() {
                options.facts_dir = facts_dir;
            }
            if let Some(name) = fault_capture {
                options.analyzer.fault_capture = name;
            }
            cmd_check(&units, &options)
        }
        Commands::Facts { archive } => cmd_facts(&archive),
        Commands::Init => cmd_init(),
    }
}

fn load_config(explicit: Option<&Path>) -> SpawnguardConfig {
    let loaded = match explicit {
        Some(path) => SpawnguardConfig::load_from(path),
        None => SpawnguardConfig::load().map(|(_path, cfg)| cfg),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("{} {}", red("error:"), e);
        std::process::exit(1);
    })
}

/// `RUST_LOG` wins over the configured filter.
fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_check(paths: &[PathBuf], options: &CheckOptions) {
    let units = check::load_units(paths).unwrap_or_else(|e| {
        eprintln!("{} {}", red("error:"), e);
        std::process::exit(1);
    });

    let result = match options.format {
        OutputFormat::Json => check::run_check(&units, options, &mut std::io::stdout().lock()),
        OutputFormat::Ansi | OutputFormat::Plain => {
            check::run_check(&units, options, &mut std::io::stderr().lock())
        }
    };
    let summary = result.unwrap_or_else(|e| {
        eprintln!("{} {}", red("error:"), e);
        std::process::exit(1);
    });

    for (module, err) in &summary.failed {
        eprintln!("{} skipped {}: {}", red("error:"), bold(module), err);
    }
    for path in &summary.written {
        eprintln!("{} {}", status_label("Wrote"), path.display());
    }

    if !summary.is_success() {
        if options.format != OutputFormat::Json {
            eprintln!(
                "{} {} unguarded spawn(s), {} unit(s) skipped",
                red("error:"),
                summary.diagnostics,
                summary.failed.len()
            );
        }
        std::process::exit(1);
    }
    if options.format != OutputFormat::Json {
        println!(
            "{} {} {}",
            green("✓"),
            bold(&format!("{} unit(s)", summary.units)),
            gray(&format!("— {} spawn(s), no unguarded tasks", summary.spawns))
        );
    }
}

fn cmd_facts(path: &Path) {
    let (module, entries) = check::read_facts(path).unwrap_or_else(|e| {
        eprintln!("{} {}", red("error:"), e);
        std::process::exit(1);
    });
    println!("{} {} ({} fact(s))", status_label("Module"), bold(&module), entries.len());
    for (callable, fact) in entries {
        println!("  {} {}", callable, gray(&fact.to_string()));
    }
}

fn cmd_init() {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() {
        eprintln!("{} {} already exists — not overwriting", red("error:"), CONFIG_FILE);
        std::process::exit(1);
    }
    std::fs::write(&path, SpawnguardConfig::default_template()).unwrap_or_else(|e| {
        eprintln!("{} writing {}: {}", red("error:"), CONFIG_FILE, e);
        std::process::exit(1);
    });
    println!("{} {}", status_label("Created"), CONFIG_FILE);
}
