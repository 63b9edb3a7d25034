//! Binary entry point for the docent CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Dump the model of a package to stdout
//! docent src/mypackage
//!
//! # Analyze zope.interface-using code under a project name
//! docent --variant zope-interface --project-name myproj src/myproj
//!
//! # Write the dump to a file
//! docent --out model.json src/mypackage
//! ```
//!
//! Diagnostics go to stderr, one per line; the JSON model dump goes to
//! stdout or the `--out` file.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use docent::discover;
use docent::error::Error;
use docent::output::ModelDump;
use docent::{System, ZopeInterfaceExtension};

// ============================================================================
// CLI Structure
// ============================================================================

/// Static documentation model extractor for Python packages.
///
/// Docent parses the given files, package directories or source roots,
/// builds the documentable-entity model, and writes it as JSON.
#[derive(Parser, Debug)]
#[command(name = "docent", version, about = "Extract a documentation model from Python sources")]
struct Cli {
    /// Project name recorded in the dump.
    #[arg(long)]
    project_name: Option<String>,

    /// Which idiom recognizers to run.
    #[arg(long, value_enum, default_value = "basic")]
    variant: Variant,

    /// Write the JSON dump here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Files, package directories or source roots to analyze.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

/// System variant selecting the extension set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Core Python semantics only.
    #[default]
    Basic,
    /// Core semantics plus zope.interface / zope.schema recognizers.
    ZopeInterface,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("docent: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Error> {
    let mut system = match cli.variant {
        Variant::Basic => System::new(),
        Variant::ZopeInterface => System::with_extension(Arc::new(ZopeInterfaceExtension)),
    };
    if let Some(name) = cli.project_name {
        system.options.project_name = name;
    }

    for path in &cli.paths {
        discover::add_tree(&mut system, path)?;
    }
    system.process_all();

    for diagnostic in &system.diagnostics {
        eprintln!("{diagnostic}");
    }

    let text = ModelDump::from_system(&system).render()?;
    match cli.out {
        Some(path) => std::fs::write(&path, text).map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?,
        None => {
            print!("{text}");
            let _ = io::stdout().flush();
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn parse_defaults() {
            let cli = Cli::try_parse_from(["docent", "src/pkg"]).unwrap();
            assert!(cli.project_name.is_none());
            assert!(matches!(cli.variant, Variant::Basic));
            assert!(cli.out.is_none());
            assert!(matches!(cli.log_level, LogLevel::Warn));
            assert_eq!(cli.paths, vec![PathBuf::from("src/pkg")]);
        }

        #[test]
        fn parse_zope_variant() {
            let cli =
                Cli::try_parse_from(["docent", "--variant", "zope-interface", "pkg"]).unwrap();
            assert!(matches!(cli.variant, Variant::ZopeInterface));
        }

        #[test]
        fn parse_out_and_project_name() {
            let cli = Cli::try_parse_from([
                "docent",
                "--project-name",
                "myproj",
                "--out",
                "model.json",
                "a.py",
                "b.py",
            ])
            .unwrap();
            assert_eq!(cli.project_name.as_deref(), Some("myproj"));
            assert_eq!(cli.out, Some(PathBuf::from("model.json")));
            assert_eq!(cli.paths.len(), 2);
        }

        #[test]
        fn paths_are_required() {
            assert!(Cli::try_parse_from(["docent"]).is_err());
        }

        #[test]
        fn parse_log_level() {
            let cli = Cli::try_parse_from(["docent", "--log-level", "debug", "p"]).unwrap();
            assert!(matches!(cli.log_level, LogLevel::Debug));
        }
    }
}
