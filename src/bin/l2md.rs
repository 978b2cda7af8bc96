//! l2md - convert a LaTeX paper to Markdown for static-site publishing

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use paperdown::{
    utils::{CliDiagnostic, DiagnosticSeverity},
    ConversionOutput, L2MOptions, MarkdownConverter, StdFileResolver,
};
#[cfg(feature = "cli")]
use serde::Serialize;
#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, IsTerminal, Read, Write};
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "l2md")]
#[command(version)]
#[command(about = "paperdown - LaTeX paper to Markdown converter", long_about = None)]
struct Cli {
    /// Input file path (reads from stdin if not provided)
    input_file: Option<PathBuf>,

    /// Output file path (writes to stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON report with metadata and diagnostics to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// TOML file with conversion options; command line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not append the provenance footer
    #[arg(long)]
    no_footer: bool,

    /// Date substituted for \today (YYYY-MM-DD)
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<chrono::NaiveDate>,

    /// Exit with a non-zero status when the conversion produced warnings
    #[arg(long)]
    strict: bool,

    /// Disable colored diagnostics
    #[arg(long)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Exit status for a conversion that wrote output but has strict-mode warnings.
#[cfg(feature = "cli")]
const EXIT_STRICT: i32 = 2;

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct Report<'a> {
    input: Option<String>,
    output: Option<String>,
    #[serde(flatten)]
    result: &'a ConversionOutput,
}

#[cfg(feature = "cli")]
fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let options = match load_options(&cli) {
        Ok(options) => options,
        Err(message) => fail(&message),
    };

    // Read input
    let (input, resolver) = match cli.input_file {
        Some(ref path) => (
            fs::read_to_string(path)
                .unwrap_or_else(|e| fail(&format!("cannot read {}: {}", path.display(), e))),
            StdFileResolver::for_input_file(path),
        ),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            (buffer, StdFileResolver::new(std::env::current_dir()?))
        }
    };
    log::info!("resolving bibliography files from {}", resolver.base().display());

    let strict = options.strict;
    let result = match MarkdownConverter::with_options(&resolver, options).convert(&input) {
        Ok(result) => result,
        Err(err) => fail(&err.to_string()),
    };

    // Write output
    match cli.output {
        Some(ref path) => {
            fs::write(path, &result.content)?;
            log::info!("wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(result.content.as_bytes())?;
            stdout.flush()?;
        }
    }

    let color = !cli.no_color && io::stderr().is_terminal();
    write_diagnostics(&mut io::stderr().lock(), &result, color)?;

    if let Some(ref path) = cli.report {
        let report = Report {
            input: cli.input_file.as_deref().map(display_path),
            output: cli.output.as_deref().map(display_path),
            result: &result,
        };
        let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
        fs::write(path, json)?;
        log::info!("wrote report {}", path.display());
    }

    if strict && result.actionable_warnings().next().is_some() {
        std::process::exit(EXIT_STRICT);
    }
    Ok(())
}

/// `-v` raises the level from `warn`; `RUST_LOG` overrides both.
#[cfg(feature = "cli")]
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Options from `--config` (when given) with command line flags applied on top.
#[cfg(feature = "cli")]
fn load_options(cli: &Cli) -> Result<L2MOptions, String> {
    let mut options = match cli.config {
        Some(ref path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
            toml::from_str::<L2MOptions>(&text)
                .map_err(|e| format!("invalid config {}: {}", path.display(), e))?
        }
        None => L2MOptions::default(),
    };
    if cli.no_footer {
        options.footer = false;
    }
    if let Some(today) = cli.today {
        options.today = Some(today);
    }
    if cli.strict {
        options.strict = true;
    }
    Ok(options)
}

#[cfg(feature = "cli")]
fn write_diagnostics<W: Write>(
    out: &mut W,
    result: &ConversionOutput,
    color: bool,
) -> io::Result<()> {
    for warning in &result.warnings {
        let diag = CliDiagnostic::from(warning.clone());
        let label = match diag.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Info => "info",
        };
        if color {
            writeln!(out, "{}{}\x1b[0m: {}", diag.color_code(), label, diag)?;
        } else {
            writeln!(out, "{}: {}", label, diag)?;
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn display_path(path: &Path) -> String {
    path.display().to_string()
}

/// Fatal error: message on stderr, no output, exit status 1.
#[cfg(feature = "cli")]
fn fail(message: &str) -> ! {
    eprintln!("l2md: error: {}", message);
    std::process::exit(1);
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  cargo install paperdown --features cli");
    eprintln!("  l2md [OPTIONS] [INPUT_FILE]");
}
