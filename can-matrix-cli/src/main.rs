//! CAN Matrix CLI Application
//!
//! This is the command-line interface for the matrix to DBC converter.
//! It uses the can-matrix-dbc library and adds:
//! - Workbook reading (xlsx/xls/xlsm/ods)
//! - TOML configuration files
//! - Pre-generation validation and post-generation syntax checks
//! - JSON run summaries

use anyhow::{bail, Context, Result};
use can_matrix_dbc::{analyze, validate, Converter, MatrixTable, Severity, ValidationReport};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod report;
mod workbook;

use config::AppConfig;
use report::RunSummary;

/// CAN Matrix - Generate DBC files from a CAN communication matrix
#[derive(Parser, Debug)]
#[command(name = "can-matrix")]
#[command(about = "Generate one DBC file per CAN bus from a communication matrix workbook", long_about = None)]
#[command(version)]
struct Args {
    /// Communication matrix workbook (.xlsx, .xls, .xlsm, .ods)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output base path; files are named <base>_<Bus>.dbc (default: next to the input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Workbook password (protected workbooks cannot be decrypted; ignored)
    #[arg(short, long, value_name = "PASSWORD")]
    password: Option<String>,

    /// Only emit messages sent or received by this node (e.g. VCU_P)
    #[arg(short = 'n', long, value_name = "NODE")]
    node_type: Option<String>,

    /// Controller declared in every node list
    #[arg(short = 'c', long, value_name = "NAME")]
    controller_name: Option<String>,

    /// Only generate this bus (letter "P" or name "PCAN")
    #[arg(short = 'b', long, value_name = "BUS")]
    bus_type: Option<String>,

    /// Accept the CAN-FD DLC range (0-15)
    #[arg(long)]
    canfd: bool,

    /// Sheet holding the matrix (default: Matrix)
    #[arg(long, value_name = "NAME")]
    sheet: Option<String>,

    /// Path to configuration file (matrix.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a JSON run summary
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Abort before generation when validation finds errors
    #[arg(long)]
    strict: bool,

    /// Re-parse every written file and report malformed lines
    #[arg(long)]
    check_output: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Matrix CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using converter library v{}", can_matrix_dbc::VERSION);

    let app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let written = run(&args, merge_args(&args, app))?;
    Ok(if written > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Command-line flags override configuration file values
fn merge_args(args: &Args, mut app: AppConfig) -> AppConfig {
    if args.input.is_some() {
        app.input.path = args.input.clone();
    }
    if args.sheet.is_some() {
        app.input.sheet = args.sheet.clone();
    }
    if args.output.is_some() {
        app.output.path = args.output.clone();
    }
    if args.summary.is_some() {
        app.output.summary = args.summary.clone();
    }

    let generation = &mut app.generation;
    generation.can_fd |= args.canfd;
    if args.node_type.is_some() {
        generation.node_filter = args.node_type.clone();
    }
    if args.controller_name.is_some() {
        generation.controller_name = args.controller_name.clone();
    }
    if args.bus_type.is_some() {
        generation.bus_filter = args.bus_type.clone();
    }
    app
}

/// Convert one workbook
fn run(args: &Args, app: AppConfig) -> Result<usize> {
    let input = app
        .input
        .path
        .clone()
        .context("No input workbook given (use --input or [input] path)")?;
    let output = app
        .output
        .path
        .clone()
        .unwrap_or_else(|| input.with_extension("dbc"));
    let sheet = app.input.sheet_name();

    if args.password.is_some() {
        log::warn!("Password given but protected workbooks are not supported; reading {:?} as-is", input);
    }

    let table = workbook::read_matrix(&input, sheet)?;
    generate(args, &app, &input, &output, &table)
}

/// Validate, convert and write one matrix; returns the number of artifacts written
fn generate(args: &Args, app: &AppConfig, input: &Path, output: &Path, table: &MatrixTable) -> Result<usize> {
    let sheet = app.input.sheet_name();
    let converter = Converter::new(app.generation.clone()).context("Invalid generation settings")?;

    let conversion = converter.convert(table);
    let validation = validate(table, &conversion.roles, converter.config());
    log_validation(&validation);
    if args.strict && !validation.passed() {
        bail!(
            "Validation failed with {} errors, nothing generated (--strict)",
            validation.errors.len()
        );
    }

    let stats = conversion.stats();
    println!("Matrix: {:?} [{}]", input, sheet);
    println!("  Messages: {}", stats.num_messages);
    println!("  Signals:  {}", stats.num_signals);
    println!(
        "  Buses:    {}",
        conversion
            .partition
            .buses
            .iter()
            .map(|bus| bus.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let artifacts = conversion.write_all(output);
    let mut written = 0;
    for artifact in &artifacts {
        match artifact {
            Ok(artifact) => {
                println!(
                    "✓ {} -> {:?} ({} messages, {} signals)",
                    artifact.bus, artifact.path, artifact.num_messages, artifact.num_signals
                );
                if args.check_output && !check_output(&artifact.path)? {
                    continue;
                }
                written += 1;
            }
            Err(e) => {
                println!("✗ {}", e);
                log::error!("{}", e);
            }
        }
    }

    if let Some(summary_path) = &app.output.summary {
        let summary = RunSummary::new(input, sheet, &conversion, &artifacts, Some(validation));
        // Artifacts already on disk still count toward the exit status
        match report::write_summary(summary_path, &summary) {
            Ok(()) => log::debug!("Summary records {} written artifacts", summary.written_count()),
            Err(e) => log::error!("{:#}", e),
        }
    }

    if written == 0 {
        log::error!("No DBC file was generated");
    }
    Ok(written)
}

fn log_validation(report: &ValidationReport) {
    for diagnostic in report.errors.iter().chain(&report.warnings) {
        match diagnostic.severity {
            Severity::Error => log::error!("Validation: {}", diagnostic),
            Severity::Warning => log::warn!("Validation: {}", diagnostic),
        }
    }
    log::info!(
        "Validation {}: {} errors, {} warnings",
        if report.passed() { "passed" } else { "failed" },
        report.errors.len(),
        report.warnings.len()
    );
}

/// Re-parse a written file; false when it has malformed lines
fn check_output(path: &Path) -> Result<bool> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read back {:?}", path))?;
    let report = analyze(&text);

    for section in &report.missing_sections {
        log::error!("{:?}: missing section {}", path, section);
    }
    for line in &report.malformed {
        log::error!("{:?}:{}: {} ({})", path, line.line, line.reason, line.text.trim());
    }
    if report.is_valid() {
        log::info!(
            "{:?}: {} messages, {} signals parsed back",
            path,
            report.messages.len(),
            report.signals.len()
        );
    }
    Ok(report.is_valid())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
