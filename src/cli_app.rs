//! Top-level CLI definition and dispatch.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::thread::JoinHandle;

use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use hashward::core::config::Config;
use hashward::core::errors::HwdError;
use hashward::logger::activity::{ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger};
use hashward::logger::session_log::SessionLog;
use hashward::quarantine::store::{Inconsistency, QuarantineEntry};
use hashward::scanner::walker::{FileInspection, ScanReport};
use hashward::session::orchestrator::{BatchReport, EntryFailure, Session};
use hashward::session::signals::InterruptSignals;

/// hashward: scan for known-bad files, quarantine them, restore or shred them.
#[derive(Debug, Parser)]
#[command(
    name = "hashward",
    author,
    version,
    about = "Signature scanner with quarantine, restore, and shred",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan a file or directory and quarantine every match.
    Scan(ScanArgs),
    /// Print every supported digest of a file.
    Hash(HashArgs),
    /// Move a file into quarantine without scanning it.
    Quarantine(QuarantineArgs),
    /// List quarantined files and any bookkeeping problems.
    List,
    /// Move quarantined files back to where they came from.
    Restore(RestoreArgs),
    /// Overwrite and delete quarantined files.
    Shred(ShredArgs),
    /// Show the end of the session log.
    Log(LogArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// File or directory to scan.
    #[arg(value_name = "PATH")]
    target: PathBuf,
    /// Report matches without moving them.
    #[arg(long)]
    no_quarantine: bool,
}

#[derive(Debug, Clone, Args)]
struct HashArgs {
    /// File to digest.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct QuarantineArgs {
    /// File to quarantine.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["names", "all"])))]
struct RestoreArgs {
    /// Entry names (`evil.exe` or `evil.exe_quarantined`).
    #[arg(value_name = "NAME")]
    names: Vec<String>,
    /// Restore every entry.
    #[arg(long, conflicts_with = "names")]
    all: bool,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["names", "all"])))]
struct ShredArgs {
    /// Entry names (`evil.exe` or `evil.exe_quarantined`).
    #[arg(value_name = "NAME")]
    names: Vec<String>,
    /// Shred every entry.
    #[arg(long, conflicts_with = "names")]
    all: bool,
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Args)]
struct LogArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 40, value_name = "N")]
    lines: usize,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<HwdError> for CliError {
    fn from(err: HwdError) -> Self {
        match err {
            HwdError::InvalidConfig { .. }
            | HwdError::MissingConfig { .. }
            | HwdError::ConfigParse { .. }
            | HwdError::TargetNotFound { .. }
            | HwdError::EntryNotFound { .. }
            | HwdError::NotARegularFile { .. }
            | HwdError::RestoreConflict { .. } => Self::User(err.to_string()),
            HwdError::Serialization { .. } => Self::Internal(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Hash(args) => run_hash(cli, args),
        Command::Quarantine(args) => run_quarantine(cli, args),
        Command::List => run_list(cli),
        Command::Restore(args) => run_restore(cli, args),
        Command::Shred(args) => run_shred(cli, args),
        Command::Log(args) => run_log(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── session plumbing ────────────────────

/// A session plus the background activity logger and signal hooks it owns.
struct Invocation {
    session: Session,
    activity: ActivityLoggerHandle,
    logger: Option<JoinHandle<()>>,
    _signals: InterruptSignals,
}

impl Invocation {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = Config::load(cli.config.as_deref())?;

        let (activity, logger) =
            match spawn_logger(ActivityLoggerConfig::for_path(&config.paths.activity_log)) {
                Ok((handle, join)) => (handle, Some(join)),
                Err(e) => {
                    eprintln!("[HWD-LOG] WARNING: activity log disabled: {e}");
                    (ActivityLoggerHandle::disabled(), None)
                }
            };

        let session = match Session::open(config, activity.clone()) {
            Ok(session) => session,
            Err(e) => {
                finish_logger(&activity, logger);
                return Err(e.into());
            }
        };
        let signals = InterruptSignals::install(session.interrupt());

        Ok(Self {
            session,
            activity,
            logger,
            _signals: signals,
        })
    }

    fn finish(mut self) {
        finish_logger(&self.activity, self.logger.take());
    }
}

fn finish_logger(activity: &ActivityLoggerHandle, logger: Option<JoinHandle<()>>) {
    activity.shutdown();
    if let Some(join) = logger
        && join.join().is_err()
    {
        eprintln!("[HWD-LOG] WARNING: activity logger thread panicked");
    }
}

// ──────────────────── scan ────────────────────

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let inv = Invocation::open(cli)?;
    let mode = output_mode(cli);

    let result = if args.no_quarantine {
        inv.session.scan(&args.target).map(|report| (report, Vec::new(), Vec::new()))
    } else {
        inv.session
            .scan_and_quarantine(&args.target)
            .map(|outcome| (outcome.report, outcome.quarantined, outcome.failures))
    };
    inv.finish();
    let (report, quarantined, failures) = result?;

    match mode {
        OutputMode::Human => print_scan_human(&report, &quarantined, &failures, args.no_quarantine),
        OutputMode::Json => {
            let payload = json!({
                "command": "scan",
                "quarantine": !args.no_quarantine,
                "report": serde_json::to_value(&report)?,
                "quarantined": serde_json::to_value(&quarantined)?,
                "failures": serde_json::to_value(&failures)?,
            });
            write_json_line(&payload)?;
        }
    }

    if report.interrupted {
        return Err(CliError::Partial("scan interrupted; results are partial".to_string()));
    }
    if !failures.is_empty() || !report.unreadable.is_empty() {
        return Err(CliError::Partial(format!(
            "{} quarantine failure(s), {} unreadable file(s)",
            failures.len(),
            report.unreadable.len()
        )));
    }
    Ok(())
}

fn print_scan_human(
    report: &ScanReport,
    quarantined: &[QuarantineEntry],
    failures: &[EntryFailure],
    report_only: bool,
) {
    println!(
        "Scan of {}\n  Files scanned: {} in {:.1}s\n  Signatures loaded: {}\n",
        report.target.display(),
        report.files_scanned(),
        report.duration.as_secs_f64(),
        report.signatures_loaded,
    );

    if report.signatures_loaded == 0 {
        println!(
            "  {} signature set is empty; nothing can be detected",
            "[WARNING]".yellow().bold()
        );
    }
    if report.detections.is_empty() {
        println!("  {}", "No infected files found.".green());
    }
    for detection in &report.detections {
        let weak = if detection.algorithm.is_collision_resistant() {
            ""
        } else {
            " [weak digest]"
        };
        println!(
            "  {} {} ({} {}){weak}",
            "[INFECTED]".red().bold(),
            detection.path.display(),
            detection.algorithm,
            detection.digest
        );
    }
    for entry in quarantined {
        println!(
            "  {} {}",
            "[QUARANTINED]".yellow(),
            entry.quarantined_path.display()
        );
    }
    for failure in failures {
        println!(
            "  {} {}: {}",
            "[ERROR]".red(),
            failure.name,
            failure.message
        );
    }
    for unreadable in &report.unreadable {
        println!(
            "  {} {}: {}",
            "[UNREADABLE]".yellow(),
            unreadable.path.display(),
            unreadable.details
        );
    }
    if report.symlinks_skipped > 0 {
        println!("  Symlinks skipped: {}", report.symlinks_skipped);
    }
    if report_only && !report.detections.is_empty() {
        println!("\n  Re-run without --no-quarantine to move these files.");
    }
}

// ──────────────────── hash / quarantine ────────────────────

fn run_hash(cli: &Cli, args: &HashArgs) -> Result<(), CliError> {
    let inv = Invocation::open(cli)?;
    let inspection = inv.session.hash(&args.file);
    inv.finish();
    let FileInspection {
        digests, detection, ..
    } = inspection?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", args.file.display());
            for (algorithm, hex) in digests.iter() {
                println!("  {:<7} {hex}", algorithm.to_string());
            }
            match &detection {
                Some(d) => println!(
                    "  {} matches a known signature ({})",
                    "[INFECTED]".red().bold(),
                    d.algorithm
                ),
                None => println!("  {}", "no signature match".green()),
            }
        }
        OutputMode::Json => {
            let mut map = serde_json::Map::new();
            for (algorithm, hex) in digests.iter() {
                map.insert(algorithm.to_string(), Value::String(hex.to_string()));
            }
            let payload = json!({
                "command": "hash",
                "path": args.file.to_string_lossy(),
                "digests": Value::Object(map),
                "detection": serde_json::to_value(&detection)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_quarantine(cli: &Cli, args: &QuarantineArgs) -> Result<(), CliError> {
    let inv = Invocation::open(cli)?;
    let result = inv.session.quarantine(&args.file);
    inv.finish();
    let entry = result?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{} {} -> {}",
                "[QUARANTINED]".yellow(),
                args.file.display(),
                entry.quarantined_path.display()
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "quarantine",
                "entry": serde_json::to_value(&entry)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── list ────────────────────

fn run_list(cli: &Cli) -> Result<(), CliError> {
    let inv = Invocation::open(cli)?;
    let result = inv.session.list();
    let dir = inv.session.store().dir().to_path_buf();
    inv.finish();
    let listing = result?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Quarantine: {}\n", dir.display());
            if listing.entries.is_empty() {
                println!("  (empty)");
            } else {
                println!("  {:<40}  {:>10}  {}", "Name", "Size", "Original path");
                println!("  {}", "-".repeat(90));
                for entry in &listing.entries {
                    let original = entry
                        .original_path()
                        .map_or_else(|| "(unknown)".to_string(), |p| p.display().to_string());
                    println!(
                        "  {:<40}  {:>10}  {}",
                        entry.name,
                        format_bytes(entry.size_bytes),
                        original
                    );
                }
            }
            print_inconsistencies(&listing.inconsistencies);
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "list",
                "quarantine_dir": dir.to_string_lossy(),
                "entries": serde_json::to_value(&listing.entries)?,
                "inconsistencies": serde_json::to_value(&listing.inconsistencies)?,
            });
            write_json_line(&payload)?;
        }
    }

    if listing.inconsistencies.is_empty() {
        Ok(())
    } else {
        Err(CliError::Partial(format!(
            "{} inconsistent quarantine entr{}",
            listing.inconsistencies.len(),
            if listing.inconsistencies.len() == 1 { "y" } else { "ies" }
        )))
    }
}

fn print_inconsistencies(problems: &[Inconsistency]) {
    if problems.is_empty() {
        return;
    }
    println!("\n  Inconsistencies ({}):", problems.len());
    for problem in problems {
        println!(
            "    {} {}: {}",
            "[WARNING]".yellow(),
            problem.path.display(),
            problem.details
        );
    }
}

// ──────────────────── restore / shred ────────────────────

fn run_restore(cli: &Cli, args: &RestoreArgs) -> Result<(), CliError> {
    let inv = Invocation::open(cli)?;
    let result = if args.all {
        inv.session.restore_all()
    } else {
        Ok(inv.session.restore_selected(&args.names))
    };
    inv.finish();
    let batch = result?;

    match output_mode(cli) {
        OutputMode::Human => {
            for (name, destination) in &batch.succeeded {
                println!(
                    "{} {name} -> {}",
                    "[RESTORED]".green(),
                    destination.display()
                );
            }
            print_batch_tail(&batch, "restored");
        }
        OutputMode::Json => {
            let restored: Vec<Value> = batch
                .succeeded
                .iter()
                .map(|(name, destination)| {
                    json!({ "name": name, "destination": destination.to_string_lossy() })
                })
                .collect();
            let payload = json!({
                "command": "restore",
                "restored": restored,
                "failed": serde_json::to_value(&batch.failed)?,
                "skipped": batch.skipped,
            });
            write_json_line(&payload)?;
        }
    }
    batch_result(&batch, "restore")
}

fn run_shred(cli: &Cli, args: &ShredArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    if !args.yes {
        let what = if args.all {
            "every quarantined file".to_string()
        } else {
            format!("{} quarantined file(s)", args.names.len())
        };
        if mode == OutputMode::Json || !io::stdin().is_terminal() {
            return Err(CliError::User(format!(
                "refusing to shred {what} without --yes"
            )));
        }
        if !confirm(&format!("Permanently overwrite and delete {what}? [y/N] "))? {
            return Err(CliError::User("aborted".to_string()));
        }
    }

    let inv = Invocation::open(cli)?;
    let passes = inv.session.config().shredder.passes;
    let result = if args.all {
        inv.session.destroy_all()
    } else {
        Ok(inv.session.destroy_selected(&args.names))
    };
    inv.finish();
    let batch = result?;

    match mode {
        OutputMode::Human => {
            for (name, receipt) in &batch.succeeded {
                println!(
                    "{} {name} ({}, {} passes)",
                    "[DELETED]".red(),
                    format_bytes(receipt.size_bytes),
                    receipt.passes
                );
            }
            print_batch_tail(&batch, "shredded");
        }
        OutputMode::Json => {
            let shredded: Vec<Value> = batch
                .succeeded
                .iter()
                .map(|(name, receipt)| {
                    Ok(json!({ "name": name, "receipt": serde_json::to_value(receipt)? }))
                })
                .collect::<Result<_, serde_json::Error>>()?;
            let payload = json!({
                "command": "shred",
                "passes": passes,
                "shredded": shredded,
                "failed": serde_json::to_value(&batch.failed)?,
                "skipped": batch.skipped,
            });
            write_json_line(&payload)?;
        }
    }
    batch_result(&batch, "shred")
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;
    drop(stdout);

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_batch_tail<T>(batch: &BatchReport<T>, verb: &str) {
    for failure in &batch.failed {
        println!(
            "{} {}: {}",
            "[ERROR]".red().bold(),
            failure.name,
            failure.message
        );
    }
    if !batch.skipped.is_empty() {
        println!(
            "{} {} entr{} not processed",
            "[WARNING]".yellow(),
            batch.skipped.len(),
            if batch.skipped.len() == 1 { "y" } else { "ies" }
        );
    }
    println!(
        "\n{} {verb}, {} failed",
        batch.succeeded_count(),
        batch.failed_count()
    );
}

fn batch_result<T>(batch: &BatchReport<T>, command: &str) -> Result<(), CliError> {
    if batch.is_complete() {
        return Ok(());
    }
    // Nothing done and every failure a lookup miss: the user named the wrong entries.
    if batch.succeeded.is_empty()
        && batch.skipped.is_empty()
        && batch.failed.iter().all(|f| f.error_code == "HWD-3006")
    {
        return Err(CliError::User(format!(
            "{command}: no matching quarantine entries"
        )));
    }
    Err(CliError::Partial(format!(
        "{command}: {} succeeded, {} failed, {} skipped",
        batch.succeeded_count(),
        batch.failed_count(),
        batch.skipped.len()
    )))
}

// ──────────────────── log / config ────────────────────

fn run_log(cli: &Cli, args: &LogArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let log = SessionLog::new(&config.paths.session_log);
    let lines = log.tail(args.lines)?;

    match output_mode(cli) {
        OutputMode::Human => {
            if lines.is_empty() {
                println!("(session log {} is empty)", log.path().display());
            }
            for line in &lines {
                println!("{}", colorize_log_line(line));
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "log",
                "path": log.path().to_string_lossy(),
                "lines": lines,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn colorize_log_line(line: &str) -> String {
    if line.starts_with("[INFECTED]") || line.starts_with("[ERROR]") || line.starts_with("[DELETED]")
    {
        line.red().to_string()
    } else if line.starts_with("[QUARANTINED]")
        || line.starts_with("[WARNING]")
        || line.starts_with("[UNREADABLE]")
    {
        line.yellow().to_string()
    } else if line.starts_with("[RESTORED]") {
        line.green().to_string()
    } else if line.starts_with("=== ") {
        line.bold().to_string()
    } else {
        line.to_string()
    }
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                        if !config.paths.signature_file.exists() {
                            println!(
                                "  {} signature file {} does not exist",
                                "[WARNING]".yellow(),
                                config.paths.signature_file.display()
                            );
                        }
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                            "signature_file_exists": config.paths.signature_file.exists(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error_code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output helpers ────────────────────

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("HWD_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
