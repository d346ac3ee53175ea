//! Tessera audit ledger CLI
//!
//! Appends records to a hash-chained ledger, audits it, and repairs it.
//!
//! Usage:
//!   tessera init --ledger audit/ledger.jsonl
//!   tessera append --ledger audit/ledger.jsonl --action user_login --category auth --details '{"user":"alice"}'
//!   tessera diagnose audit/ledger.jsonl
//!   tessera repair audit/ledger.jsonl
//!   tessera tip --ledger audit/ledger.jsonl
//!
//! `diagnose` and `repair` exit 0 whatever they find unless `--strict` is
//! given, in which case findings exit with status 2.  Errors always exit 1.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tessera_audit::{AuditOptions, Auditor};
use tessera_config::TesseraConfig;
use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::AuditEvent,
    policy::MalformedPolicy,
    report::{abbreviate, AnomalyKind, AuditReport, RepairReport},
};
use tessera_core::{ledger, to_details, ChainWriter};
use tessera_recovery::{RecoveryEngine, RepairOptions};
use tessera_store::FileTipStore;

/// Exit status for `--strict` runs that found anomalies or changed the ledger.
const EXIT_FINDINGS: i32 = 2;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Tessera: tamper-evident audit ledger.
#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Tamper-evident audit ledger tools",
    long_about = "Appends SHA-256 hash-chained records to a newline-delimited ledger,\n\
                  audits it for broken links and altered content, and repairs it\n\
                  after taking a backup."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a new epoch with an `audit_system_initialized` record.
    Init {
        /// Ledger file (defaults to `[ledger] path`).
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// JSON object stored as the record's details.
        #[arg(long)]
        details: Option<String>,
    },
    /// Append one record.
    Append {
        #[arg(long)]
        ledger: Option<PathBuf>,
        #[arg(long)]
        action: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        details: Option<String>,
        /// Link to genesis instead of the current tip, opening a new epoch.
        /// Only valid with `--action audit_system_initialized`.
        #[arg(long)]
        reset: bool,
    },
    /// Scan a ledger and list every anomaly.  Read-only.
    Diagnose {
        ledger: PathBuf,
        /// Exit with status 2 if any anomaly is found.
        #[arg(long)]
        strict: bool,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Back up a ledger and rewrite it into a self-consistent chain.
    Repair {
        ledger: PathBuf,
        /// What to do with unparsable lines (defaults to `[repair] on_malformed`).
        #[arg(long, value_enum)]
        on_malformed: Option<MalformedArg>,
        /// Exit with status 2 if any record was modified or dropped.
        #[arg(long)]
        strict: bool,
    },
    /// Compare the cached tip with the tip derived from the ledger.
    Tip {
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MalformedArg {
    Drop,
    Abort,
}

impl From<MalformedArg> for MalformedPolicy {
    fn from(arg: MalformedArg) -> Self {
        match arg {
            MalformedArg::Drop => MalformedPolicy::Drop,
            MalformedArg::Abort => MalformedPolicy::Abort,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = run(cli);
    if let Err(e) = &outcome {
        eprintln!("tessera: {}", e);
    }
    std::process::exit(exit_code(&outcome));
}

/// Map a `run` outcome to the process exit status.
fn exit_code(outcome: &LedgerResult<bool>) -> i32 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => EXIT_FINDINGS,
        Err(_) => 1,
    }
}

/// Dispatch the subcommand.  `Ok(false)` means a strict run had findings.
fn run(cli: Cli) -> LedgerResult<bool> {
    let config = TesseraConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Init { ledger, details } => {
            let path = config.resolve_ledger(ledger.as_deref())?;
            let mut writer = open_writer(&config, &path)?;
            let event = writer.initialize(parse_details(details.as_deref())?)?;
            println!("{} {}", event.action, event.current_hash);
            Ok(true)
        }
        Command::Append {
            ledger,
            action,
            category,
            details,
            reset,
        } => {
            check_reset(&action, reset)?;
            let path = config.resolve_ledger(ledger.as_deref())?;
            let mut writer = open_writer(&config, &path)?;
            let event = writer.append(&action, &category, parse_details(details.as_deref())?, reset)?;
            println!("{} {}", event.action, event.current_hash);
            Ok(true)
        }
        Command::Diagnose {
            ledger,
            strict,
            json,
        } => {
            let auditor = Auditor::new(AuditOptions {
                pending_retry: config.pending_retry(),
            });
            let report = auditor.audit_path(&ledger)?;
            if json {
                let out = serde_json::to_string_pretty(&report).map_err(|e| LedgerError::Encoding {
                    reason: e.to_string(),
                })?;
                println!("{out}");
            } else {
                print_audit(&config, &ledger, &report);
            }
            Ok(!strict || report.is_clean())
        }
        Command::Repair {
            ledger,
            on_malformed,
            strict,
        } => {
            let options = RepairOptions {
                on_malformed: on_malformed
                    .map(MalformedPolicy::from)
                    .unwrap_or(config.repair.on_malformed),
            };
            let tips = FileTipStore::new(config.tip_path_for(&ledger));
            let report = RecoveryEngine::new(Box::new(tips), options).repair(&ledger)?;
            print_repair(&ledger, &report);
            Ok(!strict || report.is_noop())
        }
        Command::Tip { ledger } => {
            let path = config.resolve_ledger(ledger.as_deref())?;
            print_tip(&config, &path)?;
            Ok(true)
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn open_writer(config: &TesseraConfig, path: &Path) -> LedgerResult<ChainWriter> {
    let tips = FileTipStore::new(config.tip_path_for(path));
    ChainWriter::open(path, Box::new(tips))
}

/// A genesis link is only legal on the epoch marker; anywhere else the
/// auditor reports it as a broken link.
fn check_reset(action: &str, reset: bool) -> LedgerResult<()> {
    if reset && action != AuditEvent::RESET_ACTION {
        return Err(LedgerError::Config {
            reason: format!(
                "--reset opens an epoch and requires --action {}, got '{}'",
                AuditEvent::RESET_ACTION,
                action
            ),
        });
    }
    Ok(())
}

fn parse_details(raw: Option<&str>) -> LedgerResult<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    let value: Value = serde_json::from_str(raw).map_err(|e| LedgerError::Config {
        reason: format!("--details is not valid JSON: {}", e),
    })?;
    to_details(&value)
}

/// Cached tip, or `None` with a warning if the side-file is unreadable.
fn cached_tip(config: &TesseraConfig, path: &Path) -> Option<String> {
    let store = FileTipStore::new(config.tip_path_for(path));
    match store.read_tip() {
        Ok(tip) => tip.map(|t| t.last_hash),
        Err(e) => {
            warn!(error = %e, "tip cache unreadable");
            None
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_audit(config: &TesseraConfig, path: &Path, report: &AuditReport) {
    for anomaly in &report.anomalies {
        println!("{anomaly}");
    }
    if let Some(pending) = &report.pending {
        println!("line {}: PENDING last line incomplete ({})", pending.line, pending.reason);
    }

    let derived = report
        .derived_tip
        .as_deref()
        .unwrap_or(AuditEvent::GENESIS_HASH);
    if let Some(cached) = cached_tip(config, path) {
        if cached != derived {
            println!(
                "note: tip cache is stale (cached {}, ledger {})",
                abbreviate(&cached),
                abbreviate(derived)
            );
        }
    }

    println!(
        "{}: {} records scanned, {} anomalies (LINK {}, CONTENT {}, MALFORMED {})",
        path.display(),
        report.records_scanned,
        report.anomalies.len(),
        report.count(AnomalyKind::Link),
        report.count(AnomalyKind::Content),
        report.count(AnomalyKind::Malformed),
    );
}

fn print_repair(path: &Path, report: &RepairReport) {
    println!(
        "{}: {} records written, {} repaired ({} links, {} hashes), {} dropped as unparsable",
        path.display(),
        report.events_total,
        report.events_modified,
        report.links_repaired,
        report.hashes_repaired,
        report.events_dropped,
    );
    println!("backup: {}", report.backup_path.display());
    println!("tip:    {}", report.final_tip);
}

fn print_tip(config: &TesseraConfig, path: &Path) -> LedgerResult<()> {
    let derived = ledger::derive_tip(path)?;
    let cached = cached_tip(config, path);

    println!("ledger: {}", derived.as_deref().unwrap_or("(empty)"));
    println!("cached: {}", cached.as_deref().unwrap_or("(none)"));
    if cached != derived {
        println!("cache is stale; the ledger is authoritative");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
