use anyhow::Context;
use auditfix_cli::Workspace;
use auditfix_cli::config::{self, ConfigMerger};
use auditfix_core::adapters::{FsFixJournal, StdinConfirmer};
use auditfix_core::settings::DEFAULT_STATE_DIR;
use auditfix_core::{
    Capabilities, FixPorts, FixSessionError, FixSettings, SafeFixEngine, default_audit_path, read_audit_run,
    run_audit, write_audit_run,
};
use auditfix_domain::builtin_phases;
use auditfix_types::fix::{FixReport, SafetyLevel};
use auditfix_types::issue::{Issue, Severity};
use auditfix_types::run::AuditRun;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const EXIT_TOOL_ERROR: u8 = 1;
const EXIT_STOPPED_EARLY: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "auditfix",
    version,
    about = "Phased audits of Rust projects with snapshot-backed automatic fixes."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the phased audit and write the run as JSON.
    Audit(AuditArgs),
    /// Apply automatic fixes for issues from an audit run.
    Fix(FixArgs),
    /// Inspect or prune snapshots.
    #[command(subcommand)]
    Snapshots(SnapshotsCommand),
}

#[derive(Debug, Parser)]
struct AuditArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Only run these phases (repeatable, wildcards allowed).
    #[arg(long)]
    only: Vec<String>,

    /// Skip these phases (repeatable, wildcards allowed).
    #[arg(long)]
    skip: Vec<String>,

    /// Output file (default: <repo_root>/.auditfix/audit.json).
    #[arg(long)]
    out: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct FixArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Which risk classes to fix: safe, risky or all.
    #[arg(long, default_value = "safe")]
    level: SafetyLevel,

    /// Preview fixes without touching the tree.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Restore a snapshot instead of fixing.
    #[arg(long, value_name = "ID")]
    rollback: Option<String>,

    /// Apply the safe batch without asking.
    #[arg(long, default_value_t = false)]
    auto_apply_safe: bool,

    /// Allow fixing when the git working tree has uncommitted changes.
    #[arg(long, default_value_t = false)]
    allow_dirty: bool,

    /// Audit run JSON to take issues from (default: the last audit output, or a fresh audit).
    #[arg(long)]
    issues: Option<Utf8PathBuf>,
}

#[derive(Debug, Subcommand)]
enum SnapshotsCommand {
    /// List snapshots, oldest first.
    List(SnapshotsArgs),
    /// Delete the oldest snapshots beyond a retention count.
    Cleanup(CleanupArgs),
}

#[derive(Debug, Parser)]
struct SnapshotsArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,
}

#[derive(Debug, Parser)]
struct CleanupArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Snapshots to keep (default: `[snapshot] retention`).
    #[arg(long)]
    keep: Option<usize>,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_TOOL_ERROR)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Audit(args) => cmd_audit(args),
        Command::Fix(args) => cmd_fix(args),
        Command::Snapshots(SnapshotsCommand::List(args)) => cmd_snapshots_list(args),
        Command::Snapshots(SnapshotsCommand::Cleanup(args)) => cmd_snapshots_cleanup(args),
    }
}

fn cmd_audit(args: AuditArgs) -> anyhow::Result<ExitCode> {
    let file_config = config::load_or_default(&args.repo_root).context("load auditfix.toml config")?;
    let merged = ConfigMerger::new(file_config).merge_audit_args(&args.only, &args.skip);
    debug!(filter = ?merged.filter, workers = merged.workers, "merged config");

    let ws = Workspace::new(args.repo_root, merged);
    let run = audit(&ws)?;

    let out = args
        .out
        .unwrap_or_else(|| default_audit_path(&ws.root, DEFAULT_STATE_DIR));
    write_audit_run(&out, &run)?;
    print_audit_summary(&run);
    info!("wrote audit run to {}", out);

    let tool_errors = run.phases.iter().any(|p| !p.tool_failures.is_empty());
    Ok(if run.stopped_early {
        ExitCode::from(EXIT_STOPPED_EARLY)
    } else if tool_errors {
        ExitCode::from(EXIT_TOOL_ERROR)
    } else {
        ExitCode::SUCCESS
    })
}

fn audit(ws: &Workspace) -> anyhow::Result<AuditRun> {
    let catalog = builtin_phases();
    let registry = ws.registry(&catalog);
    let caps = ws.capabilities(&registry);
    run_audit(&ws.audit_settings(), &catalog, &registry, &caps).context("run audit")
}

fn cmd_fix(args: FixArgs) -> anyhow::Result<ExitCode> {
    let file_config = config::load_or_default(&args.repo_root).context("load auditfix.toml config")?;
    let merged = ConfigMerger::new(file_config).merge_fix_args(args.auto_apply_safe, args.allow_dirty);
    debug!(
        auto_apply_safe = merged.auto_apply_safe,
        allow_dirty = merged.allow_dirty,
        "merged config"
    );

    let ws = Workspace::new(args.repo_root, merged);
    let catalog = builtin_phases();
    let registry = ws.registry(&catalog);
    let snapshots = ws.snapshots()?;
    let settings = FixSettings {
        repo_root: ws.root.clone(),
        state_dir: DEFAULT_STATE_DIR.to_string(),
        level: args.level,
        dry_run: args.dry_run,
        auto_apply_safe: ws.config.auto_apply_safe,
        allow_dirty: ws.config.allow_dirty,
        branch_prefix: ws.config.branch_prefix.clone(),
        snapshot_retention: ws.config.snapshot_retention,
    };
    let caps = Capabilities::probe_git(&ws.git);
    let validator = ws.validator();
    let confirmer = StdinConfirmer;
    let journal = FsFixJournal::new(settings.state_path());
    let engine = SafeFixEngine::new(
        &settings,
        &registry,
        &snapshots,
        &ws.git,
        &caps,
        FixPorts {
            validator: validator.as_ref(),
            confirmer: &confirmer,
            journal: &journal,
        },
    );

    if let Some(id) = args.rollback {
        return Ok(if engine.rollback(&id) {
            println!("restored snapshot {id}");
            ExitCode::SUCCESS
        } else {
            eprintln!(
                "snapshot {id} could not be restored; recover manually from {}",
                snapshots.snapshot_dir(&id)
            );
            ExitCode::from(EXIT_TOOL_ERROR)
        });
    }

    let issues = load_issues(&ws, args.issues)?;
    let report = match engine.run(&issues) {
        Ok(report) => report,
        Err(FixSessionError::SessionLocked { path }) => {
            anyhow::bail!("another fix session is running (lock file {path})")
        }
        Err(e) => return Err(e.into()),
    };
    print_fix_summary(&report);
    info!("wrote fixes report to {}", journal.report_path());

    Ok(if report.has_rollback_failures() {
        ExitCode::from(EXIT_TOOL_ERROR)
    } else {
        ExitCode::SUCCESS
    })
}

fn load_issues(ws: &Workspace, explicit: Option<Utf8PathBuf>) -> anyhow::Result<Vec<Issue>> {
    let path = explicit.unwrap_or_else(|| default_audit_path(&ws.root, DEFAULT_STATE_DIR));
    if path.exists() {
        debug!("loading issues from {}", path);
        let run = read_audit_run(&path)?;
        return Ok(run.issues().cloned().collect());
    }
    info!("no audit output at {}; running an audit first", path);
    let run = audit(ws)?;
    write_audit_run(&path, &run)?;
    Ok(run.issues().cloned().collect())
}

fn cmd_snapshots_list(args: SnapshotsArgs) -> anyhow::Result<ExitCode> {
    let file_config = config::load_or_default(&args.repo_root).context("load auditfix.toml config")?;
    let ws = Workspace::new(args.repo_root, ConfigMerger::new(file_config).merge_fix_args(false, false));
    let snapshots = ws.snapshots()?.list_snapshots().context("list snapshots")?;

    if snapshots.is_empty() {
        println!("No snapshots.");
        return Ok(ExitCode::SUCCESS);
    }
    println!("  {:<30} {:<8} {:<6} DESCRIPTION", "ID", "STATUS", "FILES");
    for meta in snapshots {
        let status = if meta.is_success() { "success" } else { "pending" };
        println!(
            "  {:<30} {:<8} {:<6} {}",
            meta.id,
            status,
            meta.file_checksums.len(),
            meta.description
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_snapshots_cleanup(args: CleanupArgs) -> anyhow::Result<ExitCode> {
    let file_config = config::load_or_default(&args.repo_root).context("load auditfix.toml config")?;
    let ws = Workspace::new(args.repo_root, ConfigMerger::new(file_config).merge_fix_args(false, false));
    let keep = args.keep.unwrap_or(ws.config.snapshot_retention);
    let removed = ws
        .snapshots()?
        .cleanup_old_snapshots(keep)
        .context("clean up snapshots")?;
    println!("Removed {removed} snapshot(s), kept at most {keep}.");
    Ok(ExitCode::SUCCESS)
}

fn print_audit_summary(run: &AuditRun) {
    println!("Audit score: {}/100", run.score.global);
    for (category, score) in &run.score.categories {
        println!("  {category:<16} {score}");
    }
    let counts = &run.summary.by_severity;
    println!(
        "Issues: {} (critical {}, high {}, medium {}, low {}), {} auto-fixable",
        run.summary.total,
        counts.get(Severity::Critical),
        counts.get(Severity::High),
        counts.get(Severity::Medium),
        counts.get(Severity::Low),
        run.summary.auto_fixable
    );
    for phase in &run.phases {
        println!(
            "  phase {:<14} {} issue(s), {} tool failure(s), {} ms",
            phase.phase,
            phase.issues.len(),
            phase.tool_failures.len(),
            phase.duration_ms
        );
    }
    for skipped in &run.skipped {
        println!("  phase {:<14} skipped ({:?})", skipped.phase, skipped.reason);
    }
    if run.stopped_early {
        println!(
            "Stopped early: {} critical finding(s) in a security gate.",
            run.stop_trigger.len()
        );
    }
}

fn print_fix_summary(report: &FixReport) {
    if report.dry_run {
        println!("Dry run: {} fix(es) would be attempted.", report.previews.len());
        for p in &report.previews {
            println!(
                "  [{:?}] {} ({})",
                p.risk_level,
                p.estimated_change,
                p.files_affected.join(", ")
            );
        }
        return;
    }
    let s = &report.summary;
    println!(
        "Fixes: {} attempted, {} applied, {} failed, {} declined, {} rolled back",
        s.total_attempted, s.successful, s.failed, s.declined, s.rolled_back
    );
    for e in &report.errors {
        println!("  failed {} at {}: {}", e.issue.tool, e.issue.location(), e.reason);
    }
    for b in &report.branches {
        println!("  branch {b}");
    }
    for id in &report.rollback_failures {
        println!("  ROLLBACK NOT VERIFIED for snapshot {id}; manual recovery required");
    }
}
