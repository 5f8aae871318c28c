//! Host Probe Core - host introspection probes
//!
//! The main entry point for hp-core, handling:
//! - Container check
//! - Private-key scan
//! - Security product discovery
//! - Network, ARP and logged-in user listings
//! - auditd watch rules
//! - Login watch

use clap::{Args, Parser, Subcommand};
use hp_common::{format_error_human, OutputFormat};
use hp_config::{load_config, ConfigError, LoadedConfig, ProbeConfig};
use hp_core::collect::{LiveSource, LoginRecord, TimedSource};
use hp_core::credentials::parse_root_list;
use hp_core::discover::default_registry;
use hp_core::exit_codes::ExitCode;
use hp_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use hp_core::login_watch::{CancellationToken, LoginWatch, TargetUser};
use hp_core::report::{render_human, Probe, ProbeReport, SectionResult};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, info_span};

/// Host Probe Core - what is running on this host, and who is watching
#[derive(Parser)]
#[command(name = "hp-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to probe.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every one-shot probe
    All(AllArgs),

    /// Guess whether we are inside a container
    Container,

    /// Find private keys
    Pkeys(PkeysArgs),

    /// Detect security products (paths, processes, kernel modules)
    Av,

    /// Established network connections
    Net,

    /// Filesystem watches from the auditd ruleset
    Watches(WatchesArgs),

    /// ARP neighbour table
    Arp,

    /// Logged-in users
    Who,

    /// Wait for a user to log in (`*` for anyone)
    Stalk(StalkArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::All(_) => "all",
            Commands::Container => "container",
            Commands::Pkeys(_) => "pkeys",
            Commands::Av => "av",
            Commands::Net => "net",
            Commands::Watches(_) => "watches",
            Commands::Arp => "arp",
            Commands::Who => "who",
            Commands::Stalk(_) => "stalk",
        }
    }
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct AllArgs {
    #[command(flatten)]
    pkeys: PkeysArgs,

    #[command(flatten)]
    watches: WatchesArgs,
}

#[derive(Args, Debug)]
struct PkeysArgs {
    /// Comma-separated directories to scan (default from config)
    #[arg(long)]
    dirs: Option<String>,

    /// Pause before reading each file (milliseconds)
    #[arg(long)]
    sleep_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct WatchesArgs {
    /// auditd ruleset to read (default from config)
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StalkArgs {
    /// User name to wait for, or `*` for any user
    user: String,

    /// Poll interval (milliseconds, default from config)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after reporting this many logins. The watch stops before its next
    /// poll; extra logins from the same poll are not reported
    #[arg(long)]
    max_matches: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,
}

type HostSource = TimedSource<LiveSource>;

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else if cli.global.verbose > 0 {
        Some(LogLevel::Info.more_verbose(cli.global.verbose))
    } else {
        None
    };
    let log_config = LogConfig::from_env(cli_level, cli.global.log_format)
        .with_color(!cli.global.no_color);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id(), get_host_id());
    let _run = ctx.span(cli.command.name()).entered();

    let loaded = match load_probe_config(&cli.global) {
        Ok(loaded) => loaded,
        Err(code) => std::process::exit(code.as_i32()),
    };
    let config = &loaded.config;
    let source = TimedSource::new(
        LiveSource::from_settings(&config.sources),
        config.sources.snapshot_timeout(),
    );

    info!(
        event = event_names::PROBE_STARTED,
        command = cli.command.name(),
        "probe started"
    );

    let exit_code = run_command(&cli.global, &ctx, config, &source, &cli.command);

    info!(
        event = event_names::PROBE_FINISHED,
        exit_code = exit_code.as_i32(),
        "probe finished"
    );
    std::process::exit(exit_code.as_i32());
}

fn load_probe_config(global: &GlobalOpts) -> Result<LoadedConfig, ExitCode> {
    let _section = info_span!("section", stage = %Stage::Init).entered();
    match load_config(global.config.as_deref()) {
        Ok(loaded) => {
            info!(
                event = event_names::CONFIG_LOADED,
                source = %loaded.origin.source,
                path = ?loaded.origin.path,
                "configuration loaded"
            );
            Ok(loaded)
        }
        Err(e) => {
            error!(event = event_names::CONFIG_ERROR, error = %e, "configuration rejected");
            let err = match e {
                ConfigError::ValidationError(v) => hp_common::Error::InvalidConfig(v.to_string()),
                other => hp_common::Error::Config(other.to_string()),
            };
            report_error(global, &err);
            Err(ExitCode::from(&err))
        }
    }
}

fn report_error(global: &GlobalOpts, err: &hp_common::Error) {
    match global.format {
        OutputFormat::Json => {
            let structured = hp_common::StructuredError::from(err);
            println!("{}", structured.to_json());
        }
        OutputFormat::Human => {
            eprintln!("{}", format_error_human(err, !global.no_color));
        }
    }
}

// ============================================================================
// One-shot probes
// ============================================================================

fn run_command(
    global: &GlobalOpts,
    ctx: &LogContext,
    config: &ProbeConfig,
    source: &HostSource,
    command: &Commands,
) -> ExitCode {
    let probe = Probe::new(source, default_registry());
    let mut report = ProbeReport::new(ctx.run_id.clone(), command.name());

    let key_roots = |args: &PkeysArgs| -> (Vec<PathBuf>, Duration) {
        let roots = args
            .dirs
            .as_deref()
            .map(parse_root_list)
            .unwrap_or_else(|| config.credentials.roots.clone());
        let delay = args
            .sleep_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.credentials.inter_file_delay());
        (roots, delay)
    };
    let rules_path = |args: &WatchesArgs| -> PathBuf {
        args.rules
            .clone()
            .unwrap_or_else(|| config.sources.audit_rules_path.clone())
    };

    match command {
        Commands::All(args) => {
            let (roots, delay) = key_roots(&args.pkeys);
            report.container = Some(probe.container());
            report.private_keys = Some(probe.private_keys(&roots, delay));
            report.av = Some(probe.av());
            report.network = Some(probe.network());
            report.watches = Some(probe.watches(&rules_path(&args.watches)));
            report.arp = Some(probe.arp());
            report.users = Some(probe.users());
        }
        Commands::Container => report.container = Some(probe.container()),
        Commands::Pkeys(args) => {
            let (roots, delay) = key_roots(args);
            report.private_keys = Some(probe.private_keys(&roots, delay));
        }
        Commands::Av => report.av = Some(probe.av()),
        Commands::Net => report.network = Some(probe.network()),
        Commands::Watches(args) => report.watches = Some(probe.watches(&rules_path(args))),
        Commands::Arp => report.arp = Some(probe.arp()),
        Commands::Who => report.users = Some(probe.users()),
        Commands::Stalk(args) => return run_stalk(global, config, source, args),
    }

    if let Err(e) = emit_report(global.format, &report) {
        report_error(global, &e);
        return ExitCode::from(&e);
    }

    // A single requested section that failed outranks "no findings".
    let single_failure = match command {
        Commands::Watches(_) => failed_error(report.watches.as_ref()),
        Commands::Arp => failed_error(report.arp.as_ref()),
        Commands::Who => failed_error(report.users.as_ref()),
        _ => None,
    };
    match single_failure {
        Some(code) => code,
        None => ExitCode::from_findings(report.has_findings()),
    }
}

fn failed_error<T>(section: Option<&SectionResult<T>>) -> Option<ExitCode> {
    match section? {
        SectionResult::Failed { .. } => Some(ExitCode::InputError),
        SectionResult::Ok { .. } => None,
    }
}

fn emit_report(format: OutputFormat, report: &ProbeReport) -> hp_common::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            let body = serde_json::to_string_pretty(report)?;
            writeln!(stdout, "{body}")?;
        }
        OutputFormat::Human => write!(stdout, "{}", render_human(report))?,
    }
    stdout.flush()?;
    Ok(())
}

// ============================================================================
// Login watch
// ============================================================================

fn run_stalk(
    global: &GlobalOpts,
    config: &ProbeConfig,
    source: &HostSource,
    args: &StalkArgs,
) -> ExitCode {
    let _section = info_span!("section", stage = %Stage::Watch).entered();

    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.watch.interval());
    if interval.is_zero() {
        let err = hp_common::Error::InvalidConfig("--interval-ms must be > 0".to_string());
        report_error(global, &err);
        return ExitCode::from(&err);
    }

    let cancel = CancellationToken::new();
    if let Some(secs) = args.duration_secs {
        let timer = cancel.clone();
        std::thread::spawn(move || {
            timer.wait_timeout(Duration::from_secs(secs));
            timer.cancel();
        });
    }

    let format = global.format;
    let stopper = cancel.clone();
    let max_matches = args.max_matches;
    let mut seen = 0u64;

    let mut watch = LoginWatch::new(TargetUser::parse(&args.user), interval);
    let summary = watch.run(source, &cancel, |record: &LoginRecord| {
        let reached = |seen: u64| max_matches.is_some_and(|max| seen >= max);
        if reached(seen) {
            return Ok(());
        }
        emit_login(format, record)?;
        seen += 1;
        if reached(seen) {
            stopper.cancel();
        }
        Ok(())
    });

    if format.is_machine() {
        match serde_json::to_string(&serde_json::json!({ "summary": summary })) {
            Ok(line) => println!("{line}"),
            Err(e) => {
                let err = hp_common::Error::from(e);
                report_error(global, &err);
                return ExitCode::from(&err);
            }
        }
    }
    ExitCode::WatchStopped
}

fn emit_login(format: OutputFormat, record: &LoginRecord) -> hp_common::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(&serde_json::json!({ "login": record }))?;
            writeln!(stdout, "{line}")?;
        }
        OutputFormat::Human => writeln!(stdout, "User logged in! {}", record.user)?,
    }
    stdout.flush()?;
    Ok(())
}
