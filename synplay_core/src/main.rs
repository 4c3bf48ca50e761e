/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Play Core. Detects the host, gathers the
    operator's intent per component, then probes, reconciles,
    installs, and records each one in order.

  Security / Safety Notes:
    Source setup and installs require root; dry runs do not.
    Executes apt/dpkg/flatpak/tar/sysctl/visudo and performs
    HTTPS GET requests only.

  Dependencies:
    clap for CLI parsing, chrono for timestamps, tokio runtime.

  Operational Scope:
    Invoked directly by operators or by the Syn-Play shell layer.

  Revision History:
    2026-10-17 COD  Authored Syn-Play Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Every processed component leaves a ledger line
============================================================*/

mod account;
mod apt;
mod backend;
mod command;
mod component;
mod config;
mod error;
mod flatpak;
mod github;
mod intent;
mod ledger;
mod logger;
mod probe;
mod reconcile;
mod runner;
mod system;
mod tuning;
mod version;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser};

use account::RealUser;
use backend::SystemBackend;
use component::{Category, CATALOG};
use config::SynplayConfig;
use error::{Result, SynplayError};
use intent::{build_requests, Selection, TerminalPrompter};
use ledger::{write_state, StateDocument, StateLedger};
use logger::Logger;

/// Command-line arguments for Syn-Play-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Play-Core",
    version,
    author = "Synavera Systems",
    about = "Gaming stack installer for Debian-family systems"
)]
struct Cli {
    /// Component to process (repeatable; see --list).
    #[arg(long = "component", value_name = "ID", action = ArgAction::Append)]
    components: Vec<String>,
    /// Select every gaming platform (steam, lutris, heroic, protonup).
    #[arg(long, action = ArgAction::SetTrue)]
    all_platforms: bool,
    /// Per-component intent override, e.g. `steam=upgrade`.
    #[arg(long = "intent", value_name = "ID=ACTION", action = ArgAction::Append)]
    intents: Vec<String>,
    /// Force-install every selected component without prompting.
    #[arg(short = 'y', long = "yes", action = ArgAction::SetTrue)]
    yes: bool,
    /// Print the component catalog and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    list: bool,
    /// Probe and decide, but install nothing.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Do not require root.
    #[arg(long, action = ArgAction::SetTrue)]
    skip_root_check: bool,
    /// Do not refresh package lists before querying apt.
    #[arg(long, action = ArgAction::SetTrue)]
    skip_update: bool,
    /// Component whose failure halts the run (repeatable).
    #[arg(long = "fatal", value_name = "ID", action = ArgAction::Append)]
    fatal: Vec<String>,
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Override state document path.
    #[arg(long, value_name = "PATH")]
    state: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

const CATEGORIES: [Category; 5] = [
    Category::Drivers,
    Category::Platforms,
    Category::Compatibility,
    Category::Performance,
    Category::Tools,
];

const INTERRUPTED: u8 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Play-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.list {
        print_catalog();
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = SynplayConfig::load_from_optional_path(cli.config.as_deref())?;
    config.core.fatal_components.extend(cli.fatal.iter().cloned());
    config.core.skip_update |= cli.skip_update;
    component::resolve(&config.core.fatal_components)?;

    ensure_root(&cli)?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("core_{session_stamp}.log")));
    let logger = Logger::new(Some(log_path), cli.verbose)?;
    logger.info("INIT", "Syn-Play Core awakening.");

    let host = system::detect(&logger).await;
    let owner = RealUser::detect();
    logger.info(
        "USER",
        format!("Acting for {} (home {})", owner.name, owner.home.display()),
    );

    let selection = Selection {
        components: cli.components.clone(),
        all_platforms: cli.all_platforms,
        intents: cli.intents.clone(),
        assume_yes: cli.yes,
    };
    let requests = build_requests(&selection, &host, &mut TerminalPrompter)?;
    if requests.is_empty() {
        logger.warn("EMPTY", "No components selected; exiting");
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }
    logger.info(
        "REQUESTS",
        format!(
            "{} component(s): {}",
            requests.len(),
            requests
                .iter()
                .map(|r| r.component.id)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    );

    let mut ledger = if cli.dry_run {
        StateLedger::in_memory()
    } else {
        StateLedger::open(
            config
                .log_dir()
                .join(format!("ledger_{session_stamp}.log")),
        )?
    };
    let backend = SystemBackend::new(&config, &host, owner)?;

    let outcome = tokio::select! {
        result = runner::run(
            &backend,
            &requests,
            &config,
            &host,
            cli.dry_run,
            &mut ledger,
            &logger,
        ) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let halted = match outcome {
        Some(Ok(())) => None,
        Some(Err(err)) => Some(err),
        None => {
            logger.warn(
                "INTERRUPT",
                format!(
                    "Interrupted after {} of {} component(s)",
                    ledger.entries().len(),
                    requests.len()
                ),
            );
            println!("{}", ledger.summary().render());
            logger.finalize()?;
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };

    let summary = ledger.summary();
    println!("{}", summary.render());

    if !cli.dry_run {
        let state_path = cli.state.clone().unwrap_or_else(|| config.state_path());
        write_state(&StateDocument::new(&ledger, &host, cli.dry_run), &state_path)?;
        logger.info(
            "STATE",
            format!("State written to {}", state_path.display()),
        );
    }

    logger.info(
        "SUMMARY",
        format!(
            "installed={} upgraded={} skipped={} failed={}",
            summary.installed, summary.upgraded, summary.skipped, summary.failed
        ),
    );
    let (warnings, errors) = logger.counts();
    if let Some(path) = logger.path() {
        println!(
            "→ Log: {} ({warnings} warning(s), {errors} error(s))",
            path.display()
        );
    }
    if let Some(path) = ledger.path() {
        println!("→ Ledger: {}", path.display());
    }
    logger.info("COMPLETE", "Play field prepared.");
    logger.finalize()?;

    if let Some(err) = halted {
        return Err(err);
    }
    if summary.has_failures() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn ensure_root(cli: &Cli) -> Result<()> {
    if cli.dry_run || cli.skip_root_check {
        return Ok(());
    }
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(SynplayError::Runtime(
            "Installing requires root; re-run with sudo or use --dry-run".into(),
        ));
    }
    Ok(())
}

fn print_catalog() {
    for category in CATEGORIES {
        println!("{category}:");
        for component in CATALOG.iter().filter(|c| c.category == category) {
            let note = if component.ubuntu_only {
                " (Ubuntu family only)"
            } else {
                ""
            };
            println!(
                "  {:<12} {:<22} [{}]{note}",
                component.id,
                component.name,
                component.method.label()
            );
        }
    }
}
