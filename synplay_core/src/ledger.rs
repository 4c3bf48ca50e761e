/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::ledger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Append-only record of every component action taken during
    a run, flushed line by line to a ledger file, summarised
    at the end, and persisted as a JSON state document.

  Security / Safety Notes:
    Ledger and state files are written to operator-controlled
    paths; no privileged operations are performed here.

  Dependencies:
    chrono for timestamps, serde/serde_json for the state
    document.

  Operational Scope:
    Owned by the run loop; read by the final report. The ledger
    is the durable partial record when a run is interrupted.
    It is not a rollback journal: nothing is ever undone.

  Revision History:
    2026-10-17 COD  Replaced manifest builder with state ledger.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Write-once entries, deterministic ordering
    - Every record flushed before the next component starts
============================================================*/

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{Result, SynplayError};
use crate::logger::open_append;
use crate::reconcile::Action;
use crate::system::SystemInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Skipped => "skipped",
        }
    }
}

/// One durable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub timestamp: String,
    pub component: String,
    pub action: Action,
    pub outcome: Outcome,
    pub detail: Option<String>,
}

impl LedgerEntry {
    pub fn new(component: &str, action: Action, outcome: Outcome, detail: Option<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            component: component.to_string(),
            action,
            outcome,
            detail,
        }
    }

    /// Ledger file line: `<ts> <component> <action> <outcome>[ :: <detail>]`.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} {} {} {}",
            self.timestamp,
            self.component,
            self.action,
            self.outcome.as_str()
        );
        if let Some(detail) = &self.detail {
            let _ = write!(line, " :: {}", detail.replace('\n', " "));
        }
        line
    }
}

/// Append-only sequence of entries for one run.
pub struct StateLedger {
    entries: Vec<LedgerEntry>,
    sink: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl StateLedger {
    /// Ledger backed by `path`, opened for append.
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = open_append(&path)?;
        Ok(Self {
            entries: Vec::new(),
            sink: Some(BufWriter::new(file)),
            path: Some(path),
        })
    }

    /// Ledger without a backing file (dry runs, tests).
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            sink: None,
            path: None,
        }
    }

    /// Append `entry` and flush it to the backing file before returning.
    /// The in-memory record is kept even if the write fails.
    pub fn record(&mut self, entry: LedgerEntry) -> Result<()> {
        let line = entry.to_line();
        self.entries.push(entry);

        if let Some(sink) = self.sink.as_mut() {
            writeln!(sink, "{line}")
                .and_then(|_| sink.flush())
                .map_err(|err| {
                    SynplayError::Filesystem(format!(
                        "Failed to append ledger entry to {}: {err}",
                        self.path
                            .as_deref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default()
                    ))
                })?;
        }
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for entry in &self.entries {
            match (entry.outcome, entry.action) {
                (Outcome::Failure, _) => {
                    summary.failed += 1;
                    summary.failures.push(FailedComponent {
                        component: entry.component.clone(),
                        action: entry.action,
                        detail: entry
                            .detail
                            .clone()
                            .unwrap_or_else(|| "no detail recorded".into()),
                    });
                }
                (Outcome::Skipped, _) => summary.skipped += 1,
                (Outcome::Success, Action::Upgrade) => summary.upgraded += 1,
                // Success is only recorded for install/upgrade; anything else counts as installed.
                (Outcome::Success, _) => summary.installed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedComponent {
    pub component: String,
    pub action: Action,
    pub detail: String,
}

/// Grouped counts; always sums to the number of recorded entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub installed: usize,
    pub upgraded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailedComponent>,
}

impl LedgerSummary {
    pub fn total(&self) -> usize {
        self.installed + self.upgraded + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Human-readable report for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "→ Installed={} Upgraded={} Skipped={} Failed={}",
            self.installed, self.upgraded, self.skipped, self.failed
        );
        if !self.failures.is_empty() {
            let _ = writeln!(out, "Failed components:");
            for failure in &self.failures {
                let _ = writeln!(
                    out,
                    "  ✗ {} ({}): {}",
                    failure.component, failure.action, failure.detail
                );
            }
        }
        out
    }
}

/// Persisted snapshot of a finished run.
#[derive(Debug, Serialize)]
pub struct StateDocument<'a> {
    pub generated_at: String,
    pub generated_by: &'static str,
    pub dry_run: bool,
    pub host: &'a SystemInfo,
    pub ledger_path: Option<&'a Path>,
    pub summary: LedgerSummary,
    pub entries: &'a [LedgerEntry],
}

impl<'a> StateDocument<'a> {
    pub fn new(ledger: &'a StateLedger, host: &'a SystemInfo, dry_run: bool) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            generated_by: "synplay_core",
            dry_run,
            host,
            ledger_path: ledger.path(),
            summary: ledger.summary(),
            entries: ledger.entries(),
        }
    }
}

/// Persist the state document to `path`, replacing any previous one.
pub fn write_state(document: &StateDocument<'_>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynplayError::Filesystem(format!(
                "Failed to create state directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        SynplayError::Filesystem(format!(
            "Failed to create state file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, document).map_err(|err| {
        SynplayError::Serialization(format!("Failed to write state {}: {err}", path.display()))
    })?;
    Ok(())
}
