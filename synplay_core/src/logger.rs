/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Session logging for Syn-Play-Core: every probe, decision,
    and install step lands in an append-only, UTC-stamped log.

  Security / Safety Notes:
    Only command lines, versions, and paths are logged; command
    environments are never written out.

  Dependencies:
    chrono for timestamps, sha2 for the session digest.

  Operational Scope:
    One logger per invocation, shared by reference with every
    module that talks to the outside world.

  Revision History:
    2026-10-17 COD  Adapted session logger for Syn-Play.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynplayError};

/// Structured log level for Syn-Play-Core events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Session logger; writes to stderr and optionally to a file.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
    echo: bool,
    warnings: Cell<usize>,
    errors: Cell<usize>,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally to a file.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match path.as_deref() {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_append(file_path)?))),
            None => None,
        };

        Ok(Self {
            file,
            path,
            verbose,
            echo: true,
            warnings: Cell::new(0),
            errors: Cell::new(0),
        })
    }

    /// Logger that records nothing to stderr; used where output would be noise.
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            file: None,
            path: None,
            verbose: false,
            echo: false,
            warnings: Cell::new(0),
            errors: Cell::new(0),
        }
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        match level {
            LogLevel::Warn => self.warnings.set(self.warnings.get() + 1),
            LogLevel::Error => self.errors.set(self.errors.get() + 1),
            _ => {}
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let payload = format!(
            "{timestamp} [{}] [{}] {}",
            level.as_str(),
            code,
            message.as_ref()
        );

        if self.echo
            && (self.verbose || level == LogLevel::Error || level == LogLevel::Warn)
        {
            eprintln!("{payload}");
        }

        let Some(file) = &self.file else {
            return;
        };
        if let Ok(mut guard) = file.lock() {
            if writeln!(guard, "{payload}").and_then(|_| guard.flush()).is_err() {
                eprintln!(
                    "{timestamp} [{}] [LOGGER] Failed to write to log file",
                    LogLevel::Error.as_str()
                );
            }
        }
    }

    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Number of WARN and ERROR events emitted so far.
    pub fn counts(&self) -> (usize, usize) {
        (self.warnings.get(), self.errors.get())
    }

    /// Return the path backing this logger, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Compute and persist a SHA-256 digest of the log file next to it.
    pub fn finalize(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.path() else {
            return Ok(None);
        };
        if let Some(file) = &self.file {
            if let Ok(mut guard) = file.lock() {
                guard.flush()?;
            }
        }

        let data = std::fs::read(path).map_err(|err| {
            SynplayError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);

        let mut hash_os = path.as_os_str().to_os_string();
        hash_os.push(".hash");
        let hash_path = PathBuf::from(hash_os);
        let mut file = File::create(&hash_path).map_err(|err| {
            SynplayError::Filesystem(format!(
                "Failed to create hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        writeln!(
            file,
            "{:x}  {}",
            digest,
            path.file_name().unwrap_or_default().to_string_lossy()
        )
        .map_err(|err| {
            SynplayError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        Ok(Some(hash_path))
    }
}

/// Open `path` for appending, creating parent directories first.
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynplayError::Filesystem(format!(
                "Failed to create directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SynplayError::Filesystem(format!("Failed to open {}: {err}", path.display()))
        })
}
