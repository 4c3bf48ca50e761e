/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Play-Core error types: recoverable probe and
    install failures, fatal configuration errors, and the
    plumbing failures of external commands and HTTP calls.

  Security / Safety Notes:
    Error contexts carry command lines and paths only; no
    credentials are ever embedded.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Probe/install errors are converted into ledger entries at
    the run-loop boundary; the remaining variants abort the run
    with a stable exit code.

  Revision History:
    2026-10-17 COD  Reworked taxonomy for the reconciliation core.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Play-Core operations.
pub type Result<T> = std::result::Result<T, SynplayError>;

/// Enumerates high-level error domains surfaced by Syn-Play-Core.
#[derive(Debug, Error)]
pub enum SynplayError {
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Command `{command}` timed out after {seconds}s")]
    CommandTimeout { command: String, seconds: u64 },
    #[error("Probe for `{component}` failed: {detail}")]
    Probe { component: String, detail: String },
    #[error("Install of `{component}` failed: {detail}")]
    Install { component: String, detail: String },
    #[error("Component `{component}` is not supported here: {reason}")]
    Unsupported { component: String, reason: String },
    #[error("Fatal component `{component}` failed; run halted: {detail}")]
    Fatal { component: String, detail: String },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynplayError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynplayError::CommandMissing { .. } => ExitCode::from(10),
            SynplayError::CommandFailure { .. } => ExitCode::from(11),
            SynplayError::CommandTimeout { .. } => ExitCode::from(12),
            SynplayError::Probe { .. } => ExitCode::from(13),
            SynplayError::Install { .. } => ExitCode::from(14),
            SynplayError::Unsupported { .. } => ExitCode::from(15),
            SynplayError::Fatal { .. } => ExitCode::from(16),
            SynplayError::Config(_) => ExitCode::from(20),
            SynplayError::Network(_) => ExitCode::from(30),
            SynplayError::Serialization(_) => ExitCode::from(31),
            SynplayError::Filesystem(_) => ExitCode::from(40),
            SynplayError::Runtime(_) => ExitCode::from(50),
            SynplayError::Io(_) => ExitCode::from(41),
        }
    }

    /// Short diagnostic suitable for a ledger `detail` column.
    pub fn detail(&self) -> String {
        match self {
            SynplayError::Probe { detail, .. }
            | SynplayError::Install { detail, .. }
            | SynplayError::Fatal { detail, .. } => detail.clone(),
            SynplayError::Unsupported { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_detail_strips_component_prefix() {
        let err = SynplayError::Install {
            component: "steam".into(),
            detail: "apt-get exited with 100".into(),
        };
        assert_eq!(err.detail(), "apt-get exited with 100");
        assert!(err.to_string().contains("steam"));
    }

    #[test]
    fn plumbing_errors_render_their_display() {
        let err = SynplayError::CommandMissing {
            command: "flatpak".into(),
        };
        assert_eq!(err.detail(), "Required command `flatpak` not found in PATH");
    }

    #[test]
    fn config_and_fatal_codes_differ() {
        let config = SynplayError::Config("bad intent".into()).exit_code();
        let fatal = SynplayError::Fatal {
            component: "nvidia-driver".into(),
            detail: "boom".into(),
        }
        .exit_code();
        assert_ne!(format!("{config:?}"), format!("{fatal:?}"));
    }
}
