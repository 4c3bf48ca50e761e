/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::command
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Bounded execution of external commands (dpkg, apt, flatpak,
    tar) with uniform diagnostics.

  Security / Safety Notes:
    Commands are spawned directly, never through a shell.
    DEBIAN_FRONTEND is forced to noninteractive.

  Dependencies:
    tokio::process and tokio::time for async, bounded waits.

  Operational Scope:
    Shared by the apt, flatpak, and release backends.

  Revision History:
    2026-10-17 COD  Extracted command helpers from the backends.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Every wait is bounded
============================================================*/

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Result, SynplayError};

/// Run `program args..`, capturing output. Non-zero exit is not an error
/// here; callers decide what a failing status means.
pub async fn capture(program: &str, args: &[&str], limit: Duration) -> Result<Output> {
    let mut command = Command::new(program);
    command
        .args(args)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match timeout(limit, command.output()).await {
        Ok(result) => result.map_err(|err| map_spawn_error(err, program)),
        Err(_) => Err(SynplayError::CommandTimeout {
            command: render(program, args),
            seconds: limit.as_secs(),
        }),
    }
}

/// Run a command and require a zero exit status; returns stdout.
pub async fn run_checked(program: &str, args: &[&str], limit: Duration) -> Result<String> {
    let output = capture(program, args, limit).await?;
    if !output.status.success() {
        return Err(SynplayError::CommandFailure {
            command: render(program, args),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    stdout_utf8(program, output)
}

pub fn stdout_utf8(program: &str, output: Output) -> Result<String> {
    String::from_utf8(output.stdout).map_err(|err| {
        SynplayError::Serialization(format!("{program} emitted invalid UTF-8: {err}"))
    })
}

pub fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

fn map_spawn_error(err: io::Error, command: &str) -> SynplayError {
    if err.kind() == io::ErrorKind::NotFound {
        SynplayError::CommandMissing {
            command: command.into(),
        }
    } else {
        SynplayError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_command_missing() {
        let err = capture("synplay-no-such-binary", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SynplayError::CommandMissing { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = capture("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SynplayError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn non_zero_exit_is_command_failure() {
        let err = run_checked("false", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SynplayError::CommandFailure { status: 1, .. }));
    }

    #[test]
    fn render_joins_arguments() {
        assert_eq!(render("apt-get", &["install", "-y", "steam"]), "apt-get install -y steam");
        assert_eq!(render("lspci", &[]), "lspci");
    }
}
