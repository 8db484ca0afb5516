use async_trait::async_trait;

use crate::config::redact_uri;
use crate::error::AppError;

/// Exit status and captured stderr of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Runs the MongoDB dump and restore tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, AppError>;
}

/// Spawns real processes with `tokio::process`.
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, AppError> {
        let printable: Vec<String> = args.iter().map(|arg| redact_uri(arg)).collect();
        tracing::info!(program, args = ?printable, "Running backup command");

        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Backup(format!("Failed to start {program}: {e}")))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Turn a non-zero exit into a `Backup` error carrying the tail of stderr.
pub fn check_output(program: &str, output: &CommandOutput) -> Result<(), AppError> {
    if output.success {
        return Ok(());
    }
    let code = output
        .code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let tail: Vec<&str> = output.stderr.lines().rev().take(5).collect();
    let tail: Vec<&str> = tail.into_iter().rev().collect();
    Err(AppError::Backup(format!(
        "{program} exited with {code}: {}",
        tail.join(" | ")
    )))
}
