//! Helpers for the desktop tools driven as subprocesses

use anyhow::{bail, Context, Result};
use std::process::Output;
use tokio::process::Command;
use tracing::trace;

/// Run a tool to completion and return its raw output, whatever the exit status
pub async fn output(program: &str, args: &[&str]) -> Result<Output> {
    trace!("$ {} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to execute {}", program))
}

/// Run a tool and return its stdout; a non-zero exit is an error carrying stderr
pub async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = output(program, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} {} failed ({}): {}",
            program,
            args.join(" "),
            output.status,
            stderr.trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
