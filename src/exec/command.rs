// src/exec/command.rs

//! Individual command runner.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::exec::TaskOutcome;

/// Run `cmd` through the platform shell and report how it went.
///
/// Stdout lines are echoed to our stdout prefixed with the task name; stderr
/// is logged at debug level. Failing to spawn counts as `Failed(-1)`.
pub async fn run_command(task: &str, cmd: &str) -> TaskOutcome {
    match run_command_inner(task, cmd).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(task = %task, error = %err, "task execution error");
            TaskOutcome::Failed(-1)
        }
    }
}

async fn run_command_inner(task: &str, cmd: &str) -> Result<TaskOutcome> {
    info!(task = %task, cmd = %cmd, "starting task process");

    let mut command = shell(cmd);
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let forward_stdout = async {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("[{task}] {line}");
            }
        }
    };

    // Always consume stderr so the pipe never fills.
    let forward_stderr = async {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stderr: {}", line);
            }
        }
    };

    let (status, (), ()) = tokio::join!(child.wait(), forward_stdout, forward_stderr);
    let status = status.with_context(|| format!("waiting for process of task '{}'", task))?;

    let code = status.code().unwrap_or(-1);
    let success = status.success();

    info!(task = %task, exit_code = code, success, "task process exited");

    Ok(if success {
        TaskOutcome::Success
    } else {
        TaskOutcome::Failed(code)
    })
}

// Build a shell command appropriate for the platform.
fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}
