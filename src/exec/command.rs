// src/exec/command.rs

//! Shell command bodies.

use std::collections::VecDeque;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::Failure;

use super::body::CommandSpec;

/// Number of trailing stderr lines kept for the failure report.
const STDERR_TAIL: usize = 20;

/// Run `spec` through the platform shell.
///
/// Exit status 0 is success; anything else is a [`Failure`] carrying the
/// exit code, with the tail of stderr as its detail.
pub async fn run_command(spec: CommandSpec, title: String) -> Result<()> {
    info!(node = %title, cmd = %spec.cmd, "starting command");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.cmd);
        c
    };

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for '{title}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let title = title.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(node = %title, "stdout: {}", line);
            }
        });
    }

    let stderr_tail = child.stderr.take().map(|stderr| {
        let title = title.clone();
        tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(node = %title, "stderr: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail).join("\n")
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of '{title}'"))?;

    let stderr = match stderr_tail {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    let code = status.code().unwrap_or(-1);
    info!(node = %title, exit_code = code, success = status.success(), "command exited");

    if status.success() {
        return Ok(());
    }

    let mut failure = Failure::new(format!("command `{}` exited with code {code}", spec.cmd));
    if !stderr.is_empty() {
        failure = failure.with_detail(stderr);
    }
    Err(failure.into())
}
