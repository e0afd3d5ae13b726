//! Command Execution
//!
//! Everything dbdeploy does to a deployment target goes through the
//! [`ExecutionContext`] trait: run a command, capture its output, or upload a
//! file. The configuration loader and the database administrator only ever see
//! this trait, so they can be driven by a recording fake in tests.
//!
//! [`ShellExecutor`] is the production implementation. It runs commands through
//! `sh -c` locally, or through `ssh <host>` when a host is configured.
//!
//! No timeouts are applied. A hung command blocks the caller.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use crate::error::{DbDeployError, Result};

/// Capabilities required from the deployment target
pub trait ExecutionContext {
    /// Run a command, failing on non-zero exit
    fn run(&self, command: &str) -> Result<()>;

    /// Run a command and return its standard output
    fn capture(&self, command: &str) -> Result<String>;

    /// Write `content` to `remote_path` on the target
    fn upload(&self, content: &str, remote_path: &str) -> Result<()>;

    /// Absolute path of the current release on the target
    fn current_release_path(&self) -> &str;

    fn log_info(&self, message: &str) {
        tracing::info!("{message}");
    }
}

impl<T: ExecutionContext + ?Sized> ExecutionContext for &T {
    fn run(&self, command: &str) -> Result<()> {
        (**self).run(command)
    }

    fn capture(&self, command: &str) -> Result<String> {
        (**self).capture(command)
    }

    fn upload(&self, content: &str, remote_path: &str) -> Result<()> {
        (**self).upload(content, remote_path)
    }

    fn current_release_path(&self) -> &str {
        (**self).current_release_path()
    }

    fn log_info(&self, message: &str) {
        (**self).log_info(message);
    }
}

/// Upload `content` to a fresh temporary file on the target and return its path
pub fn stage_file<E: ExecutionContext + ?Sized>(ctx: &E, content: &str) -> Result<String> {
    let tmp = ctx.capture("mktemp")?.trim().to_string();
    if tmp.is_empty() {
        return Err(DbDeployError::remote_execution("mktemp", "no temporary path returned"));
    }
    ctx.upload(content, &tmp)?;
    Ok(tmp)
}

/// Quote a value for a POSIX shell
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Runs commands locally or over `ssh`
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    host: Option<String>,
    release_path: String,
}

impl ShellExecutor {
    /// Executor running commands on this machine
    #[must_use]
    pub fn local(release_path: impl Into<String>) -> Self {
        Self { host: None, release_path: release_path.into() }
    }

    /// Executor running commands on `host` through `ssh`
    #[must_use]
    pub fn ssh(host: impl Into<String>, release_path: impl Into<String>) -> Self {
        Self { host: Some(host.into()), release_path: release_path.into() }
    }

    fn command(&self, command: &str) -> Command {
        match &self.host {
            Some(host) => {
                let mut cmd = Command::new("ssh");
                cmd.arg(host).arg(command);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(command);
                cmd
            }
        }
    }

    fn execute(&self, command: &str, stdin: Option<&str>) -> Result<Output> {
        tracing::debug!(command, host = self.host.as_deref(), "executing");

        let mut cmd = self.command(command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| {
                DbDeployError::remote_execution(command, format!("Failed to spawn: {e}"))
            })?;

        if let Some(content) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(content.as_bytes()).map_err(|e| {
                    DbDeployError::remote_execution(command, format!("Failed to write input: {e}"))
                })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| DbDeployError::remote_execution(command, format!("Failed to wait: {e}")))?;

        if output.status.success() {
            Ok(output)
        } else {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            Err(DbDeployError::remote_execution(command, combined))
        }
    }
}

impl ExecutionContext for ShellExecutor {
    fn run(&self, command: &str) -> Result<()> {
        self.execute(command, None).map(|_| ())
    }

    fn capture(&self, command: &str) -> Result<String> {
        let output = self.execute(command, None)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn upload(&self, content: &str, remote_path: &str) -> Result<()> {
        let command = format!("cat > {}", shell_quote(remote_path));
        self.execute(&command, Some(content)).map(|_| ())
    }

    fn current_release_path(&self) -> &str {
        &self.release_path
    }
}
