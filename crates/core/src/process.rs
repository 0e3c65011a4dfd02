//! External tool invocation
//!
//! rsync, npm, gulp and composer are opaque processes: only their exit code
//! matters. Everything that spawns one goes through [`CommandRunner`] so the
//! commands can be recorded in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::{CoreError, Result};

/// A fully specified external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  /// Added on top of the inherited environment
  pub env: BTreeMap<String, String>,
}

impl ToolCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }
}

/// Renders the command line only; environment values may hold secrets.
impl fmt::Display for ToolCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// What a finished process reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  /// `None` when terminated by a signal
  pub code: Option<i32>,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Runs external commands to completion.
pub trait CommandRunner {
  /// Run `command`, blocking until it exits.
  ///
  /// A non-zero exit is not an error here; failing to start the process is.
  fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
    info!(cmd = %command, "executing command");

    let mut process = Command::new(&command.program);
    process.args(&command.args).envs(&command.env);
    if let Some(cwd) = &command.cwd {
      process.current_dir(cwd);
    }

    debug!(working_dir = ?command.cwd, env = ?command.env.keys().collect::<Vec<_>>(), "spawning process");

    let output = process.output().map_err(|source| CoreError::ToolUnavailable {
      tool: command.program.clone(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !stdout.trim().is_empty() {
      debug!(stdout = %stdout.trim(), "command stdout");
    }
    if !stderr.trim().is_empty() {
      debug!(stderr = %stderr.trim(), "command stderr");
    }

    Ok(ToolOutput {
      code: output.status.code(),
      stderr,
    })
  }
}

/// Run `command` and turn a non-zero exit into [`CoreError::ExternalTool`].
pub fn run_checked(runner: &dyn CommandRunner, command: &ToolCommand) -> Result<ToolOutput> {
  let output = runner.run(command)?;
  if !output.success() {
    if !output.stderr.trim().is_empty() {
      warn!(tool = %command.program, stderr = %output.stderr.trim(), "command failed");
    }
    return Err(CoreError::ExternalTool {
      tool: command.program.clone(),
      code: output.code,
    });
  }
  Ok(output)
}
