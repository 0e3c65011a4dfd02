//! Job lifecycle
//!
//! Every build, test or deploy invocation runs as one [`Job`] phase inside a
//! [`JobHandler`], which reports start and outcome to the configured
//! notifiers and turns the phase result into a process exit code.

use std::fmt;

use tracing::{error, info};

use crate::deploy::ModuleKind;
use crate::notify::Notifiers;
use crate::{CoreError, Result};

/// What a job builds or ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
  Site,
  Plugin,
  Theme,
  MuPlugin,
}

impl JobKind {
  pub const fn as_str(&self) -> &'static str {
    match self {
      JobKind::Site => "site",
      JobKind::Plugin => "plugin",
      JobKind::Theme => "theme",
      JobKind::MuPlugin => "mu-plugin",
    }
  }

  /// The deployable module kind, `None` for sites
  pub const fn module_kind(&self) -> Option<ModuleKind> {
    match self {
      JobKind::Site => None,
      JobKind::Plugin => Some(ModuleKind::Plugin),
      JobKind::Theme => Some(ModuleKind::Theme),
      JobKind::MuPlugin => Some(ModuleKind::MuPlugin),
    }
  }
}

impl fmt::Display for JobKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  Build,
  Test,
  Deploy,
}

impl Phase {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Phase::Build => "build",
      Phase::Test => "test",
      Phase::Deploy => "deploy",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Reacts to a failed phase (cleanup, reporting) before failure is notified.
pub trait ExceptionHandler {
  fn name(&self) -> &str;

  fn handle(&self, error: &CoreError, job: &Job) -> anyhow::Result<()>;
}

/// One invocation's identity and failure hooks
pub struct Job {
  pub kind: JobKind,
  pub name: String,
  pub job_id: String,
  handlers: Vec<Box<dyn ExceptionHandler>>,
}

impl Job {
  pub fn new(kind: JobKind, name: impl Into<String>, job_id: impl Into<String>) -> Self {
    let job = Self {
      kind,
      name: name.into(),
      job_id: job_id.into(),
      handlers: Vec::new(),
    };
    info!(kind = %job.kind, name = %job.name, job = %job.job_id, "initialising job handler");
    job
  }

  pub fn add_exception_handler(&mut self, handler: Box<dyn ExceptionHandler>) {
    info!(handler = %handler.name(), "adding exception handler");
    self.handlers.push(handler);
  }

  fn handle_exception(&self, error: &CoreError) {
    for handler in &self.handlers {
      info!(handler = %handler.name(), "handling exception");
      if let Err(e) = handler.handle(error, self) {
        error!(handler = %handler.name(), error = %e, "exception handler failed");
      }
    }
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job")
      .field("kind", &self.kind)
      .field("name", &self.name)
      .field("job_id", &self.job_id)
      .field("handlers", &self.handlers.len())
      .finish()
  }
}

/// Result of running one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
  Success,
  Failure { message: String, exit_code: i32 },
}

impl JobOutcome {
  pub fn exit_code(&self) -> i32 {
    match self {
      JobOutcome::Success => 0,
      JobOutcome::Failure { exit_code, .. } => *exit_code,
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, JobOutcome::Success)
  }
}

/// Wraps phases of a [`Job`] with start/success/failure notification
pub struct JobHandler<'a> {
  job: Job,
  notifiers: &'a Notifiers,
}

impl<'a> JobHandler<'a> {
  pub fn new(job: Job, notifiers: &'a Notifiers) -> Self {
    Self { job, notifiers }
  }

  pub fn job(&self) -> &Job {
    &self.job
  }

  /// Run `body` as `phase`.
  ///
  /// Errors never escape: they are logged, passed to every exception handler,
  /// reported to the notifiers and mapped to a non-zero exit code.
  pub fn run<F>(&self, phase: Phase, body: F) -> JobOutcome
  where
    F: FnOnce(&Job) -> Result<()>,
  {
    let stage = phase.as_str();
    self.notifiers.stage_started(stage);

    match body(&self.job) {
      Ok(()) => {
        info!(stage = %stage, kind = %self.job.kind, name = %self.job.name, "done");
        self.notifiers.stage_succeeded(stage);
        JobOutcome::Success
      }
      Err(e) => {
        let message = e.to_string();
        error!(stage = %stage, job = %self.job.job_id, "{} failed: {}", stage, message);
        self.job.handle_exception(&e);
        self.notifiers.stage_failed(stage, &message);
        JobOutcome::Failure {
          message,
          exit_code: e.exit_code(),
        }
      }
    }
  }
}
