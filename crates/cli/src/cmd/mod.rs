//! Phase commands and the `<phase>-wp-<kind>` naming scheme

mod build;
mod deploy;

use std::fmt;
use std::sync::Arc;

use wpcd_core::{DeploymentDriver, DriverRegistry, Job, JobHandler, JobKind, JobOutcome, Notifiers, Phase, SystemRunner};
use wpcd_platform::Settings;

const PHASES: [Phase; 3] = [Phase::Build, Phase::Test, Phase::Deploy];
const KINDS: [JobKind; 4] = [JobKind::Site, JobKind::Plugin, JobKind::Theme, JobKind::MuPlugin];

/// A recognised command such as `deploy-wp-theme`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
  pub phase: Phase,
  pub kind: JobKind,
}

impl Invocation {
  pub fn parse(name: &str) -> Option<Self> {
    let (phase, kind) = name.split_once("-wp-")?;
    let phase = PHASES.into_iter().find(|p| p.as_str() == phase)?;
    let kind = KINDS.into_iter().find(|k| k.as_str() == kind)?;
    Some(Self { phase, kind })
  }

  pub fn all() -> impl Iterator<Item = Self> {
    PHASES
      .into_iter()
      .flat_map(|phase| KINDS.into_iter().map(move |kind| Self { phase, kind }))
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-wp-{}", self.phase, self.kind)
  }
}

/// Run one phase inside a job handler.
pub fn run(invocation: Invocation, settings: &Settings) -> JobOutcome {
  let notifiers = Notifiers::from_settings(settings);
  let name = match invocation.kind {
    JobKind::Site => settings.ci.job_name.clone().unwrap_or_else(|| "site".to_string()),
    _ => settings.module_name.clone(),
  };
  let job = Job::new(invocation.kind, name, settings.ci.job_label());

  JobHandler::new(job, &notifiers).run(invocation.phase, |job| match invocation.phase {
    Phase::Build => build::run(job, settings),
    Phase::Test => test::run(job, settings),
    Phase::Deploy => deploy::run(job, settings),
  })
}

/// Construct the driver for the configured platform.
fn driver(settings: &Settings) -> wpcd_core::Result<Box<dyn DeploymentDriver>> {
  DriverRegistry::from_settings(settings).create(&settings.platform, settings, Arc::new(SystemRunner))
}
