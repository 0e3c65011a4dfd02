//! `deploy-wp-*`: ship a build or module through the platform driver

use wpcd_core::{Job, JobKind, Result};
use wpcd_platform::Settings;

use crate::output::print_success;

pub fn run(job: &Job, settings: &Settings) -> Result<()> {
  let driver = super::driver(settings)?;

  match job.kind {
    JobKind::Site => driver.deploy_site()?,
    JobKind::Theme => driver.deploy_theme(&job.name)?,
    JobKind::Plugin => driver.deploy_plugin(&job.name)?,
    JobKind::MuPlugin => driver.deploy_mu_plugin(&job.name)?,
  }

  let target = settings.ssh.host.as_deref().unwrap_or(&settings.platform);
  print_success(&format!("Deployed {} {} to {}", job.kind, job.name, target));
  Ok(())
}

