//! CI system detection

use std::fmt;

use tracing::debug;

/// Branch assumed when no CI system reports one.
pub const DEFAULT_BRANCH: &str = "develop";

/// The CI system the process is running under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CiSystem {
  GitLab,
  Jenkins,
  Local,
}

impl CiSystem {
  /// Detect the CI system from environment markers.
  ///
  /// GitLab wins over Jenkins when both markers are present.
  pub fn detect(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
    if lookup("GITLAB_CI").is_some() {
      debug!("detected GitLab CI");
      CiSystem::GitLab
    } else if lookup("JENKINS_URL").is_some() {
      debug!("detected Jenkins CI");
      CiSystem::Jenkins
    } else {
      debug!("no specific CI system detected");
      CiSystem::Local
    }
  }

  pub const fn as_str(&self) -> &'static str {
    match self {
      CiSystem::GitLab => "gitlab",
      CiSystem::Jenkins => "jenkins",
      CiSystem::Local => "local",
    }
  }

  /// Variable names for (branch, job name, job id) on this system
  const fn variables(&self) -> (&'static str, &'static str, &'static str) {
    match self {
      CiSystem::GitLab => ("CI_COMMIT_REF_NAME", "CI_JOB_NAME", "CI_JOB_ID"),
      CiSystem::Jenkins => ("GIT_BRANCH", "JOB_NAME", "BUILD_NUMBER"),
      CiSystem::Local => ("WPCD_GIT_BRANCH", "WPCD_JOB_NAME", "WPCD_JOB_ID"),
    }
  }
}

impl fmt::Display for CiSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Branch and job identity reported by the CI system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiContext {
  pub system: CiSystem,
  pub branch: String,
  pub job_name: Option<String>,
  pub job_id: Option<String>,
}

impl CiContext {
  /// Resolve the CI context, reading only the detected system's variables.
  pub fn resolve(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
    let system = CiSystem::detect(lookup);
    let (branch_var, name_var, id_var) = system.variables();

    Self {
      system,
      branch: lookup(branch_var).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
      job_name: lookup(name_var),
      job_id: lookup(id_var),
    }
  }

  /// Job id for log lines, `-` when unknown
  pub fn job_label(&self) -> &str {
    self.job_id.as_deref().unwrap_or("-")
  }
}
