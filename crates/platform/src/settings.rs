//! Run settings resolved once from the process environment

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ci::CiContext;
use crate::error::PlatformError;
use crate::paths::resolve_path;

/// Platform used when `WPCD_PLATFORM` is unset
pub const DEFAULT_PLATFORM: &str = "rsync";

/// Artefact directory used when `WPCD_ARTEFACT_DIR` is unset
pub const DEFAULT_ARTEFACT_DIR: &str = "wpcd-artefacts";

/// SSH transport parameters for remote deployment
///
/// Every field is optional here; drivers decide which ones they require.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SshSettings {
  pub host: Option<String>,
  pub port: Option<String>,
  pub user: Option<String>,
  pub password: Option<String>,
  pub path: Option<String>,
}

impl fmt::Debug for SshSettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SshSettings")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("user", &self.user)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("path", &self.path)
      .finish()
  }
}

/// Everything wpcd reads from its environment
#[derive(Debug, Clone)]
pub struct Settings {
  /// Directory the tool was invoked in
  pub work_dir: PathBuf,
  pub ci: CiContext,
  /// Deployment platform identifier (`WPCD_PLATFORM`)
  pub platform: String,
  /// Deployment drivers to make available (`WPCD_DRIVERS`)
  pub drivers: Vec<String>,
  /// Notification drivers to enable (`WPCD_NOTIFICATIONS`)
  pub notifications: Vec<String>,
  /// Where module build archives are written
  pub artefact_dir: PathBuf,
  /// Where downloaded artifacts are cached for the duration of a run
  pub cache_dir: PathBuf,
  /// Build selected for site deployment (`WPCD_BUILD_REF`)
  pub build_ref: Option<String>,
  /// Name of the plugin/theme being built or deployed
  pub module_name: String,
  pub ssh: SshSettings,
  pub discord_url: Option<String>,
}

impl Settings {
  /// Resolve settings from the real process environment and working directory.
  pub fn from_env() -> Result<Self, PlatformError> {
    let work_dir = std::env::current_dir().map_err(PlatformError::NoWorkingDirectory)?;
    Ok(Self::from_lookup(&work_dir, &|key| std::env::var(key).ok()))
  }

  /// Resolve settings from an arbitrary variable source.
  ///
  /// Empty values are treated as unset.
  pub fn from_lookup(work_dir: &Path, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let ci = CiContext::resolve(&get);

    let artefact_dir = resolve_path(
      work_dir,
      get("WPCD_ARTEFACT_DIR").unwrap_or_else(|| DEFAULT_ARTEFACT_DIR.to_string()),
    );
    let cache_dir = get("WPCD_CACHE_DIR")
      .map(|dir| resolve_path(work_dir, dir))
      .unwrap_or_else(|| std::env::temp_dir().join("wpcd-downloads"));

    let module_name = get("JOB_BASE_NAME").unwrap_or_else(|| {
      work_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string())
    });

    let settings = Self {
      work_dir: work_dir.to_path_buf(),
      ci,
      platform: get("WPCD_PLATFORM").unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
      drivers: get("WPCD_DRIVERS")
        .map(|v| split_list(&v))
        .unwrap_or_else(|| vec![DEFAULT_PLATFORM.to_string()]),
      notifications: get("WPCD_NOTIFICATIONS").map(|v| split_list(&v)).unwrap_or_default(),
      artefact_dir,
      cache_dir,
      build_ref: get("WPCD_BUILD_REF"),
      module_name,
      ssh: SshSettings {
        host: get("SSH_HOST"),
        port: get("SSH_PORT"),
        user: get("SSH_USER"),
        password: get("SSH_PASS"),
        path: get("SSH_PATH"),
      },
      discord_url: get("WPCD_DISCORD_URL"),
    };

    debug!(
      ci = %settings.ci.system,
      branch = %settings.ci.branch,
      platform = %settings.platform,
      "resolved settings"
    );
    settings
  }

  /// Root of all site build trees (`<work>/build`)
  pub fn build_root(&self) -> PathBuf {
    self.work_dir.join("build")
  }
}

/// Split a comma separated list, dropping blanks
fn split_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}
