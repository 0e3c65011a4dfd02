//! Deployment drivers
//!
//! A driver ships an assembled site tree or a single module to a target
//! environment. Drivers are looked up by platform id in a [`DriverRegistry`]
//! populated from the configured driver list.

mod rsync;

pub use rsync::RsyncDriver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};
use wpcd_platform::Settings;

use crate::process::CommandRunner;
use crate::{CoreError, Result};

/// What kind of module a deployment ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
  Theme,
  Plugin,
  MuPlugin,
}

impl ModuleKind {
  pub const fn as_str(&self) -> &'static str {
    match self {
      ModuleKind::Theme => "theme",
      ModuleKind::Plugin => "plugin",
      ModuleKind::MuPlugin => "mu_plugin",
    }
  }

  /// Directory under `wp-content` the module lives in
  pub const fn content_dir(&self) -> &'static str {
    match self {
      ModuleKind::Theme => "themes",
      ModuleKind::Plugin => "plugins",
      ModuleKind::MuPlugin => "mu-plugins",
    }
  }
}

impl fmt::Display for ModuleKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A deployment backend.
pub trait DeploymentDriver {
  /// Platform id this driver is registered under
  fn name(&self) -> &str;

  /// Ship the selected site build tree.
  fn deploy_site(&self) -> Result<()>;

  /// Ship the module in the working directory as `kind` named `name`.
  fn deploy_module(&self, kind: ModuleKind, name: &str) -> Result<()>;

  fn deploy_theme(&self, name: &str) -> Result<()> {
    self.deploy_module(ModuleKind::Theme, name)
  }

  fn deploy_plugin(&self, name: &str) -> Result<()> {
    self.deploy_module(ModuleKind::Plugin, name)
  }

  fn deploy_mu_plugin(&self, name: &str) -> Result<()> {
    self.deploy_module(ModuleKind::MuPlugin, name)
  }

  fn test_site_setup(&self) -> Result<()> {
    Err(self.unsupported("test_site_setup"))
  }

  fn test_site_run(&self) -> Result<()> {
    Err(self.unsupported("test_site_run"))
  }

  fn test_site_teardown(&self) -> Result<()> {
    Err(self.unsupported("test_site_teardown"))
  }

  fn unsupported(&self, operation: &str) -> CoreError {
    CoreError::Unsupported {
      driver: self.name().to_string(),
      operation: operation.to_string(),
    }
  }
}

/// Constructs a driver from the run settings
pub type DriverFactory = fn(&Settings, Arc<dyn CommandRunner>) -> Result<Box<dyn DeploymentDriver>>;

/// Drivers this build knows how to construct
const KNOWN_DRIVERS: &[(&str, DriverFactory)] = &[("rsync", RsyncDriver::create)];

/// Platform id to driver constructor
#[derive(Default)]
pub struct DriverRegistry {
  factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register every known driver named in `settings.drivers`.
  ///
  /// Unknown names are logged and skipped.
  pub fn from_settings(settings: &Settings) -> Self {
    let mut registry = Self::new();
    for id in &settings.drivers {
      match KNOWN_DRIVERS.iter().find(|(known, _)| known == id) {
        Some((known, factory)) => registry.register(known, *factory),
        None => error!(driver = %id, "unknown deployment driver, skipping"),
      }
    }
    registry
  }

  pub fn register(&mut self, id: &str, factory: DriverFactory) {
    debug!(driver = %id, "registering deployment driver");
    self.factories.insert(id.to_string(), factory);
  }

  pub fn contains(&self, id: &str) -> bool {
    self.factories.contains_key(id)
  }

  /// Construct the driver registered for `platform`.
  pub fn create(
    &self,
    platform: &str,
    settings: &Settings,
    runner: Arc<dyn CommandRunner>,
  ) -> Result<Box<dyn DeploymentDriver>> {
    let factory = self.factories.get(platform).ok_or_else(|| {
      error!(platform = %platform, "missing driver for platform");
      CoreError::Config(format!("no deployment driver registered for platform '{}'", platform))
    })?;
    factory(settings, runner)
  }
}

impl fmt::Debug for DriverRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.factories.keys()).finish()
  }
}
