//! Site build assembly
//!
//! Produces `build/<ref>/wordpress` for every build in a [`BuildConfig`]:
//! a WordPress core with its layered themes, plugins and must-use plugins,
//! plus the working directory's extra files and compiled assets.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wpcd_platform::resolve_relative;

use crate::config::BuildConfig;
use crate::fetch::Fetch;
use crate::install::StagedArchive;
use crate::plan::{ContentKind, DownloadPlan, Target};
use crate::process::{CommandRunner, ToolCommand, run_checked};
use crate::{CoreError, Result};

/// Loader for plugins installed in `mu-plugins` sub-directories
pub const MU_AUTOLOADER: &str = include_str!("../assets/mu-autoloader.php");

pub const MU_AUTOLOADER_FILE: &str = "mu-autoloader.php";

/// WP Super Cache ships its drop-in inside the plugin; WordPress expects it in `wp-content`
pub const SUPER_CACHE_DROP_IN: &str = "wp-content/plugins/wp-super-cache/advanced-cache.php";

/// Summary of a finished assembly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
  pub builds: usize,
  pub cores: usize,
  pub themes: usize,
  pub plugins: usize,
  /// Builds that received the must-use autoloader
  pub autoloaders: usize,
}

/// Assembles every build tree under `<work_dir>/build`.
pub struct Assembler<'a> {
  work_dir: &'a Path,
  cache_dir: PathBuf,
  fetcher: &'a dyn Fetch,
  runner: &'a dyn CommandRunner,
}

impl<'a> Assembler<'a> {
  pub fn new(
    work_dir: &'a Path,
    cache_dir: impl Into<PathBuf>,
    fetcher: &'a dyn Fetch,
    runner: &'a dyn CommandRunner,
  ) -> Self {
    Self {
      work_dir,
      cache_dir: cache_dir.into(),
      fetcher,
      runner,
    }
  }

  pub fn build_root(&self) -> PathBuf {
    self.work_dir.join("build")
  }

  /// WordPress root of one build
  pub fn tree(&self, build_ref: &str) -> PathBuf {
    self.build_root().join(build_ref).join("wordpress")
  }

  fn content_dir(&self, target: &Target) -> PathBuf {
    self.tree(&target.build_ref).join("wp-content").join(target.kind.dir_name())
  }

  /// Assemble every build described by `config`.
  ///
  /// The configuration is validated and the plan computed before anything on
  /// disk is touched, so an invalid configuration leaves a previous `build/`
  /// in place.
  pub fn assemble(&self, config: &BuildConfig) -> Result<AssemblyReport> {
    config.validate()?;
    let plan = DownloadPlan::compute(config)?;

    self.reset_build_root(&plan)?;
    self.install_cores(&plan)?;
    self.install_content("theme", &plan.themes)?;
    self.install_content("plugin", &plan.plugins)?;
    let autoloaders = self.install_autoloaders(&plan)?;
    self.copy_extra_files(config, &plan)?;
    self.copy_cache_drop_in(&plan)?;
    self.run_asset_hooks(&plan)?;

    info!("resetting file/directory permissions in build folder");
    for build_ref in &plan.builds {
      normalize_permissions(&self.build_root().join(build_ref))?;
    }

    let report = AssemblyReport {
      builds: plan.builds.len(),
      cores: plan.cores.len(),
      themes: plan.themes.len(),
      plugins: plan.plugins.len(),
      autoloaders,
    };
    info!(?report, "assembly complete");
    Ok(report)
  }

  fn reset_build_root(&self, plan: &DownloadPlan) -> Result<()> {
    let root = self.build_root();
    if root.exists() {
      debug!(path = %root.display(), "removing previous build folder");
      fs::remove_dir_all(&root)?;
    }
    for build_ref in &plan.builds {
      fs::create_dir_all(root.join(build_ref))?;
    }
    Ok(())
  }

  fn install_cores(&self, plan: &DownloadPlan) -> Result<()> {
    for (url, builds) in &plan.cores {
      info!(url = %url, "fetching WordPress core");
      let archive = self.fetcher.fetch(url, &self.cache_dir)?;
      let staged = StagedArchive::unpack_core(&archive, url)?;

      for build_ref in builds {
        let tree = self.tree(build_ref);
        debug!(build = %build_ref, url = %url, "installing core");
        staged.copy_to(&tree)?;
        for kind in [ContentKind::Plugin, ContentKind::Theme, ContentKind::MuPlugin] {
          fs::create_dir_all(tree.join("wp-content").join(kind.dir_name()))?;
        }
      }
    }
    Ok(())
  }

  fn install_content(&self, what: &str, artifacts: &BTreeMap<String, Vec<Target>>) -> Result<()> {
    for (url, targets) in artifacts {
      info!(url = %url, "fetching WordPress {}", what);
      let archive = self.fetcher.fetch(url, &self.cache_dir)?;
      let staged = StagedArchive::unpack(&archive, url)?;

      for target in targets {
        let installed = staged.copy_into(&self.content_dir(target))?;
        debug!(build = %target.build_ref, kind = %target.kind, path = %installed.display(), "installed {}", what);
      }
    }
    Ok(())
  }

  fn install_autoloaders(&self, plan: &DownloadPlan) -> Result<usize> {
    let builds = plan.mu_plugin_builds();
    if !builds.is_empty() {
      info!("deploying must-use plugin autoloaders");
    }
    for build_ref in &builds {
      let dest = self
        .tree(build_ref)
        .join("wp-content")
        .join(ContentKind::MuPlugin.dir_name())
        .join(MU_AUTOLOADER_FILE);
      debug!(build = %build_ref, "writing must-use plugin autoloader");
      fs::write(&dest, MU_AUTOLOADER).map_err(|source| CoreError::Copy { path: dest.clone(), source })?;
    }
    Ok(builds.len())
  }

  fn copy_extra_files(&self, config: &BuildConfig, plan: &DownloadPlan) -> Result<()> {
    for file in config.extra_files() {
      let src = resolve_relative(self.work_dir, &file)?;
      if !src.is_file() {
        continue;
      }
      info!(file = %file.display(), "deploying custom file to build folders");
      for build_ref in &plan.builds {
        let dest = resolve_relative(self.tree(build_ref), &file)?;
        copy_file(&src, &dest)?;
      }
    }
    Ok(())
  }

  fn copy_cache_drop_in(&self, plan: &DownloadPlan) -> Result<()> {
    for build_ref in &plan.builds {
      let tree = self.tree(build_ref);
      let drop_in = tree.join(SUPER_CACHE_DROP_IN);
      if drop_in.is_file() {
        info!(build = %build_ref, "copying WP Super Cache driver into place");
        copy_file(&drop_in, &tree.join("wp-content/advanced-cache.php"))?;
      }
    }
    Ok(())
  }

  fn run_asset_hooks(&self, plan: &DownloadPlan) -> Result<()> {
    if self.work_dir.join("package.json").is_file() {
      info!("found 'package.json', running 'npm install'");
      run_checked(self.runner, &ToolCommand::new("npm").arg("install").current_dir(self.work_dir))?;
    }

    if self.work_dir.join("gulpfile.js").is_file() {
      info!("found 'gulpfile.js', running 'gulp' for each build");
      for build_ref in &plan.builds {
        let gulp = ToolCommand::new("gulp")
          .current_dir(self.work_dir)
          .env("BUILD_REF", build_ref.as_str());
        run_checked(self.runner, &gulp)?;
      }
    }
    Ok(())
  }
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
  let copy = || -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest).map(|_| ())
  };
  copy().map_err(|source| CoreError::Copy {
    path: dest.to_path_buf(),
    source,
  })
}

/// Directories 0755, files 0644
#[cfg(unix)]
pub fn normalize_permissions(root: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;

  for entry in walkdir::WalkDir::new(root) {
    let entry = entry.map_err(std::io::Error::other)?;
    let file_type = entry.file_type();
    let mode = if file_type.is_dir() {
      0o755
    } else if file_type.is_file() {
      0o644
    } else {
      continue;
    };
    fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))?;
  }
  Ok(())
}

#[cfg(not(unix))]
pub fn normalize_permissions(_root: &Path) -> Result<()> {
  Ok(())
}
