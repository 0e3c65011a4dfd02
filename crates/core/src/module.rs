//! Single plugin/theme packaging
//!
//! A module build copies the working directory (minus development-only files)
//! to a staging folder named after the module, runs its dependency and asset
//! tooling there, and zips the result into `<artefact-dir>/<name>.zip`.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::process::{CommandRunner, ToolCommand, run_checked};
use crate::{CoreError, Result};

/// Entries never copied into a module build, matched against every path component
const EXCLUDED_NAMES: [&str; 2] = ["Jenkinsfile", "package-lock.json"];

/// Directories left out of the packaged archive
const UNPACKAGED_DIRS: [&str; 1] = ["node_modules"];

pub struct ModuleBuilder<'a> {
  work_dir: &'a Path,
  artefact_dir: &'a Path,
  name: &'a str,
  runner: &'a dyn CommandRunner,
}

impl<'a> ModuleBuilder<'a> {
  pub fn new(work_dir: &'a Path, artefact_dir: &'a Path, name: &'a str, runner: &'a dyn CommandRunner) -> Self {
    Self {
      work_dir,
      artefact_dir,
      name,
      runner,
    }
  }

  /// Where the finished archive is written
  pub fn artefact_path(&self) -> PathBuf {
    self.artefact_dir.join(format!("{}.zip", self.name))
  }

  /// Build and package the module, returning the archive path.
  pub fn build(&self) -> Result<PathBuf> {
    if self.name.is_empty() || self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
      return Err(CoreError::Config(format!("invalid module name '{}'", self.name)));
    }

    info!(dir = %self.artefact_dir.display(), "clearing down artefact folder");
    if self.artefact_dir.exists() {
      fs::remove_dir_all(self.artefact_dir)?;
    }
    fs::create_dir_all(self.artefact_dir)?;

    let staging = tempfile::Builder::new().prefix("wpcd-module-").tempdir()?;
    let stage = staging.path().join(self.name);
    info!(src = %self.work_dir.display(), stage = %stage.display(), "copying module sources");
    self.copy_sources(&stage)?;

    if stage.join("composer.json").is_file() {
      info!("found 'composer.json', running 'composer update'");
      run_checked(
        self.runner,
        &ToolCommand::new("composer").args(["update", "--prefer-dist"]).current_dir(&stage),
      )?;
    }
    if stage.join("package.json").is_file() {
      info!("found 'package.json', running 'npm install'");
      run_checked(self.runner, &ToolCommand::new("npm").arg("install").current_dir(&stage))?;
    }
    if stage.join("gulpfile.js").is_file() {
      info!("found 'gulpfile.js', running 'gulp'");
      run_checked(self.runner, &ToolCommand::new("gulp").current_dir(&stage))?;
    }

    let archive = self.artefact_path();
    info!(archive = %archive.display(), "zipping up build folder");
    zip_dir(staging.path(), &stage, &archive)?;
    Ok(archive)
  }

  fn copy_sources(&self, stage: &Path) -> Result<()> {
    let walker = WalkDir::new(self.work_dir)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry));

    for entry in walker {
      let entry = entry.map_err(io::Error::other)?;
      let relative = entry.path().strip_prefix(self.work_dir).map_err(io::Error::other)?;
      let target = stage.join(relative);
      let copied = if entry.file_type().is_dir() {
        fs::create_dir_all(&target)
      } else {
        fs::copy(entry.path(), &target).map(|_| ())
      };
      copied.map_err(|source| CoreError::Copy { path: target, source })?;
    }
    Ok(())
  }

  fn is_excluded(&self, entry: &DirEntry) -> bool {
    if entry.path() == self.artefact_dir {
      return true;
    }
    is_excluded_name(entry.file_name())
  }
}

/// `.git*`, `*-env`, `Jenkinsfile`, `package-lock.json`
fn is_excluded_name(name: &OsStr) -> bool {
  let name = name.to_string_lossy();
  name.starts_with(".git") || name.ends_with("-env") || EXCLUDED_NAMES.iter().any(|excluded| *excluded == name)
}

/// Zip `dir` into `archive`, storing entries relative to `base`.
fn zip_dir(base: &Path, dir: &Path, archive: &Path) -> Result<()> {
  let mut zip = ZipWriter::new(File::create(archive)?);

  let walker = WalkDir::new(dir)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| !(entry.file_type().is_dir() && UNPACKAGED_DIRS.iter().any(|d| entry.file_name() == *d)));

  for entry in walker {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(base).map_err(io::Error::other)?;
    let name = relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    let options = SimpleFileOptions::default().unix_permissions(unix_mode(&entry)?);
    if entry.file_type().is_dir() {
      zip.add_directory(format!("{}/", name), options).map_err(io::Error::other)?;
    } else {
      zip.start_file(name.as_str(), options).map_err(io::Error::other)?;
      io::copy(&mut File::open(entry.path())?, &mut zip)?;
    }
    debug!(entry = %name, "added to archive");
  }

  zip.finish().map_err(io::Error::other)?;
  Ok(())
}

#[cfg(unix)]
fn unix_mode(entry: &DirEntry) -> io::Result<u32> {
  use std::os::unix::fs::PermissionsExt;
  Ok(entry.metadata().map_err(io::Error::other)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn unix_mode(entry: &DirEntry) -> io::Result<u32> {
  Ok(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}
