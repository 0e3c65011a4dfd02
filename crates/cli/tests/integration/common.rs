//! Shared test helpers for CLI integration tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Variables that would leak the host's CI or deployment setup into a test run
const ISOLATED_VARS: [&str; 20] = [
  "GITLAB_CI",
  "JENKINS_URL",
  "CI_COMMIT_REF_NAME",
  "CI_JOB_NAME",
  "CI_JOB_ID",
  "JOB_NAME",
  "JOB_BASE_NAME",
  "BUILD_NUMBER",
  "WPCD_PLATFORM",
  "WPCD_DRIVERS",
  "WPCD_NOTIFICATIONS",
  "WPCD_DISCORD_URL",
  "WPCD_ARTEFACT_DIR",
  "WPCD_BUILD_REF",
  "SSH_HOST",
  "SSH_PORT",
  "SSH_USER",
  "SSH_PASS",
  "SSH_PATH",
  "RUST_LOG",
];

/// Isolated test environment.
///
/// Each test gets its own working directory and download cache.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("work")).unwrap();
    Self { temp }
  }

  /// Directory wpcd is invoked in.
  pub fn work_dir(&self) -> PathBuf {
    self.temp.path().join("work")
  }

  /// Write a file relative to the working directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.work_dir().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Path to a site build tree.
  pub fn tree(&self, build_ref: &str) -> PathBuf {
    self.work_dir().join("build").join(build_ref).join("wordpress")
  }

  /// Get a pre-configured Command for the wpcd binary.
  ///
  /// Runs in the working directory with a private download cache and no
  /// inherited CI, deployment or notification settings.
  pub fn wpcd_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("wpcd");
    cmd.current_dir(self.work_dir());
    for var in ISOLATED_VARS {
      cmd.env_remove(var);
    }
    cmd.env("WPCD_CACHE_DIR", self.temp.path().join("cache"));
    cmd
  }
}

/// Zip archive bytes holding `entries`.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
  let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
  for (name, body) in entries {
    zip.start_file(*name, SimpleFileOptions::default()).unwrap();
    zip.write_all(body.as_bytes()).unwrap();
  }
  zip.finish().unwrap().into_inner()
}

/// Sorted entry names of the zip archive at `path`.
pub fn zip_entries(path: &Path) -> Vec<String> {
  let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
  let mut names: Vec<String> = archive.file_names().map(String::from).collect();
  names.sort();
  names
}
