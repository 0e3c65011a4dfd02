//! rsync-over-ssh deployment

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};
use wpcd_platform::Settings;

use super::{DeploymentDriver, ModuleKind};
use crate::process::{CommandRunner, ToolCommand};
use crate::{CoreError, Result};

/// Paths on the target that a site sync never overwrites or deletes
const SITE_EXCLUDES: [&str; 3] = ["wp-config.php", "wp-salt.php", "wp-content/uploads"];

/// Syncs build output to a remote host with `rsync -e ssh`
pub struct RsyncDriver {
  host: String,
  port: Option<String>,
  user: String,
  password: Option<String>,
  remote_path: String,
  work_dir: PathBuf,
  build_root: PathBuf,
  build_ref: Option<String>,
  branch: String,
  job_id: String,
  runner: Arc<dyn CommandRunner>,
}

impl RsyncDriver {
  /// Build a driver from `SSH_*` settings; host, user and path are required.
  pub fn new(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Result<Self> {
    debug!("initialising rsync driver");
    let ssh = &settings.ssh;
    let required = |value: &Option<String>, var: &str| {
      value
        .clone()
        .ok_or_else(|| CoreError::Config(format!("rsync driver requires {} to be set", var)))
    };

    Ok(Self {
      host: required(&ssh.host, "SSH_HOST")?,
      port: ssh.port.clone(),
      user: required(&ssh.user, "SSH_USER")?,
      password: ssh.password.clone(),
      remote_path: required(&ssh.path, "SSH_PATH")?,
      work_dir: settings.work_dir.clone(),
      build_root: settings.build_root(),
      build_ref: settings.build_ref.clone(),
      branch: settings.ci.branch.clone(),
      job_id: settings.ci.job_label().to_string(),
      runner,
    })
  }

  pub fn create(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Result<Box<dyn DeploymentDriver>> {
    Ok(Box::new(Self::new(settings, runner)?))
  }

  /// Value for `rsync -e`
  ///
  /// The password never appears here; `sshpass -e` reads it from `SSHPASS`.
  fn remote_shell(&self) -> String {
    let mut rsh = String::from("ssh -o StrictHostKeyChecking=no");
    if let Some(port) = &self.port {
      rsh.push_str(&format!(" -p {}", port));
    }
    if self.password.is_some() {
      rsh = format!("sshpass -e {}", rsh);
    }
    rsh
  }

  fn destination(&self, path: &str) -> String {
    format!("{}@{}:{}", self.user, self.host, path)
  }

  fn rsync(&self) -> ToolCommand {
    let command = ToolCommand::new("rsync").args(["-r", "-e"]).arg(self.remote_shell());
    match &self.password {
      Some(password) => command.env("SSHPASS", password.as_str()),
      None => command,
    }
  }

  /// The build tree a site deployment ships
  pub fn site_tree(&self) -> Result<PathBuf> {
    let build_ref = match &self.build_ref {
      Some(build_ref) => build_ref.clone(),
      None => self.only_build()?,
    };

    let tree = self.build_root.join(&build_ref).join("wordpress");
    if !tree.is_dir() {
      return Err(CoreError::Config(format!(
        "build '{}' has not been assembled ({} is missing)",
        build_ref,
        tree.display()
      )));
    }
    Ok(tree)
  }

  fn only_build(&self) -> Result<String> {
    let mut builds: Vec<String> = match fs::read_dir(&self.build_root) {
      Ok(entries) => entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect(),
      Err(_) => Vec::new(),
    };
    builds.sort();

    match builds.len() {
      1 => Ok(builds.remove(0)),
      0 => Err(CoreError::Config(format!(
        "no site build found in {}; run build-wp-site first",
        self.build_root.display()
      ))),
      _ => Err(CoreError::Config(format!(
        "several builds found ({}); set WPCD_BUILD_REF to choose one",
        builds.join(", ")
      ))),
    }
  }

  pub fn site_command(&self, tree: PathBuf) -> ToolCommand {
    self
      .rsync()
      .args(SITE_EXCLUDES.iter().map(|path| format!("--exclude={}", path)))
      .args(["--delete", "--protocol=28", "."])
      .arg(self.destination(&self.remote_path))
      .current_dir(tree)
  }

  pub fn module_command(&self, kind: ModuleKind, name: &str) -> ToolCommand {
    let module_root = format!(
      "{}/wp-content/{}/{}",
      self.remote_path.trim_end_matches('/'),
      kind.content_dir(),
      name
    );
    self
      .rsync()
      .args(["--exclude=.git*", "--delete", "."])
      .arg(self.destination(&module_root))
      .current_dir(&self.work_dir)
  }

  fn sync(&self, command: &ToolCommand) -> Result<()> {
    let output = self.runner.run(command)?;
    debug!(code = ?output.code, "rsync finished");
    if output.success() {
      return Ok(());
    }
    if !output.stderr.trim().is_empty() {
      debug!(stderr = %output.stderr.trim(), "rsync stderr");
    }
    error!(code = ?output.code, "unable to sync into place");
    Err(CoreError::Transport {
      driver: self.name().to_string(),
      code: output.code,
    })
  }
}

impl DeploymentDriver for RsyncDriver {
  fn name(&self) -> &str {
    "rsync"
  }

  fn deploy_site(&self) -> Result<()> {
    let tree = self.site_tree()?;
    info!(
      branch = %self.branch,
      host = %self.host,
      job = %self.job_id,
      tree = %tree.display(),
      "deploying site"
    );
    self.sync(&self.site_command(tree))?;
    info!(branch = %self.branch, host = %self.host, job = %self.job_id, "site deployment successful");
    Ok(())
  }

  fn deploy_module(&self, kind: ModuleKind, name: &str) -> Result<()> {
    info!(%kind, module = %name, branch = %self.branch, host = %self.host, job = %self.job_id, "deploying module");
    self.sync(&self.module_command(kind, name))?;
    info!(%kind, module = %name, host = %self.host, "module deployment successful");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::process::ToolOutput;
  use std::path::Path;
  use std::sync::Mutex;
  use tempfile::TempDir;

  struct RecordingRunner {
    commands: Mutex<Vec<ToolCommand>>,
    code: Option<i32>,
  }

  impl RecordingRunner {
    fn exiting(code: Option<i32>) -> Arc<Self> {
      Arc::new(Self {
        commands: Mutex::new(Vec::new()),
        code,
      })
    }
  }

  impl CommandRunner for RecordingRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
      self.commands.lock().unwrap().push(command.clone());
      Ok(ToolOutput {
        code: self.code,
        stderr: "rsync: connection unexpectedly closed".to_string(),
      })
    }
  }

  fn settings(work_dir: &Path, vars: &[(&str, &str)]) -> Settings {
    let mut all = vec![
      ("SSH_HOST", "web1.example.test"),
      ("SSH_USER", "deploy"),
      ("SSH_PATH", "/var/www/html"),
    ];
    all.extend_from_slice(vars);
    Settings::from_lookup(work_dir, &|key| {
      all.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    })
  }

  fn assembled(builds: &[&str]) -> TempDir {
    let work = TempDir::new().unwrap();
    for build in builds {
      fs::create_dir_all(work.path().join("build").join(build).join("wordpress")).unwrap();
    }
    work
  }

  #[test]
  fn site_deploy_command() {
    let work = assembled(&["default"]);
    let runner = RecordingRunner::exiting(Some(0));
    let driver = RsyncDriver::new(&settings(work.path(), &[]), runner.clone()).unwrap();

    driver.deploy_site().unwrap();

    let commands = runner.commands.lock().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(
      commands[0].to_string(),
      "rsync -r -e ssh -o StrictHostKeyChecking=no --exclude=wp-config.php --exclude=wp-salt.php \
       --exclude=wp-content/uploads --delete --protocol=28 . deploy@web1.example.test:/var/www/html"
    );
    assert_eq!(commands[0].cwd.as_deref(), Some(work.path().join("build/default/wordpress").as_path()));
    assert!(commands[0].env.is_empty());
  }

  #[test]
  fn password_goes_through_environment() {
    let work = assembled(&["default"]);
    let runner = RecordingRunner::exiting(Some(0));
    let driver = RsyncDriver::new(
      &settings(work.path(), &[("SSH_PASS", "hunter2"), ("SSH_PORT", "2222")]),
      runner.clone(),
    )
    .unwrap();

    driver.deploy_site().unwrap();

    let commands = runner.commands.lock().unwrap();
    let command = &commands[0];
    assert_eq!(command.args[2], "sshpass -e ssh -o StrictHostKeyChecking=no -p 2222");
    assert_eq!(command.env.get("SSHPASS").map(String::as_str), Some("hunter2"));
    assert!(!command.args.iter().any(|arg| arg.contains("hunter2")));
  }

  #[test]
  fn module_deploy_targets_content_directory() {
    let work = TempDir::new().unwrap();
    let runner = RecordingRunner::exiting(Some(0));
    let driver = RsyncDriver::new(&settings(work.path(), &[("SSH_PATH", "/var/www/html/")]), runner.clone()).unwrap();

    driver.deploy_plugin("acme").unwrap();
    driver.deploy_mu_plugin("acme-core").unwrap();

    let commands = runner.commands.lock().unwrap();
    assert_eq!(
      commands[0].to_string(),
      "rsync -r -e ssh -o StrictHostKeyChecking=no --exclude=.git* --delete . \
       deploy@web1.example.test:/var/www/html/wp-content/plugins/acme"
    );
    assert!(commands[1].to_string().ends_with(":/var/www/html/wp-content/mu-plugins/acme-core"));
    assert_eq!(commands[0].cwd.as_deref(), Some(work.path()));
  }

  #[test]
  fn transport_failure_carries_exit_code() {
    let work = assembled(&["default"]);
    let runner = RecordingRunner::exiting(Some(23));
    let driver = RsyncDriver::new(&settings(work.path(), &[]), runner).unwrap();

    let err = driver.deploy_site().unwrap_err();
    assert!(matches!(err, CoreError::Transport { code: Some(23), .. }));
    assert_eq!(err.exit_code(), 23);
  }

  #[test]
  fn missing_connection_parameters_fail_fast() {
    let work = TempDir::new().unwrap();
    let settings = Settings::from_lookup(work.path(), &|key| (key == "SSH_HOST").then(|| "h".to_string()));
    let err = RsyncDriver::new(&settings, RecordingRunner::exiting(Some(0))).err().unwrap();
    assert!(matches!(err, CoreError::Config(_)));
    assert!(err.to_string().contains("SSH_USER"));
  }

  #[test]
  fn build_ref_selects_tree() {
    let work = assembled(&["production", "staging"]);
    let runner = RecordingRunner::exiting(Some(0));

    let ambiguous = RsyncDriver::new(&settings(work.path(), &[]), runner.clone()).unwrap();
    let err = ambiguous.deploy_site().unwrap_err();
    assert!(err.to_string().contains("WPCD_BUILD_REF"));

    let selected = RsyncDriver::new(&settings(work.path(), &[("WPCD_BUILD_REF", "staging")]), runner.clone()).unwrap();
    assert_eq!(selected.site_tree().unwrap(), work.path().join("build/staging/wordpress"));

    let missing = RsyncDriver::new(&settings(work.path(), &[("WPCD_BUILD_REF", "qa")]), runner.clone()).unwrap();
    assert!(matches!(missing.site_tree().unwrap_err(), CoreError::Config(_)));
  }

  #[test]
  fn test_hooks_are_unsupported() {
    let work = TempDir::new().unwrap();
    let driver = RsyncDriver::new(&settings(work.path(), &[]), RecordingRunner::exiting(Some(0))).unwrap();
    assert!(matches!(driver.test_site_setup().unwrap_err(), CoreError::Unsupported { .. }));
  }
}
