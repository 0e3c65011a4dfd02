//! Deploy and test phase integration tests.
//!
//! None of these reach a remote host: each fails while the driver is
//! being selected or configured.

use mockito::Matcher;
use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn deploy_site_requires_ssh_host() {
  let env = TestEnv::new();

  env
    .wpcd_cmd()
    .arg("deploy-wp-site")
    .env("SSH_USER", "deploy")
    .env("SSH_PATH", "/var/www/html")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("deploy failed"))
    .stderr(predicate::str::contains("SSH_HOST"));
}

#[test]
fn unknown_platform_is_a_configuration_error() {
  let env = TestEnv::new();

  env
    .wpcd_cmd()
    .arg("deploy-wp-theme")
    .env("WPCD_PLATFORM", "ftp")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("no deployment driver registered for platform 'ftp'"));
}

#[test]
fn rsync_driver_has_no_site_tests() {
  let env = TestEnv::new();

  env
    .wpcd_cmd()
    .arg("test-wp-site")
    .env("SSH_HOST", "web1.example.test")
    .env("SSH_USER", "deploy")
    .env("SSH_PATH", "/var/www/html")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("'test_site_setup' is not supported by the rsync driver"));
}

#[test]
fn failure_is_reported_to_webhook() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let started = server
    .mock("POST", "/hook")
    .match_body(Matcher::Regex("Stage started".to_string()))
    .with_status(204)
    .expect(1)
    .create();
  let failed = server
    .mock("POST", "/hook")
    .match_body(Matcher::Regex(r"FAILED: .*SSH_HOST".to_string()))
    .with_status(204)
    .expect(1)
    .create();
  let succeeded = server
    .mock("POST", "/hook")
    .match_body(Matcher::Regex("completed successfully".to_string()))
    .expect(0)
    .create();

  env
    .wpcd_cmd()
    .arg("deploy-wp-site")
    .env("WPCD_NOTIFICATIONS", "discord")
    .env("WPCD_DISCORD_URL", format!("{}/hook", server.url()))
    .assert()
    .code(1);

  started.assert();
  failed.assert();
  succeeded.assert();
}

#[test]
fn unreachable_webhook_does_not_change_outcome() {
  let env = TestEnv::new();

  env
    .wpcd_cmd()
    .arg("test-wp-theme")
    .env("WPCD_NOTIFICATIONS", "discord")
    .env("WPCD_DISCORD_URL", "http://127.0.0.1:9/hook")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("notification failed"))
    .stderr(predicate::str::contains("'test_theme' is not supported"));
}
