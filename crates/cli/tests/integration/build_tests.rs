//! Build command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, zip_bytes, zip_entries};

#[test]
fn build_site_without_config_fails() {
  let env = TestEnv::new();

  env
    .wpcd_cmd()
    .arg("build-wp-site")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("build failed"))
    .stderr(predicate::str::contains("build.yml"));

  assert!(!env.work_dir().join("build").exists());
}

#[test]
fn undefined_layer_fails_before_touching_build_root() {
  let env = TestEnv::new();
  env.write_file(
    "build.yml",
    "builds:\n  default:\n    core: https://downloads.example.test/wp.zip\n    layers: [missing]\n",
  );

  env
    .wpcd_cmd()
    .arg("build-wp-site")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("undefined layer 'missing'"));

  assert!(!env.work_dir().join("build").exists());
}

#[test]
fn build_site_assembles_served_archives() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let core = server
    .mock("GET", "/wordpress.zip")
    .with_body(zip_bytes(&[
      ("wordpress/index.php", "<?php // core"),
      ("wordpress/wp-content/plugins/hello.php", "<?php"),
      ("wordpress/wp-content/plugins/akismet/akismet.php", "<?php"),
    ]))
    .expect(1)
    .create();
  let plugin = server
    .mock("GET", "/contact-form.zip")
    .with_body(zip_bytes(&[("contact-form/contact-form.php", "<?php // form")]))
    .expect(1)
    .create();

  env.write_file(
    "build.yml",
    &format!(
      "builds:\n  staging: {{core: \"{url}/wordpress.zip\", layers: [forms]}}\n  production: {{core: \"{url}/wordpress.zip\", layers: [forms]}}\nlayers:\n  forms:\n    plugins: [\"{url}/contact-form.zip\"]\n",
      url = server.url()
    ),
  );
  env.write_file("robots.txt", "User-agent: *");

  env
    .wpcd_cmd()
    .args(["build-wp-site", "-v"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Assembled 2 build(s)"));

  core.assert();
  plugin.assert();
  for build_ref in ["staging", "production"] {
    let tree = env.tree(build_ref);
    assert!(tree.join("index.php").is_file());
    assert!(tree.join("wp-content/plugins/contact-form/contact-form.php").is_file());
    assert!(!tree.join("wp-content/plugins/akismet").exists());
    assert!(tree.join("robots.txt").is_file());
  }
}

#[test]
fn build_plugin_packages_artefact() {
  let env = TestEnv::new();
  env.write_file("acme-plugin.php", "<?php /* Plugin Name: Acme */");
  env.write_file("includes/api.php", "<?php");
  env.write_file("Jenkinsfile", "pipeline {}");
  env.write_file(".gitignore", "node_modules");
  env.write_file("node_modules/left-pad/index.js", "");

  env
    .wpcd_cmd()
    .arg("build-wp-plugin")
    .env("JOB_BASE_NAME", "acme-plugin")
    .assert()
    .success()
    .stdout(predicate::str::contains("Packaged plugin acme-plugin"));

  let archive = env.work_dir().join("wpcd-artefacts/acme-plugin.zip");
  let entries = zip_entries(&archive);
  assert!(entries.iter().any(|e| e == "acme-plugin/acme-plugin.php"));
  assert!(entries.iter().any(|e| e == "acme-plugin/includes/api.php"));
  assert!(!entries.iter().any(|e| e.contains("Jenkinsfile")));
  assert!(!entries.iter().any(|e| e.contains(".gitignore")));
  assert!(!entries.iter().any(|e| e.contains("node_modules")));
  assert!(!entries.iter().any(|e| e.contains("wpcd-artefacts")));
}
