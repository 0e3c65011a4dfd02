//! Build configuration (`build.yml`)
//!
//! A configuration declares one or more named builds. Each build pairs a
//! WordPress core archive with an ordered list of layers, and each layer
//! contributes sets of theme, plugin and must-use plugin archives:
//!
//! ```yaml
//! builds:
//!   production:
//!     core: https://wordpress.org/wordpress-6.4.tar.gz
//!     layers: [base, shop]
//!   staging:
//!     core: https://wordpress.org/wordpress-6.5.tar.gz
//!     layers: [base, {plugins: [https://example.test/debug-bar.zip]}]
//! layers:
//!   base:
//!     themes: [https://example.test/acme-theme.zip]
//!     mu-plugins: [https://example.test/acme-core.zip]
//!   shop:
//!     plugins: [https://example.test/woocommerce.zip]
//! extra-files: [wp-config.php, robots.txt]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::debug;
use wpcd_platform::resolve_relative;

use crate::{CoreError, Result};

/// Configuration file name, relative to the working directory
pub const CONFIG_FILE: &str = "build.yml";

/// Files copied into every build when `extra-files` is not configured
pub const DEFAULT_EXTRA_FILES: [&str; 4] = ["wp-config.php", "favicon.ico", ".htaccess", "robots.txt"];

/// Top-level build configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildConfig {
  /// Builds in declaration order
  #[serde(deserialize_with = "ordered_builds")]
  pub builds: Vec<(String, BuildSpec)>,
  #[serde(default)]
  pub layers: BTreeMap<String, LayerSpec>,
  #[serde(default)]
  pub extra_files: Option<Vec<PathBuf>>,
}

/// One build variant
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
  /// URL of the WordPress core archive
  pub core: String,
  #[serde(default)]
  pub layers: Vec<LayerRef>,
}

/// A layer applied to a build: either a reference into `layers` or an inline definition
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayerRef {
  Named(String),
  Inline(LayerSpec),
}

/// A reusable bundle of themes, plugins and must-use plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LayerSpec {
  #[serde(default)]
  pub themes: BTreeSet<String>,
  #[serde(default)]
  pub plugins: BTreeSet<String>,
  #[serde(default)]
  pub mu_plugins: BTreeSet<String>,
}

impl BuildConfig {
  /// Load and validate the configuration file at `path`.
  pub fn load(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path).map_err(|e| {
      CoreError::Config(format!("unable to read build configuration {}: {}", path.display(), e))
    })?;
    let config = Self::parse(&content)
      .map_err(|e| CoreError::Config(format!("invalid build configuration {}: {}", path.display(), e)))?;
    debug!(path = %path.display(), builds = config.builds.len(), "loaded build configuration");
    Ok(config)
  }

  /// Parse and validate a configuration document.
  pub fn parse(content: &str) -> Result<Self> {
    let config: BuildConfig = serde_yaml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// Check the invariants serde cannot express.
  pub fn validate(&self) -> Result<()> {
    if self.builds.is_empty() {
      return Err(CoreError::Config("no builds defined".to_string()));
    }

    for (build_ref, spec) in &self.builds {
      if !is_single_segment(build_ref) {
        return Err(CoreError::Config(format!(
          "build name '{}' must be a single path segment",
          build_ref
        )));
      }
      if spec.core.trim().is_empty() {
        return Err(CoreError::Config(format!("build '{}' has no core URL", build_ref)));
      }
      self.layers_for(build_ref, spec)?;
    }

    for file in self.extra_files() {
      resolve_relative(Path::new("."), &file)
        .map_err(|e| CoreError::Config(format!("invalid extra file '{}': {}", file.display(), e)))?;
    }

    Ok(())
  }

  /// Resolve a build's layer list into layer definitions, in declared order.
  pub fn layers_for<'a>(&'a self, build_ref: &str, spec: &'a BuildSpec) -> Result<Vec<&'a LayerSpec>> {
    spec
      .layers
      .iter()
      .map(|layer| match layer {
        LayerRef::Inline(layer) => Ok(layer),
        LayerRef::Named(name) => self.layers.get(name).ok_or_else(|| {
          CoreError::Config(format!("build '{}' references undefined layer '{}'", build_ref, name))
        }),
      })
      .collect()
  }

  /// Files to copy verbatim into every build
  pub fn extra_files(&self) -> Vec<PathBuf> {
    match &self.extra_files {
      Some(files) => files.clone(),
      None => DEFAULT_EXTRA_FILES.iter().map(PathBuf::from).collect(),
    }
  }

  /// Build reference names in declaration order
  pub fn build_refs(&self) -> impl Iterator<Item = &str> {
    self.builds.iter().map(|(name, _)| name.as_str())
  }
}

/// True when `name` is exactly one normal path component (no separators, `.` or `..`)
fn is_single_segment(name: &str) -> bool {
  let mut components = Path::new(name).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(segment)), None) if segment == name
  )
}

/// Deserialize the `builds` mapping keeping its declaration order.
fn ordered_builds<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, BuildSpec)>, D::Error>
where
  D: Deserializer<'de>,
{
  struct BuildsVisitor;

  impl<'de> Visitor<'de> for BuildsVisitor {
    type Value = Vec<(String, BuildSpec)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str("a mapping of build names to build definitions")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
      A: MapAccess<'de>,
    {
      let mut builds: Vec<(String, BuildSpec)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
      while let Some((name, spec)) = map.next_entry::<String, BuildSpec>()? {
        if builds.iter().any(|(existing, _)| *existing == name) {
          return Err(de::Error::custom(format!("duplicate build '{}'", name)));
        }
        builds.push((name, spec));
      }
      Ok(builds)
    }
  }

  deserializer.deserialize_map(BuildsVisitor)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  const SAMPLE: &str = r#"
builds:
  zeta:
    core: https://example.test/wordpress-6.4.tar.gz
    layers: [base]
  alpha:
    core: https://example.test/wordpress-6.5.tar.gz
    layers:
      - base
      - plugins: [https://example.test/debug-bar.zip]
layers:
  base:
    themes: [https://example.test/theme-x.zip, https://example.test/theme-x.zip]
    mu-plugins: [https://example.test/acme-core.zip]
"#;

  #[test]
  fn preserves_build_declaration_order() {
    let config = BuildConfig::parse(SAMPLE).unwrap();
    let refs: Vec<&str> = config.build_refs().collect();
    assert_eq!(refs, vec!["zeta", "alpha"]);
  }

  #[test]
  fn layer_url_lists_collapse_to_sets() {
    let config = BuildConfig::parse(SAMPLE).unwrap();
    let base = &config.layers["base"];
    assert_eq!(base.themes.len(), 1);
    assert!(base.mu_plugins.contains("https://example.test/acme-core.zip"));
    assert!(base.plugins.is_empty());
  }

  #[test]
  fn resolves_named_and_inline_layers() {
    let config = BuildConfig::parse(SAMPLE).unwrap();
    let (name, spec) = &config.builds[1];
    let layers = config.layers_for(name, spec).unwrap();
    assert_eq!(layers.len(), 2);
    assert!(layers[1].plugins.contains("https://example.test/debug-bar.zip"));
  }

  #[test]
  fn undefined_layer_is_a_configuration_error() {
    let err = BuildConfig::parse(
      r#"
builds:
  default:
    core: https://example.test/wp.zip
    layers: [missing]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
    assert!(err.to_string().contains("undefined layer 'missing'"));
  }

  #[test]
  fn empty_builds_rejected() {
    let err = BuildConfig::parse("builds: {}\n").unwrap_err();
    assert!(err.to_string().contains("no builds defined"));
  }

  #[test]
  fn missing_core_rejected() {
    let err = BuildConfig::parse("builds:\n  default:\n    layers: []\n").unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
  }

  #[test]
  fn duplicate_build_names_rejected() {
    let err = BuildConfig::parse(
      r#"
builds:
  a: {core: https://example.test/wp.zip}
  a: {core: https://example.test/wp2.zip}
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate"));
  }

  #[test]
  fn unknown_layer_key_rejected() {
    let err = BuildConfig::parse(
      r#"
builds:
  a: {core: https://example.test/wp.zip, layers: [base]}
layers:
  base:
    plugin: [https://example.test/typo.zip]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
  }

  #[test]
  fn extra_files_default_and_override() {
    let config = BuildConfig::parse(SAMPLE).unwrap();
    assert_eq!(config.extra_files().len(), DEFAULT_EXTRA_FILES.len());

    let config = BuildConfig::parse(
      r#"
builds:
  a: {core: https://example.test/wp.zip}
extra-files: [humans.txt]
"#,
    )
    .unwrap();
    assert_eq!(config.extra_files(), vec![PathBuf::from("humans.txt")]);
  }

  #[test]
  fn build_names_must_be_single_segments() {
    for name in ["../x", "a/b", "", ".", "..", "/abs"] {
      let yaml = format!("builds:\n  \"{}\": {{core: https://example.test/wp.zip}}\n", name);
      let err = BuildConfig::parse(&yaml).unwrap_err();
      assert!(matches!(err, CoreError::Config(_)), "{}: {}", name, err);
      assert!(err.to_string().contains("single path segment"), "{}: {}", name, err);
    }

    assert!(BuildConfig::parse("builds:\n  production-2: {core: https://example.test/wp.zip}\n").is_ok());
  }

  #[test]
  fn escaping_extra_files_rejected() {
    for file in ["../secrets.php", "/etc/passwd", "config/../../x"] {
      let yaml = format!(
        "builds:\n  a: {{core: https://example.test/wp.zip}}\nextra-files: [\"{}\"]\n",
        file
      );
      let err = BuildConfig::parse(&yaml).unwrap_err();
      assert!(matches!(err, CoreError::Config(_)), "{}: {}", file, err);
      assert!(err.to_string().contains("invalid extra file"), "{}: {}", file, err);
    }
  }

  #[test]
  fn load_reports_missing_file() {
    let err = BuildConfig::load(Path::new("/nonexistent/build.yml")).unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
    assert!(err.to_string().contains("/nonexistent/build.yml"));
  }

  #[test]
  fn load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", SAMPLE).unwrap();
    let config = BuildConfig::load(file.path()).unwrap();
    assert_eq!(config.builds.len(), 2);
  }
}
