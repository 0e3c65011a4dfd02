//! Download planning
//!
//! Turns a [`BuildConfig`] into the set of unique artifacts to fetch and, for
//! each artifact, every `(build, kind)` destination that needs a copy. Plans
//! are computed from demand: layers no build references contribute nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::info;

use crate::Result;
use crate::config::{BuildConfig, LayerSpec};

/// Where inside `wp-content` an artifact is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
  Theme,
  Plugin,
  MuPlugin,
}

impl ContentKind {
  /// Directory under `wp-content`
  pub const fn dir_name(&self) -> &'static str {
    match self {
      ContentKind::Theme => "themes",
      ContentKind::Plugin => "plugins",
      ContentKind::MuPlugin => "mu-plugins",
    }
  }

  fn urls(self, layer: &LayerSpec) -> &BTreeSet<String> {
    match self {
      ContentKind::Theme => &layer.themes,
      ContentKind::Plugin => &layer.plugins,
      ContentKind::MuPlugin => &layer.mu_plugins,
    }
  }
}

impl fmt::Display for ContentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.dir_name())
  }
}

/// A single install destination for an artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
  pub build_ref: String,
  pub kind: ContentKind,
}

/// Every artifact to fetch, with the builds that need it
///
/// Maps are keyed by URL, so iteration (and therefore fetch order) is sorted.
/// Destination lists follow build declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
  /// Build references in declaration order
  pub builds: Vec<String>,
  /// Core URL to the builds using it
  pub cores: BTreeMap<String, Vec<String>>,
  pub themes: BTreeMap<String, Vec<Target>>,
  /// Plugins and must-use plugins share one namespace; a URL may land in both
  pub plugins: BTreeMap<String, Vec<Target>>,
}

impl DownloadPlan {
  /// Compute the plan for a configuration.
  ///
  /// Fails only when a build references an undefined layer.
  pub fn compute(config: &BuildConfig) -> Result<Self> {
    let mut resolved: Vec<(&str, Vec<&LayerSpec>)> = Vec::with_capacity(config.builds.len());
    for (build_ref, spec) in &config.builds {
      resolved.push((build_ref.as_str(), config.layers_for(build_ref, spec)?));
    }

    let mut cores: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (build_ref, spec) in &config.builds {
      cores.entry(spec.core.clone()).or_default().push(build_ref.clone());
    }

    let theme_urls = union_urls(&resolved, &[ContentKind::Theme]);
    let plugin_urls = union_urls(&resolved, &[ContentKind::Plugin, ContentKind::MuPlugin]);

    let themes = destinations(&resolved, theme_urls, &[ContentKind::Theme]);
    let plugins = destinations(&resolved, plugin_urls, &[ContentKind::Plugin, ContentKind::MuPlugin]);

    let plan = Self {
      builds: config.builds.iter().map(|(name, _)| name.clone()).collect(),
      cores,
      themes,
      plugins,
    };

    info!(
      cores = plan.cores.len(),
      themes = plan.themes.len(),
      plugins = plan.plugins.len(),
      "identified {} core versions, {} themes and {} plugins to fetch",
      plan.cores.len(),
      plan.themes.len(),
      plan.plugins.len()
    );

    Ok(plan)
  }

  /// Builds that declare at least one must-use plugin, in declaration order
  pub fn mu_plugin_builds(&self) -> Vec<&str> {
    self
      .builds
      .iter()
      .filter(|build_ref| {
        self
          .plugins
          .values()
          .flatten()
          .any(|t| t.kind == ContentKind::MuPlugin && &t.build_ref == *build_ref)
      })
      .map(String::as_str)
      .collect()
  }

  /// Number of distinct downloads the plan performs
  pub fn fetch_count(&self) -> usize {
    self.cores.len() + self.themes.len() + self.plugins.len()
  }
}

fn union_urls(resolved: &[(&str, Vec<&LayerSpec>)], kinds: &[ContentKind]) -> BTreeSet<String> {
  let mut urls = BTreeSet::new();
  for (_, layers) in resolved {
    for layer in layers {
      for kind in kinds {
        urls.extend(kind.urls(layer).iter().cloned());
      }
    }
  }
  urls
}

/// Re-scan every build for each URL to find where it must be installed.
fn destinations(
  resolved: &[(&str, Vec<&LayerSpec>)],
  urls: BTreeSet<String>,
  kinds: &[ContentKind],
) -> BTreeMap<String, Vec<Target>> {
  urls
    .into_iter()
    .filter_map(|url| {
      let mut targets: Vec<Target> = Vec::new();
      for (build_ref, layers) in resolved {
        for kind in kinds {
          let declared = layers.iter().any(|layer| kind.urls(layer).contains(&url));
          let target = Target {
            build_ref: build_ref.to_string(),
            kind: *kind,
          };
          if declared && !targets.contains(&target) {
            targets.push(target);
          }
        }
      }
      (!targets.is_empty()).then_some((url, targets))
    })
    .collect()
}
