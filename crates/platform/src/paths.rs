//! Path resolution utilities

use crate::error::PlatformError;
use std::path::{Component, Path, PathBuf};

/// Resolve a path against a base directory
///
/// - Absolute paths are returned as-is
/// - Relative paths are joined onto `base` and normalized
///
/// # Examples
///
/// ```
/// use wpcd_platform::resolve_path;
/// use std::path::Path;
///
/// let path = resolve_path("/srv/site", "./wpcd-artefacts");
/// assert_eq!(path, Path::new("/srv/site/wpcd-artefacts"));
///
/// let path = resolve_path("/srv/site", "/tmp/out");
/// assert_eq!(path, Path::new("/tmp/out"));
/// ```
pub fn resolve_path<B: AsRef<Path>, P: AsRef<Path>>(base: B, path: P) -> PathBuf {
  let path = path.as_ref();
  if path.is_absolute() {
    return path.to_path_buf();
  }
  normalize_path(&base.as_ref().join(path))
}

/// Resolve a relative path that must stay inside `base`
///
/// Used for files copied verbatim into a build tree, where an absolute path
/// or a `..` escaping the base would write outside the tree.
pub fn resolve_relative<B: AsRef<Path>, P: AsRef<Path>>(base: B, relative: P) -> Result<PathBuf, PlatformError> {
  let relative = relative.as_ref();
  if relative.is_absolute() || relative.has_root() {
    return Err(PlatformError::InvalidPath(format!(
      "expected a relative path, got '{}'",
      relative.display()
    )));
  }

  let mut depth = 0usize;
  for component in relative.components() {
    match component {
      Component::ParentDir => {
        if depth == 0 {
          return Err(PlatformError::InvalidPath(format!(
            "'{}' escapes its base directory",
            relative.display()
          )));
        }
        depth -= 1;
      }
      Component::Normal(_) => depth += 1,
      _ => {}
    }
  }

  Ok(normalize_path(&base.as_ref().join(relative)))
}

/// Normalize a path by resolving `.` and `..` components without requiring the path to exist
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut components = Vec::new();

  for component in path.components() {
    match component {
      Component::ParentDir => {
        if matches!(components.last(), Some(Component::Normal(_))) {
          components.pop();
        }
      }
      Component::CurDir => {}
      other => components.push(other),
    }
  }

  components.iter().collect()
}
