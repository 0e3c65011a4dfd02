//! Archive staging and installation
//!
//! Archives are never unpacked into a destination. Each one is extracted to
//! its own temporary staging directory, its single top-level content folder is
//! located, and independent copies of that folder are made for every
//! destination.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{CoreError, Result};

/// Top-level entries that never count as content
pub const NOISE_ENTRIES: [&str; 2] = ["__MACOSX", ".DS_Store"];

/// Supported archive formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  Zip,
  TarGz,
  Tar,
}

impl ArchiveFormat {
  pub fn detect(path: &Path) -> Option<Self> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".zip") {
      Some(ArchiveFormat::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar") {
      Some(ArchiveFormat::Tar)
    } else {
      None
    }
  }
}

/// An archive extracted to a private staging directory
///
/// The staging directory is removed when the value is dropped.
#[derive(Debug)]
pub struct StagedArchive {
  _staging: TempDir,
  content: PathBuf,
  label: String,
}

impl StagedArchive {
  /// Unpack a theme or plugin archive.
  ///
  /// `label` identifies the artifact in errors (usually its URL).
  pub fn unpack(archive: &Path, label: &str) -> Result<Self> {
    Self::unpack_with(archive, label, &|_| false)
  }

  /// Unpack a WordPress core archive, leaving the bundled themes and plugins behind.
  ///
  /// The `wp-content/themes` and `wp-content/plugins` directories themselves are kept.
  pub fn unpack_core(archive: &Path, label: &str) -> Result<Self> {
    Self::unpack_with(archive, label, &is_bundled_content)
  }

  fn unpack_with(archive: &Path, label: &str, skip: &dyn Fn(&Path) -> bool) -> Result<Self> {
    let format = ArchiveFormat::detect(archive)
      .ok_or_else(|| CoreError::install(label, format!("unsupported archive format: {}", archive.display())))?;

    let staging = tempfile::Builder::new()
      .prefix("wpcd-stage-")
      .tempdir()
      .map_err(|e| CoreError::install(label, format!("unable to create staging directory: {}", e)))?;

    debug!(archive = %archive.display(), staging = %staging.path().display(), ?format, "unpacking archive");

    let file = File::open(archive).map_err(|e| CoreError::install(label, e))?;
    let reader = BufReader::new(file);
    match format {
      ArchiveFormat::Zip => unpack_zip(reader, staging.path(), skip, label)?,
      ArchiveFormat::TarGz => unpack_tar(Archive::new(GzDecoder::new(reader)), staging.path(), skip, label)?,
      ArchiveFormat::Tar => unpack_tar(Archive::new(reader), staging.path(), skip, label)?,
    }

    let content = resolve_content_dir(staging.path(), label)?;
    Ok(Self {
      _staging: staging,
      content,
      label: label.to_string(),
    })
  }

  /// The located content folder inside the staging directory
  pub fn content_dir(&self) -> &Path {
    &self.content
  }

  /// Name of the content folder (e.g. `akismet` for `akismet.4.1.zip`)
  pub fn folder_name(&self) -> &str {
    self.content.file_name().and_then(|n| n.to_str()).unwrap_or_default()
  }

  /// Copy the content folder into `dest_dir`, keeping its name.
  pub fn copy_into(&self, dest_dir: &Path) -> Result<PathBuf> {
    let target = dest_dir.join(self.folder_name());
    self.copy_to(&target)?;
    Ok(target)
  }

  /// Copy the content folder to exactly `target`, replacing anything already there.
  pub fn copy_to(&self, target: &Path) -> Result<()> {
    if target.exists() {
      fs::remove_dir_all(target).map_err(|source| CoreError::Copy {
        path: target.to_path_buf(),
        source,
      })?;
    }
    copy_dir_all(&self.content, target).map_err(|source| CoreError::Copy {
      path: target.to_path_buf(),
      source,
    })?;
    debug!(artifact = %self.label, target = %target.display(), "installed");
    Ok(())
  }
}

/// Unpack `archive` once and copy its content folder into every directory in `dests`.
pub fn install(archive: &Path, label: &str, dests: &[PathBuf]) -> Result<Vec<PathBuf>> {
  let staged = StagedArchive::unpack(archive, label)?;
  dests.iter().map(|dest| staged.copy_into(dest)).collect()
}

/// Locate the single top-level folder of an unpacked archive.
///
/// Noise entries and loose files are ignored.
pub fn resolve_content_dir(staging: &Path, label: &str) -> Result<PathBuf> {
  let mut dirs = Vec::new();
  for entry in fs::read_dir(staging).map_err(|e| CoreError::install(label, e))? {
    let entry = entry.map_err(|e| CoreError::install(label, e))?;
    let name = entry.file_name();
    if NOISE_ENTRIES.iter().any(|noise| name == *noise) {
      continue;
    }
    if entry.path().is_dir() {
      dirs.push(entry.path());
    } else {
      warn!(artifact = %label, entry = %name.to_string_lossy(), "ignoring loose file at archive root");
    }
  }
  dirs.sort();

  match dirs.len() {
    1 => Ok(dirs.remove(0)),
    0 => Err(CoreError::install(label, "archive has no content folder")),
    n => Err(CoreError::install(
      label,
      format!("archive has {} top-level folders, expected exactly one", n),
    )),
  }
}

/// Recursively copy a directory tree, creating `dst`.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
  for entry in WalkDir::new(src).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      copy_symlink(entry.path(), &target)?;
    } else {
      fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(fs::read_link(src)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> io::Result<()> {
  fs::copy(src, target).map(|_| ())
}

/// `<top>/wp-content/{plugins,themes}/<anything>`
fn is_bundled_content(path: &Path) -> bool {
  let parts: Vec<&str> = path
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => part.to_str(),
      _ => None,
    })
    .collect();

  parts.len() > 3 && parts[1] == "wp-content" && (parts[2] == "plugins" || parts[2] == "themes")
}

fn unpack_tar<R: Read>(mut archive: Archive<R>, dest: &Path, skip: &dyn Fn(&Path) -> bool, label: &str) -> Result<()> {
  let entries = archive.entries().map_err(|e| CoreError::install(label, e))?;
  for entry in entries {
    let mut entry = entry.map_err(|e| CoreError::install(label, e))?;
    let path = entry.path().map_err(|e| CoreError::install(label, e))?.into_owned();
    if skip(&path) {
      continue;
    }
    let unpacked = entry.unpack_in(dest).map_err(|e| CoreError::install(label, e))?;
    if !unpacked {
      return Err(CoreError::install(
        label,
        format!("entry '{}' escapes the staging directory", path.display()),
      ));
    }
  }
  Ok(())
}

fn unpack_zip<R: Read + io::Seek>(reader: R, dest: &Path, skip: &dyn Fn(&Path) -> bool, label: &str) -> Result<()> {
  let mut archive = zip::ZipArchive::new(reader).map_err(|e| CoreError::install(label, e))?;

  for i in 0..archive.len() {
    let mut file = archive.by_index(i).map_err(|e| CoreError::install(label, e))?;
    let path = file.enclosed_name().ok_or_else(|| {
      CoreError::install(
        label,
        format!("entry '{}' escapes the staging directory", file.name()),
      )
    })?;
    if skip(&path) {
      continue;
    }

    let dest_path = dest.join(&path);
    let (is_dir, mode) = (file.is_dir(), file.unix_mode());
    extract_zip_entry(&mut file, is_dir, mode, &dest_path).map_err(|e| {
      CoreError::install(label, format!("unable to extract '{}': {}", path.display(), e))
    })?;
  }

  Ok(())
}

fn extract_zip_entry(entry: &mut impl Read, is_dir: bool, mode: Option<u32>, dest_path: &Path) -> io::Result<()> {
  if is_dir {
    return fs::create_dir_all(dest_path);
  }

  if let Some(parent) = dest_path.parent() {
    fs::create_dir_all(parent)?;
  }
  let mut outfile = File::create(dest_path)?;
  io::copy(entry, &mut outfile)?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
      fs::set_permissions(dest_path, fs::Permissions::from_mode(mode))?;
    }
  }
  Ok(())
}
