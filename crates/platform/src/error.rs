//! Error types for wpcd-platform

use thiserror::Error;

/// Errors that can occur while resolving the execution environment
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("Failed to determine working directory: {0}")]
  NoWorkingDirectory(#[source] std::io::Error),

  #[error("Path error: {0}")]
  InvalidPath(String),
}
