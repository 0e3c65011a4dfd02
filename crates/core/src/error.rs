//! Error types for wpcd-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a build, test or deploy phase
#[derive(Debug, Error)]
pub enum CoreError {
  /// Malformed or missing configuration, unknown platform, unresolvable layer
  #[error("configuration error: {0}")]
  Config(String),

  #[error("unable to download {url}: {message}")]
  Fetch { url: String, message: String },

  #[error("unable to install '{name}': {message}")]
  Install { name: String, message: String },

  #[error("unable to copy '{}' into place: {source}", .path.display())]
  Copy {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("'{tool}' exited with {}", describe_exit(.code))]
  ExternalTool { tool: String, code: Option<i32> },

  #[error("unable to run '{tool}': {source}")]
  ToolUnavailable {
    tool: String,
    #[source]
    source: std::io::Error,
  },

  /// The deployment transport failed; its exit code becomes the process exit code
  #[error("{driver} deployment failed with {}", describe_exit(.code))]
  Transport { driver: String, code: Option<i32> },

  #[error("'{operation}' is not supported by the {driver} driver")]
  Unsupported { driver: String, operation: String },

  #[error("Platform error: {0}")]
  Platform(#[from] wpcd_platform::PlatformError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

impl CoreError {
  /// Process exit code for this failure.
  ///
  /// Transport failures propagate the sync tool's own code; everything else is 1.
  pub fn exit_code(&self) -> i32 {
    match self {
      CoreError::Transport { code: Some(code), .. } if *code > 0 => *code,
      _ => 1,
    }
  }

  pub(crate) fn install(name: &str, message: impl std::fmt::Display) -> Self {
    CoreError::Install {
      name: name.to_string(),
      message: message.to_string(),
    }
  }
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {}", code),
    None => "no exit code (terminated by signal)".to_string(),
  }
}
