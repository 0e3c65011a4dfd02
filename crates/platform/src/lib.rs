//! Execution environment detection for wpcd
//!
//! This crate resolves everything the tool reads from its surroundings
//! exactly once per process:
//! - CI system detection (GitLab, Jenkins, local development)
//! - Deployment transport and notification settings
//! - Working, artefact and download cache directories
//!
//! The resulting [`Settings`] value is passed explicitly into every component
//! that needs it; nothing below the CLI reads environment variables.

mod ci;
mod error;
mod paths;
mod settings;

pub use ci::{CiContext, CiSystem};
pub use error::PlatformError;
pub use paths::{normalize_path, resolve_path, resolve_relative};
pub use settings::{Settings, SshSettings};
