//! wpcd-core: build, package and deploy WordPress sites and modules
//!
//! - [`config`] / [`plan`]: `build.yml` and the deduplicated download plan
//! - [`fetch`] / [`install`]: artifact retrieval and archive staging
//! - [`assemble`]: per-build site trees under `build/<ref>/wordpress`
//! - [`module`]: single plugin/theme packaging
//! - [`deploy`]: deployment drivers and their registry
//! - [`job`] / [`notify`]: phase lifecycle and stage notifications

pub mod assemble;
pub mod config;
pub mod deploy;
mod error;
pub mod fetch;
pub mod install;
pub mod job;
pub mod module;
pub mod notify;
pub mod plan;
pub mod process;

pub use assemble::{Assembler, AssemblyReport};
pub use config::BuildConfig;
pub use deploy::{DeploymentDriver, DriverRegistry, ModuleKind, RsyncDriver};
pub use error::CoreError;
pub use fetch::{Fetch, HttpFetcher};
pub use job::{ExceptionHandler, Job, JobHandler, JobKind, JobOutcome, Phase};
pub use module::ModuleBuilder;
pub use notify::{NotificationError, Notifier, Notifiers, StageEvent, WebhookNotifier};
pub use plan::DownloadPlan;
pub use process::{CommandRunner, SystemRunner, ToolCommand, ToolOutput};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
