//! Stage notifications
//!
//! Notifiers report the start and outcome of each phase to an external
//! channel. Delivery is best effort: failures are logged and never change the
//! outcome of the phase being reported.

mod webhook;

pub use webhook::WebhookNotifier;

use thiserror::Error;
use tracing::{debug, error, warn};
use wpcd_platform::Settings;

/// Why a notification could not be delivered
#[derive(Debug, Error)]
pub enum NotificationError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("webhook responded with status {0}")]
  Status(u16),

  #[error("notifier configuration error: {0}")]
  Config(String),
}

/// Lifecycle event for a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent<'a> {
  Started,
  Succeeded,
  Failed(&'a str),
}

/// Delivers stage events to one channel.
pub trait Notifier {
  fn name(&self) -> &str;

  fn notify(&self, stage: &str, event: &StageEvent<'_>) -> Result<(), NotificationError>;
}

/// The notifiers enabled for this run
#[derive(Default)]
pub struct Notifiers {
  notifiers: Vec<Box<dyn Notifier>>,
}

impl Notifiers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Construct every notifier named in `settings.notifications`.
  ///
  /// Unknown ids and construction failures are logged and skipped.
  pub fn from_settings(settings: &Settings) -> Self {
    let mut notifiers = Self::new();
    for id in &settings.notifications {
      let created: Result<Box<dyn Notifier>, NotificationError> = match id.as_str() {
        "discord" => settings
          .discord_url
          .as_deref()
          .ok_or_else(|| NotificationError::Config("WPCD_DISCORD_URL is not set".to_string()))
          .map(|url| Box::new(WebhookNotifier::new(url)) as Box<dyn Notifier>),
        other => {
          warn!(notifier = %other, "unknown notification driver, skipping");
          continue;
        }
      };

      match created {
        Ok(notifier) => notifiers.register(notifier),
        Err(e) => error!(notifier = %id, error = %e, "unable to initialise notifier"),
      }
    }
    notifiers
  }

  pub fn register(&mut self, notifier: Box<dyn Notifier>) {
    debug!(notifier = %notifier.name(), "registering notifier");
    self.notifiers.push(notifier);
  }

  pub fn len(&self) -> usize {
    self.notifiers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.notifiers.is_empty()
  }

  pub fn stage_started(&self, stage: &str) {
    self.dispatch(stage, StageEvent::Started);
  }

  pub fn stage_succeeded(&self, stage: &str) {
    self.dispatch(stage, StageEvent::Succeeded);
  }

  pub fn stage_failed(&self, stage: &str, message: &str) {
    self.dispatch(stage, StageEvent::Failed(message));
  }

  fn dispatch(&self, stage: &str, event: StageEvent<'_>) {
    for notifier in &self.notifiers {
      if let Err(e) = notifier.notify(stage, &event) {
        error!(notifier = %notifier.name(), stage = %stage, error = %e, "notification failed");
      }
    }
  }
}
