//! Chat webhook notifier (Discord-compatible embeds)

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use super::{NotificationError, Notifier, StageEvent};

const GREY: u32 = 0x808080;
const GREEN: u32 = 0x00ff00;
const RED: u32 = 0xff0000;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct Payload<'a> {
  embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
  title: &'a str,
  color: u32,
  description: String,
}

/// Posts one embed per stage event to a webhook URL
pub struct WebhookNotifier {
  client: Client,
  url: String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Self {
    let client = Client::builder()
      .timeout(TIMEOUT)
      .build()
      .unwrap_or_else(|_| Client::new());
    Self { client, url: url.into() }
  }

  fn embed(stage: &str, event: &StageEvent<'_>) -> (u32, String) {
    match event {
      StageEvent::Started => (GREY, format!("(*{}*) Stage started", stage)),
      StageEvent::Succeeded => (GREEN, format!("(*{}*) Stage completed successfully", stage)),
      StageEvent::Failed(message) => (RED, format!("(*{}*) FAILED: {}", stage, message)),
    }
  }
}

impl Notifier for WebhookNotifier {
  fn name(&self) -> &str {
    "discord"
  }

  fn notify(&self, stage: &str, event: &StageEvent<'_>) -> Result<(), NotificationError> {
    let (color, description) = Self::embed(stage, event);
    let payload = Payload {
      embeds: [Embed {
        title: "Notification",
        color,
        description,
      }],
    };

    debug!(stage = %stage, color, "posting webhook notification");
    let response = self.client.post(&self.url).json(&payload).send()?;
    let status = response.status();
    if !status.is_success() {
      return Err(NotificationError::Status(status.as_u16()));
    }
    Ok(())
  }
}
