//! Artifact downloads

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{CoreError, Result};

/// Retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Downloads a single artifact into a directory.
pub trait Fetch {
  /// Download `url` into `dest_dir`, returning the written file.
  fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// HTTP(S) fetcher with bounded retry on transient failures
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: Client,
  retries: u32,
  retry_delay: Duration,
}

/// Outcome of a single download attempt
enum Attempt {
  Done(Vec<u8>),
  Retry(String),
  Fatal(String),
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::with_retries(DEFAULT_RETRIES, DEFAULT_RETRY_DELAY)
  }

  pub fn with_retries(retries: u32, retry_delay: Duration) -> Self {
    Self {
      client: Client::new(),
      retries,
      retry_delay,
    }
  }

  fn attempt(&self, url: &str) -> Attempt {
    let response = match self.client.get(url).send() {
      Ok(response) => response,
      Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => return Attempt::Retry(e.to_string()),
      Err(e) => return Attempt::Fatal(e.to_string()),
    };

    let status = response.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
      return Attempt::Retry(format!("HTTP {}", status));
    }
    if !status.is_success() {
      return Attempt::Fatal(format!("HTTP {}", status));
    }

    match response.bytes() {
      Ok(bytes) => Attempt::Done(bytes.to_vec()),
      Err(e) => Attempt::Retry(e.to_string()),
    }
  }
}

impl Default for HttpFetcher {
  fn default() -> Self {
    Self::new()
  }
}

impl Fetch for HttpFetcher {
  fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
    info!(url = %url, "fetching URL");
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(url_to_filename(url));

    let mut attempt = 0;
    let bytes = loop {
      match self.attempt(url) {
        Attempt::Done(bytes) => break bytes,
        Attempt::Fatal(message) => {
          return Err(CoreError::Fetch {
            url: url.to_string(),
            message,
          });
        }
        Attempt::Retry(message) if attempt < self.retries => {
          attempt += 1;
          warn!(url = %url, attempt, error = %message, "transient download failure, retrying");
          thread::sleep(self.retry_delay);
        }
        Attempt::Retry(message) => {
          return Err(CoreError::Fetch {
            url: url.to_string(),
            message: format!("{} (gave up after {} retries)", message, self.retries),
          });
        }
      }
    };

    let mut file = File::create(&dest)?;
    file.write_all(&bytes)?;
    file.flush()?;

    debug!(path = ?dest, size = bytes.len(), "download complete");
    Ok(dest)
  }
}

/// Convert a URL to a safe file name.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of
/// the URL if nothing usable remains.
pub fn url_to_filename(url: &str) -> String {
  let last = url.split(['?', '#']).next().unwrap_or(url).rsplit('/').next().unwrap_or("");

  let sanitized: String = last
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
        c
      } else {
        '_'
      }
    })
    .collect();

  if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
    return sanitized;
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}
