//! Byte retrieval for the derivation steps
//!
//! Network access sits behind [`ByteFetcher`] so the compiler never talks to
//! the network directly. [`HttpFetcher`] is the real implementation;
//! [`MemoryFetcher`] serves canned bytes for offline runs.

use crate::error::{CompilerError, Result};
use crate::types::{DEFAULT_FETCH_RETRIES, DEFAULT_FETCH_TIMEOUT_SECS, RETRY_DELAY_MS};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::time::Duration;

/// Source of bytes addressed by URL
pub trait ByteFetcher {
    /// Open a stream over the bytes at `url`
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>>;
}

/// HTTP fetcher with a request timeout and bounded retries
pub struct HttpFetcher {
    client: Client,
    /// First request plus retries
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_limits(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS), DEFAULT_FETCH_RETRIES)
    }

    /// `max_retries` failed requests are retried before giving up
    pub fn with_limits(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CompilerError::network("<client>", format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_attempts: max_retries.saturating_add(1),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

impl ByteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            log::debug!("Fetching {} (attempt {}/{})", url, attempt, self.max_attempts);

            let failure = match self.client.get(url).send() {
                Ok(response) if response.status().is_success() => return Ok(Box::new(response)),
                Ok(response) => format!("HTTP {}", response.status()),
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_attempts {
                return Err(CompilerError::network(
                    url,
                    format!("{} (after {} attempts)", failure, attempt),
                ));
            }
            log::warn!("Fetching {} failed ({}), retrying...", url, failure);
            std::thread::sleep(self.retry_delay);
        }
    }
}

/// Fetcher backed by an in-memory map; unknown URLs fail like an unreachable host
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(url.into(), bytes.into());
    }
}

impl ByteFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>> {
        match self.entries.get(url) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(CompilerError::network(url, "not available offline")),
        }
    }
}
