//! Rate-limited HTTP fetching of upstream reference and rate documents.
//!
//! The agency allows 10 requests per 5 seconds and answers with malformed
//! bodies when it is throttling. Every request therefore sleeps
//! `delay * attempt` first, and every body that fails to decode grows the
//! delay by a fixed step until it reaches the ceiling.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::{Backoff, HTTP_TIMEOUT_SECS};
use crate::error::{RatesError, Result};

/// User agent string identifying this tool.
const USER_AGENT: &str = concat!("imf-exchangerates/", env!("CARGO_PKG_VERSION"));

/// Source of structured upstream documents.
///
/// Every component that touches the network goes through this seam, so the
/// rate limit cannot be bypassed and tests can serve fixtures instead.
pub trait Fetch {
    /// Fetch a URL and decode the body as JSON.
    fn fetch_json(&mut self, url: &str) -> Result<serde_json::Value>;

    /// Fetch a URL whose body must be well-formed XML; returns the text.
    fn fetch_xml(&mut self, url: &str) -> Result<String>;
}

/// Create a configured HTTP client.
pub fn create_client() -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Outcome of a single attempt that did not produce a body.
enum Transient {
    /// Worth retrying after backing off.
    Retry(String),
    /// Permanent failure.
    Fatal(RatesError),
}

/// HTTP fetcher that throttles and backs off.
///
/// The delay is carried across calls: once the upstream has pushed back,
/// later requests keep the slower pace.
pub struct RateLimitedFetcher {
    client: Client,
    backoff: Backoff,
    delay: Duration,
}

impl RateLimitedFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(backoff: Backoff) -> Result<Self> {
        Ok(Self::with_client(create_client()?, backoff))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client, backoff: Backoff) -> Self {
        Self {
            client,
            backoff,
            delay: backoff.base_delay,
        }
    }

    /// Current per-attempt delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Fetch `url` and decode it with `decode`, backing off on failures.
    ///
    /// `decode` owns the body, so a decoder that only validates can hand it
    /// back without copying. Fails with `RateLimitExhausted` once the delay
    /// reaches the ceiling.
    fn fetch_with<T>(
        &mut self,
        url: &str,
        decode: impl Fn(String) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let mut attempt: u32 = 1;

        loop {
            if self.delay >= self.backoff.ceiling {
                return Err(RatesError::RateLimitExhausted {
                    url: url.to_string(),
                    delay: self.delay,
                });
            }

            if attempt > 1 {
                tracing::debug!(attempt, url, "Retrying request");
            }
            thread::sleep(self.delay * attempt);

            let failure = match self.get_body(url) {
                Ok(body) => match decode(body) {
                    Ok(document) => return Ok(document),
                    Err(message) => message,
                },
                Err(Transient::Retry(message)) => message,
                Err(Transient::Fatal(e)) => return Err(e),
            };

            self.delay += self.backoff.step;
            tracing::warn!(
                url,
                attempt,
                delay_ms = self.delay.as_millis() as u64,
                reason = %failure,
                "Slowing down to handle rate limiting"
            );
            attempt += 1;
        }
    }

    /// Issue one GET request and read the body as text.
    fn get_body(&self, url: &str) -> std::result::Result<String, Transient> {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(Transient::Retry(e.to_string()));
            }
            Err(e) => return Err(Transient::Fatal(RatesError::Http(e))),
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Transient::Retry(format!("Server responded with {status}")));
        }

        let response = response
            .error_for_status()
            .map_err(|e| Transient::Fatal(RatesError::Http(e)))?;

        response.text().map_err(|e| {
            if e.is_timeout() {
                Transient::Retry(e.to_string())
            } else {
                Transient::Fatal(RatesError::Http(e))
            }
        })
    }
}

impl Fetch for RateLimitedFetcher {
    fn fetch_json(&mut self, url: &str) -> Result<serde_json::Value> {
        self.fetch_with(url, |body| {
            serde_json::from_str(&body).map_err(|e| format!("invalid JSON: {e}"))
        })
    }

    fn fetch_xml(&mut self, url: &str) -> Result<String> {
        // The parsed tree borrows the body and cannot be returned, so callers
        // parse again. This pass only gates truncated or throttled bodies.
        self.fetch_with(url, |body| match roxmltree::Document::parse(&body) {
            Ok(_) => Ok(body),
            Err(e) => Err(format!("invalid XML: {e}")),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::Fetch;
    use crate::error::{RatesError, Result};

    /// Serves canned bodies by URL and records every request.
    #[derive(Default)]
    pub struct FixtureFetcher {
        bodies: HashMap<String, String>,
        pub requests: Vec<String>,
    }

    impl FixtureFetcher {
        pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.bodies.insert(url.into(), body.into());
            self
        }

        fn body(&mut self, url: &str) -> Result<String> {
            self.requests.push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| RatesError::decode("fixture", format!("no body for {url}")))
        }
    }

    impl Fetch for FixtureFetcher {
        fn fetch_json(&mut self, url: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_str(&self.body(url)?)?)
        }

        fn fetch_xml(&mut self, url: &str) -> Result<String> {
            self.body(url)
        }
    }
}
