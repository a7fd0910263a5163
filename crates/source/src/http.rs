// Blocking page client with per-request retry and error classification.
//
// 429 and 5xx are retried with doubling backoff (429 honours Retry-After);
// network errors and timeouts likewise. Any other non-success status fails
// at once as permanent.

use std::thread;
use std::time::Duration;

use eventwatch_core::FetchError;

use crate::SourceError;

/// Upper bound on a server-requested Retry-After wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff wait; doubles on each retry.
    pub retry_base_delay: Duration,
    /// Pause before every request after the first.
    pub rate_limit_delay: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("eventwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(2),
        }
    }
}

pub struct PageClient {
    http: reqwest::blocking::Client,
    settings: ClientSettings,
}

enum Attempt {
    Done(String),
    Retry { wait: Option<Duration>, error: FetchError },
    Fail(FetchError),
}

impl PageClient {
    pub fn new(settings: ClientSettings) -> Result<Self, SourceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;
        Ok(Self { http, settings })
    }

    /// Sleep for the configured rate-limit delay.
    pub fn pace(&self) {
        if !self.settings.rate_limit_delay.is_zero() {
            thread::sleep(self.settings.rate_limit_delay);
        }
    }

    fn attempt(&self, url: &str) -> Attempt {
        let resp = match self
            .http
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
        {
            Ok(resp) => resp,
            Err(e) if e.is_builder() => {
                return Attempt::Fail(FetchError::permanent(format!("bad request for {url}: {e}")));
            }
            Err(e) => {
                return Attempt::Retry {
                    wait: None,
                    error: FetchError::transient(format!("GET {url}: {e}")),
                };
            }
        };

        let status = resp.status().as_u16();
        if status == 429 || status >= 500 {
            let wait = if status == 429 {
                resp.headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
            } else {
                None
            };
            return Attempt::Retry {
                wait,
                error: FetchError::transient(format!("GET {url}: HTTP {status}")),
            };
        }
        if !resp.status().is_success() {
            return Attempt::Fail(FetchError::permanent(format!("GET {url}: HTTP {status}")));
        }

        match resp.text() {
            Ok(body) => Attempt::Done(body),
            Err(e) => Attempt::Retry {
                wait: None,
                error: FetchError::transient(format!("GET {url}: reading body: {e}")),
            },
        }
    }

    /// GET `url` as text, retrying transient failures.
    pub fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let mut backoff = self.settings.retry_base_delay;
        let max_retries = self.settings.max_retries;

        for attempt in 0..=max_retries {
            match self.attempt(url) {
                Attempt::Done(body) => {
                    log::debug!("GET {} ok ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Attempt::Fail(error) => return Err(error),
                Attempt::Retry { wait, error } => {
                    if attempt == max_retries {
                        return Err(FetchError::transient(format!(
                            "{} (after {} attempts)",
                            error.message,
                            max_retries + 1
                        )));
                    }
                    let wait = wait.unwrap_or(backoff);
                    log::warn!(
                        "retry {}/{} in {}ms: {}",
                        attempt + 1,
                        max_retries,
                        wait.as_millis(),
                        error.message
                    );
                    thread::sleep(wait);
                    backoff = backoff.saturating_mul(2);
                }
            }
        }

        Err(FetchError::transient(format!("GET {url}: no attempts made")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(max_retries: u32) -> PageClient {
        PageClient::new(ClientSettings {
            request_timeout: Duration::from_secs(5),
            max_retries,
            retry_base_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn returns_body_on_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/mumbai");
            then.status(200).body("<html>ok</html>");
        });

        let body = client(2).get_text(&server.url("/mumbai")).unwrap();

        assert_eq!(body, "<html>ok</html>");
        mock.assert_calls(1);
    }

    #[test]
    fn server_errors_are_retried_then_transient() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let err = client(2).get_text(&server.url("/flaky")).unwrap_err();

        assert!(err.is_transient());
        assert!(err.message.contains("503"));
        mock.assert_calls(3);
    }

    #[test]
    fn not_found_fails_fast_as_permanent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });

        let err = client(3).get_text(&server.url("/gone")).unwrap_err();

        assert!(!err.is_transient());
        mock.assert_calls(1);
    }

    #[test]
    fn rate_limited_with_retry_after_zero_is_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(429).header("retry-after", "0");
        });

        let err = client(1).get_text(&server.url("/busy")).unwrap_err();

        assert!(err.is_transient());
        mock.assert_calls(2);
    }

    #[test]
    fn unreachable_host_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments.
        let err = client(0).get_text("http://127.0.0.1:9/").unwrap_err();
        assert!(err.is_transient());
    }
}
