use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    ACTION_HEADER, GET_ATTRIBUTES, JNAP_PATH, SET_ATTRIBUTES, check_set_attributes,
    get_attributes_payload, parse_get_attributes, set_attributes_payload,
};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries for connection and read failures. Non-200 answers are not retried.
///
/// The delay before retry `n` is zero for the first retry and
/// `backoff_factor * 2^(n-1)` afterwards, capped at `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_factor: Duration::from_secs(3),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(retry - 1);
        self.backoff_factor
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

enum Attempt {
    Retryable(reqwest::Error),
    Fatal(Error),
}

pub struct JnapClientBuilder {
    host: String,
    retry: RetryPolicy,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl JnapClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<JnapClient> {
        // The controller serves plain HTTP or a self-signed certificate on
        // the local network; certificate checks are off on purpose.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(self.timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, path)?),
            _ => None,
        };

        Ok(JnapClient {
            http,
            url: format!("http://{}{}", self.host, JNAP_PATH),
            retry: self.retry,
            logger,
        })
    }
}

/// JSON-over-HTTP client for the controller's `/JNAP/` endpoint.
pub struct JnapClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
    logger: Option<MessageLogger>,
}

impl JnapClient {
    pub fn builder(host: impl Into<String>) -> JnapClientBuilder {
        JnapClientBuilder::new(host)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reads every variable the controller exposes.
    pub async fn fetch_all(&mut self) -> Result<HashMap<String, String>> {
        let body = self.call(GET_ATTRIBUTES, get_attributes_payload()).await?;
        let vars = parse_get_attributes(body)?;
        trace!(count = vars.len(), "fetched variables");

        if let Some(ref mut logger) = self.logger {
            logger.log_poll(&vars);
        }
        Ok(vars)
    }

    /// Writes the given assignments in one request.
    pub async fn write_many(&mut self, vars: &[(String, String)]) -> Result<()> {
        let payload = set_attributes_payload(vars);
        debug!(?vars, "writing variables");
        let body = self.call(SET_ATTRIBUTES, payload).await?;

        if let Some(ref mut logger) = self.logger {
            logger.log_write(&body);
        }
        check_set_attributes(&body)
    }

    async fn call(&mut self, action: &str, payload: Value) -> Result<Value> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request(action, &payload);
        }

        let result = self.post_with_retry(action, &payload).await;
        if let (Err(e), Some(logger)) = (&result, self.logger.as_mut()) {
            logger.log_failure(action, &e.to_string());
        }
        result
    }

    async fn post_with_retry(&self, action: &str, payload: &Value) -> Result<Value> {
        let mut retry = 0;
        loop {
            match self.post(action, payload).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retryable(e)) if retry < self.retry.max_retries => {
                    retry += 1;
                    let delay = self.retry.delay_for(retry);
                    warn!(
                        url = %self.url,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "request failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Attempt::Retryable(e)) => {
                    return Err(Error::Transport {
                        attempts: retry + 1,
                        source: e,
                    });
                }
            }
        }
    }

    async fn post(&self, action: &str, payload: &Value) -> std::result::Result<Value, Attempt> {
        trace!(url = %self.url, action, "POST");
        let resp = self
            .http
            .post(&self.url)
            .header(ACTION_HEADER, action)
            .json(payload)
            .send()
            .await
            .map_err(Attempt::Retryable)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Attempt::Fatal(Error::Status(status)));
        }

        let text = resp.text().await.map_err(Attempt::Retryable)?;
        serde_json::from_str(&text).map_err(|e| {
            Attempt::Fatal(Error::Protocol(format!("response is not JSON: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(2), Duration::from_secs(6));
        assert_eq!(policy.delay_for(3), Duration::from_secs(12));
        assert_eq!(policy.delay_for(4), Duration::from_secs(24));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10), Duration::from_secs(120));
        assert_eq!(policy.delay_for(40), Duration::from_secs(120));
    }

    #[test]
    fn url_targets_jnap_endpoint() {
        let client = JnapClient::builder("192.168.1.50").build().unwrap();
        assert_eq!(client.url(), "http://192.168.1.50/JNAP/");
    }
}
