use std::path::PathBuf;
use std::time::Duration;

use crate::availability::DEFAULT_UNAVAILABLE_THRESHOLD_SECS;
use crate::client::JnapClientBuilder;
use crate::logger::MessageLogMode;
use crate::store::FileSetpointStore;
use crate::{Error, Result};

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STORAGE_PATH: &str = "uponorx265_data.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Controller address, optionally with a port.
    pub host: String,
    pub scan_interval: Duration,
    /// How long polls may keep failing before the proxy asks to be rebuilt.
    pub unavailable_threshold: Duration,
    pub storage_path: PathBuf,
    pub request_timeout: Duration,
    /// Optional NDJSON log of every request and response.
    pub message_log: Option<PathBuf>,
    pub message_log_mode: MessageLogMode,
}

impl Config {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            unavailable_threshold: Duration::from_secs(DEFAULT_UNAVAILABLE_THRESHOLD_SECS as u64),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            message_log: None,
            message_log_mode: MessageLogMode::Diffed,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("UPONOR_HOST")
            .map(|h| h.trim().to_string())
            .ok_or_else(|| Error::Config("UPONOR_HOST is not set".to_string()))?;
        let mut config = Config::new(host);

        if let Some(v) = get("UPONOR_SCAN_INTERVAL_SECS") {
            config.scan_interval = parse_secs("UPONOR_SCAN_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("UPONOR_UNAVAILABLE_THRESHOLD_SECS") {
            config.unavailable_threshold = parse_secs("UPONOR_UNAVAILABLE_THRESHOLD_SECS", &v)?;
        }
        if let Some(v) = get("UPONOR_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("UPONOR_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("UPONOR_STORAGE_PATH") {
            config.storage_path = PathBuf::from(v);
        }
        config.message_log = get("UPONOR_MESSAGE_LOG").map(PathBuf::from);
        if let Some(v) = get("UPONOR_MESSAGE_LOG_MODE") {
            config.message_log_mode = MessageLogMode::from_str_opt(v.trim()).ok_or_else(|| {
                Error::Config(format!(
                    "UPONOR_MESSAGE_LOG_MODE must be \"full\" or \"diffed\", got {v:?}"
                ))
            })?;
        }

        Ok(config)
    }

    pub fn client_builder(&self) -> JnapClientBuilder {
        let builder = JnapClientBuilder::new(&self.host).timeout(self.request_timeout);
        match &self.message_log {
            Some(path) => builder.message_log(self.message_log_mode, path),
            None => builder,
        }
    }

    pub fn setpoint_store(&self) -> FileSetpointStore {
        FileSetpointStore::new(&self.storage_path)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{key} must be a positive number of seconds, got {value:?}"
        ))),
    }
}
