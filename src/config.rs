use reqwest::Client;
use std::time::Duration;

use crate::error::DownloadError;

/// Resources smaller than this are fetched over a single connection.
pub const SINGLE_STREAM_THRESHOLD: u64 = 1024 * 1024;

pub const DEFAULT_WORKERS: usize = 8;

/// Engine settings shared by every job of a run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workers: usize,
    pub single_stream_threshold: u64,
    /// `None` leaves the transport default in place.
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            single_stream_threshold: SINGLE_STREAM_THRESHOLD,
            connect_timeout: None,
            request_timeout: None,
            user_agent: format!("axsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.workers == 0 {
            return Err(DownloadError::Config("worker count must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn build_client(&self) -> Result<Client, DownloadError> {
        let mut builder = Client::builder().user_agent(self.user_agent.as_str());
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| DownloadError::Config(format!("failed to build HTTP client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.single_stream_threshold, 1_048_576);
        assert!(config.connect_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_is_config_error() {
        let err = EngineConfig::default().with_workers(0).validate().unwrap_err();
        assert!(err.is_run_fatal());
    }
}
