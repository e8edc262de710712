//! Error types for the download engine

use thiserror::Error;

use crate::state::ByteRange;

/// Errors that can occur while downloading a single resource
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Size probe for {url} failed: {reason}")]
    Probe { url: String, reason: String },

    #[error("GET {url}{} returned HTTP {status}", describe_range(.range))]
    Fetch {
        status: u16,
        url: String,
        range: Option<ByteRange>,
    },

    #[error("Server ignored range {range} for {url} and sent the full body")]
    RangeIgnored { url: String, range: ByteRange },

    #[error("Transfer of {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DownloadError {
    /// Configuration errors cannot be partially honored and end the whole run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, DownloadError::Config(_))
    }

    /// Everything else only fails the resource being downloaded.
    pub fn is_job_fatal(&self) -> bool {
        !self.is_run_fatal()
    }

    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        DownloadError::Transport {
            url: url.to_string(),
            source,
        }
    }
}

fn describe_range(range: &Option<ByteRange>) -> String {
    match range {
        Some(r) => format!(" (bytes {})", r),
        None => String::new(),
    }
}
