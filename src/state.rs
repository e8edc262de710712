use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::error::DownloadError;

/// One resource to fetch, fixed once handed to the coordinator.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub destination: PathBuf,
    pub workers: usize,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, workers: usize) -> Result<Self, DownloadError> {
        if workers == 0 {
            return Err(DownloadError::Config("worker count must be greater than 0".into()));
        }
        Ok(Self {
            url: url.into(),
            destination: destination.into(),
            workers,
        })
    }

    /// File name of the destination, for logs and progress labels.
    pub fn display_name(&self) -> String {
        self.destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Inclusive byte offsets `[start, end]` of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A downloaded slice waiting for assembly.
#[derive(Debug, Clone)]
pub struct Segment {
    pub range: ByteRange,
    pub ordinal: usize,
    pub path: PathBuf,
}

/// Result of the metadata request. `total_size == 0` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeProbe {
    pub total_size: u64,
}

impl SizeProbe {
    pub fn unknown() -> Self {
        Self { total_size: 0 }
    }

    pub fn known_total(&self) -> Option<u64> {
        (self.total_size > 0).then_some(self.total_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SingleStream,
    MultiWorker,
}

impl Strategy {
    /// Small or unknown-size resources go over one connection.
    pub fn select(probe: SizeProbe, threshold: u64) -> Self {
        if probe.total_size < threshold {
            Strategy::SingleStream
        } else {
            Strategy::MultiWorker
        }
    }
}
