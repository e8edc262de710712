use futures::StreamExt;
use indicatif::HumanBytes;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH};
use reqwest::{Client, Response};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::assembler::{assemble, discard_segments};
use crate::config::EngineConfig;
use crate::error::DownloadError;
use crate::fetcher::{fetch_segment, segment_path};
use crate::progress::{Progress, ProgressTracker};
use crate::ranges::plan;
use crate::state::{ByteRange, DownloadJob, Segment, SizeProbe, Strategy};

/// What a finished job did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub strategy: Strategy,
    pub bytes: u64,
}

/// Probes each resource, picks a strategy and drives the transfer.
pub struct Downloader {
    client: Client,
    config: EngineConfig,
    progress: Arc<dyn Progress>,
}

impl Downloader {
    pub fn new(config: EngineConfig, progress: Arc<dyn Progress>) -> Result<Self, DownloadError> {
        config.validate()?;
        let client = config.build_client()?;
        Ok(Self {
            client,
            config,
            progress,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// HEAD request for `Content-Length`. A missing header is an unknown
    /// size, not an error.
    pub async fn probe(&self, url: &str) -> Result<SizeProbe, DownloadError> {
        let response = self
            .client
            .head(url)
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| DownloadError::Probe {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::Probe {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        // Read the header itself: the body size hint of a HEAD response is always 0.
        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        Ok(SizeProbe { total_size })
    }

    pub async fn run(&self, job: &DownloadJob) -> Result<DownloadOutcome, DownloadError> {
        if job.workers == 0 {
            return Err(DownloadError::Config("worker count must be greater than 0".into()));
        }
        ensure_parent_exists(&job.destination)?;

        let name = job.display_name();
        let probe = match self.probe(&job.url).await {
            Ok(probe) => probe,
            Err(e) => {
                warn!("{}; continuing with unknown size", e);
                SizeProbe::unknown()
            }
        };

        let strategy = Strategy::select(probe, self.config.single_stream_threshold);
        let bytes = match strategy {
            Strategy::SingleStream => {
                info!("{} is small ({}), downloading over a single stream", name, describe_size(probe));
                self.download_single_stream(job, probe).await?
            }
            Strategy::MultiWorker => {
                info!(
                    "{} is large ({}), downloading with {} workers",
                    name,
                    describe_size(probe),
                    job.workers
                );
                self.download_multi_worker(job, probe.total_size).await?
            }
        };

        info!("{} downloaded successfully ({})", name, HumanBytes(bytes));
        Ok(DownloadOutcome { strategy, bytes })
    }

    async fn download_single_stream(&self, job: &DownloadJob, probe: SizeProbe) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(&job.url)
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| DownloadError::transport(&job.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Fetch {
                status: status.as_u16(),
                url: job.url.clone(),
                range: None,
            });
        }

        let total = probe
            .known_total()
            .or_else(|| response.content_length().filter(|len| *len > 0));
        let tracker = ProgressTracker::new(self.progress.track(&job.display_name(), total), total);

        match stream_to_file(response, &job.url, &job.destination, &tracker).await {
            Ok(bytes) => {
                tracker.finish(true);
                Ok(bytes)
            }
            Err(e) => {
                tracker.finish(false);
                remove_partial(&job.destination).await;
                Err(e)
            }
        }
    }

    async fn download_multi_worker(&self, job: &DownloadJob, total_size: u64) -> Result<u64, DownloadError> {
        let ranges = plan(total_size, job.workers);
        let paths: Vec<PathBuf> = (0..ranges.len())
            .map(|ordinal| segment_path(&job.destination, ordinal))
            .collect();

        let sink = self.progress.track(&job.display_name(), Some(total_size));
        let tracker = Arc::new(ProgressTracker::new(sink, Some(total_size)));

        let result = match self.fetch_segments(job, &ranges, &paths, &tracker).await {
            Ok(segments) => match assemble(&job.destination, &segments).await {
                Ok(bytes) => Ok(bytes),
                Err(e) => {
                    remove_partial(&job.destination).await;
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        if result.is_err() {
            discard_segments(&paths).await;
        }
        tracker.finish(result.is_ok());
        result
    }

    /// Runs one fetch task per range and waits for all of them. The first
    /// failure aborts the tasks still in flight.
    async fn fetch_segments(
        &self,
        job: &DownloadJob,
        ranges: &[ByteRange],
        paths: &[PathBuf],
        tracker: &Arc<ProgressTracker>,
    ) -> Result<Vec<Segment>, DownloadError> {
        let mut tasks = JoinSet::new();

        for (ordinal, (range, path)) in ranges.iter().zip(paths).enumerate() {
            let client = self.client.clone();
            let url = job.url.clone();
            let tracker = tracker.clone();
            let range = *range;
            let path = path.clone();

            tasks.spawn(async move { fetch_segment(&client, &url, range, ordinal, path, &tracker).await });
        }

        let mut segments = Vec::with_capacity(ranges.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(DownloadError::Io(io::Error::new(
                    ErrorKind::Other,
                    format!("segment task failed: {}", e),
                )))
            });

            match outcome {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    debug!("Aborting {} remaining segment(s) of {}", tasks.len(), job.url);
                    tasks.shutdown().await;
                    return Err(e);
                }
            }
        }

        // Completion order is arbitrary; byte order is ordinal order.
        segments.sort_by_key(|s| s.ordinal);
        Ok(segments)
    }
}

async fn stream_to_file(
    response: Response,
    url: &str,
    destination: &Path,
    tracker: &ProgressTracker,
) -> Result<u64, DownloadError> {
    let file = File::create(destination).await?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();

    while let Some(item) = stream.next().await {
        let chunk = item.map_err(|e| DownloadError::transport(url, e))?;
        if chunk.is_empty() {
            continue;
        }
        writer.write_all(&chunk).await?;
        tracker.advance(chunk.len() as u64);
    }

    writer.flush().await?;
    Ok(tracker.transferred())
}

fn ensure_parent_exists(destination: &Path) -> Result<(), DownloadError> {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(DownloadError::Io(io::Error::new(
            ErrorKind::NotFound,
            format!("destination directory {:?} does not exist", parent),
        ))),
        _ => Ok(()),
    }
}

async fn remove_partial(destination: &Path) {
    match fs::remove_file(destination).await {
        Ok(()) => debug!("Removed partial file {:?}", destination),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {:?}: {}", destination, e),
    }
}

fn describe_size(probe: SizeProbe) -> String {
    match probe.known_total() {
        Some(total) => HumanBytes(total).to_string(),
        None => "size unknown".to_string(),
    }
}
