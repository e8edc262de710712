use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use indicatif::HumanBytes;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::cli::CreateDirs;
use crate::downloader::Downloader;
use crate::error::DownloadError;
use crate::listing::fetch_listing;
use crate::state::{DownloadJob, Strategy};
use crate::utils::{folder_name_from_url, get_filename_from_url};

/// Decides whether a missing destination folder may be created.
pub trait DirectoryGate: Send + Sync {
    fn confirm_create(&self, path: &Path) -> bool;
}

impl DirectoryGate for CreateDirs {
    fn confirm_create(&self, path: &Path) -> bool {
        match self {
            CreateDirs::Yes => true,
            CreateDirs::No => false,
            CreateDirs::Prompt => {
                use dialoguer::Confirm;

                Confirm::new()
                    .with_prompt(format!("Destination folder {:?} does not exist. Create it?", path))
                    .default(false)
                    .interact()
                    .unwrap_or_else(|e| {
                        warn!("Could not read confirmation: {}", e);
                        false
                    })
            }
        }
    }
}

/// Returns `Ok(false)` when the folder is missing and the gate refused to create it.
pub async fn ensure_directory(path: &Path, gate: &dyn DirectoryGate) -> Result<bool> {
    if path.is_dir() {
        return Ok(true);
    }
    if path.exists() {
        bail!("Destination {:?} exists and is not a directory", path);
    }
    if !gate.confirm_create(path) {
        warn!("Destination folder {:?} does not exist, download cancelled", path);
        return Ok(false);
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create destination folder {:?}", path))?;
    info!("Created folder {:?}", path);
    Ok(true)
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedResource {
    pub name: String,
    pub url: String,
    pub bytes: u64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedResource {
    pub name: String,
    pub url: String,
    pub error: String,
}

/// Per-resource results of a run, so partial success can be told apart from
/// total failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub completed: Vec<CompletedResource>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedResource>,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.completed.extend(other.completed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    pub fn total_bytes(&self) -> u64 {
        self.completed.iter().map(|c| c.bytes).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Summary: Completed: {} | Skipped: {} | Failed: {} | Downloaded: {}",
            self.completed.len(),
            self.skipped.len(),
            self.failed.len(),
            HumanBytes(self.total_bytes())
        )
    }

    fn record_failure(&mut self, name: &str, url: &str, error: String) {
        self.failed.push(FailedResource {
            name: name.to_string(),
            url: url.to_string(),
            error,
        });
    }
}

/// Drives the downloader over directories, URL lists and single files. One
/// job runs at a time; a failing resource is logged and the batch moves on.
pub struct Batch {
    downloader: Downloader,
    gate: Arc<dyn DirectoryGate>,
    overwrite: bool,
}

impl Batch {
    pub fn new(downloader: Downloader, gate: Arc<dyn DirectoryGate>, overwrite: bool) -> Self {
        Self {
            downloader,
            gate,
            overwrite,
        }
    }

    /// Mirrors every file of the index at `dir_url` into `destination`.
    pub async fn run_directory(&self, dir_url: &str, destination: &Path) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if !ensure_directory(destination, self.gate.as_ref()).await? {
            return Ok(report);
        }

        let entries = match fetch_listing(self.downloader.client(), dir_url).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to list {}: {:#}", dir_url, e);
                report.record_failure(dir_url, dir_url, format!("{:#}", e));
                return Ok(report);
            }
        };

        if entries.is_empty() {
            warn!("No files found in {}", dir_url);
        }

        for entry in entries {
            self.download_resource(&entry.url, &entry.name, destination, &mut report)
                .await?;
        }
        Ok(report)
    }

    /// Like [`Batch::run_directory`], into a sub-folder of `output_root` named
    /// after the directory URL.
    pub async fn run_directory_into(&self, dir_url: &str, output_root: &Path) -> Result<BatchReport> {
        let folder_name = folder_name_from_url(dir_url)?;
        let destination = output_root.join(&folder_name);

        info!("Downloading folder: {}", folder_name);
        info!("URL: {}", dir_url);
        info!("Destination: {:?}", destination);

        self.run_directory(dir_url, &destination).await
    }

    /// Processes a text file with one directory URL per line.
    pub async fn run_url_list(&self, input: &Path, output_root: &Path) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if !ensure_directory(output_root, self.gate.as_ref()).await? {
            return Ok(report);
        }

        let file = fs::File::open(input)
            .await
            .with_context(|| format!("Failed to open input file: {:?}", input))?;
        let mut lines = BufReader::new(file).lines();
        let mut urls = Vec::new();
        while let Some(line) = lines.next_line().await? {
            let raw = line.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }
            urls.push(raw.to_string());
        }
        info!("Read {} directory URL(s) from {:?}", urls.len(), input);

        for url in urls {
            match self.run_directory_into(&url, output_root).await {
                Ok(sub_report) => report.merge(sub_report),
                Err(e) if is_run_fatal(&e) => return Err(e),
                Err(e) => {
                    error!("Failed to process {}: {:#}", url, e);
                    report.record_failure(&url, &url, format!("{:#}", e));
                }
            }
        }
        Ok(report)
    }

    /// Downloads one file URL into `output_root`.
    pub async fn run_single_file(&self, url: &str, output_root: &Path) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if !ensure_directory(output_root, self.gate.as_ref()).await? {
            return Ok(report);
        }
        let name = get_filename_from_url(url)?;
        self.download_resource(url, &name, output_root, &mut report).await?;
        Ok(report)
    }

    /// The per-resource error boundary. Only run-fatal errors escape.
    async fn download_resource(&self, url: &str, name: &str, dir: &Path, report: &mut BatchReport) -> Result<()> {
        let destination = dir.join(name);

        if !self.overwrite {
            match fs::metadata(&destination).await {
                Ok(metadata) => {
                    let modified = metadata
                        .modified()
                        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|_| "unknown date".to_string());
                    info!(
                        "Skipped {} ({}, {}): already exists",
                        name,
                        HumanBytes(metadata.len()),
                        modified
                    );
                    report.skipped.push(name.to_string());
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!("Cannot inspect {:?}: {}", destination, e);
                    report.record_failure(name, url, e.to_string());
                    return Ok(());
                }
            }
        }

        let job = DownloadJob::new(url, destination, self.downloader.config().workers)?;
        match self.downloader.run(&job).await {
            Ok(outcome) => report.completed.push(CompletedResource {
                name: name.to_string(),
                url: url.to_string(),
                bytes: outcome.bytes,
                strategy: outcome.strategy,
            }),
            Err(e) if e.is_run_fatal() => return Err(e.into()),
            Err(e) => {
                error!("Error downloading {}: {}", name, e);
                report.record_failure(name, url, e.to_string());
            }
        }
        Ok(())
    }
}

fn is_run_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<DownloadError>()
        .is_some_and(DownloadError::is_run_fatal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_gate_refusal_leaves_directory_missing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("new_folder");

        assert!(!ensure_directory(&target, &CreateDirs::No).await.unwrap());
        assert!(!target.exists());

        assert!(ensure_directory(&target, &CreateDirs::Yes).await.unwrap());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_file_in_place_of_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::write(&target, b"x").await.unwrap();

        assert!(ensure_directory(&target, &CreateDirs::Yes).await.is_err());
    }

    #[test]
    fn test_report_merge_and_summary() {
        let mut report = BatchReport::default();
        report.completed.push(CompletedResource {
            name: "a.bin".into(),
            url: "http://h/a.bin".into(),
            bytes: 2048,
            strategy: Strategy::SingleStream,
        });
        let mut other = BatchReport::default();
        other.record_failure("b.bin", "http://h/b.bin", "HTTP 403".into());
        report.merge(other);

        assert!(report.has_failures());
        assert_eq!(report.total_bytes(), 2048);
        assert_eq!(
            report.summary(),
            "Summary: Completed: 1 | Skipped: 0 | Failed: 1 | Downloaded: 2.00 KiB"
        );
    }
}
