//! # axsync
//!
//! Mirrors files and whole directory indexes over HTTP. Large files are split
//! into byte ranges that are fetched in parallel and stitched back together;
//! small files (or files whose size the server will not tell) are streamed
//! over a single connection.
//!
//! The engine lives in [`downloader::Downloader`]; [`commands::Batch`] walks
//! directory listings and URL lists and feeds it one job at a time.

pub mod assembler;
pub mod cli;
pub mod commands;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod listing;
pub mod progress;
pub mod ranges;
pub mod state;
pub mod utils;

pub use commands::{Batch, BatchReport, DirectoryGate};
pub use config::EngineConfig;
pub use downloader::{DownloadOutcome, Downloader};
pub use error::DownloadError;
pub use progress::{ConsoleProgress, NoProgress, Progress, ProgressSink};
pub use state::{ByteRange, DownloadJob, Segment, SizeProbe, Strategy};
