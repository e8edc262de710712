//! Progress reporting seam between the transfer logic and whatever renders it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Receives cumulative byte counts for one resource.
pub trait ProgressSink: Send + Sync {
    /// `total` is `None` when the size is unknown.
    fn report(&self, bytes_so_far: u64, total: Option<u64>);

    fn finish(&self, _success: bool) {}
}

/// Hands out one sink per resource.
pub trait Progress: Send + Sync {
    fn track(&self, name: &str, total: Option<u64>) -> Arc<dyn ProgressSink>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _bytes_so_far: u64, _total: Option<u64>) {}
}

impl Progress for NoProgress {
    fn track(&self, _name: &str, _total: Option<u64>) -> Arc<dyn ProgressSink> {
        Arc::new(NoProgress)
    }
}

/// Shared by every worker of a job. Serializes updates so the sink only
/// ever sees increasing totals, whatever order the workers finish in.
pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    total: Option<u64>,
    transferred: Mutex<u64>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>, total: Option<u64>) -> Self {
        Self {
            sink,
            total,
            transferred: Mutex::new(0),
        }
    }

    /// Adds `bytes` and returns the new cumulative count.
    pub fn advance(&self, bytes: u64) -> u64 {
        let mut transferred = self.transferred.lock();
        *transferred += bytes;
        self.sink.report(*transferred, self.total);
        *transferred
    }

    pub fn transferred(&self) -> u64 {
        *self.transferred.lock()
    }

    pub fn finish(&self, success: bool) {
        self.sink.finish(success);
    }
}

/// One indicatif bar per resource, drawn on stderr.
pub struct ConsoleProgress {
    multi_progress: MultiProgress,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let multi_progress = MultiProgress::new();
        multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        Self { multi_progress }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for ConsoleProgress {
    fn track(&self, name: &str, total: Option<u64>) -> Arc<dyn ProgressSink> {
        let pb = match total {
            Some(total) => {
                let pb = self.multi_progress.add(ProgressBar::new(total));
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}")
                {
                    pb.set_style(style.progress_chars("=>-"));
                }
                pb
            }
            None => {
                // Unknown size: spinner with a running byte count.
                let pb = self.multi_progress.add(ProgressBar::new_spinner());
                if let Ok(style) = ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes:>12} {bytes_per_sec:>12} {msg}")
                {
                    pb.set_style(style);
                }
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            }
        };
        pb.set_message(format!("Downloading {}", name));

        Arc::new(BarSink {
            pb,
            name: name.to_string(),
        })
    }
}

struct BarSink {
    pb: ProgressBar,
    name: String,
}

impl ProgressSink for BarSink {
    fn report(&self, bytes_so_far: u64, _total: Option<u64>) {
        self.pb.set_position(bytes_so_far);
    }

    fn finish(&self, success: bool) {
        if success {
            self.pb.finish_with_message(format!("Completed   {}", self.name));
        } else {
            self.pb.abandon_with_message(format!("Failed      {}", self.name));
        }
    }
}
