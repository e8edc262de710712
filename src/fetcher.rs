//! Range-qualified GET of one segment into its own temporary file.

use futures::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, RANGE};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::DownloadError;
use crate::progress::ProgressTracker;
use crate::state::{ByteRange, Segment};

/// Temporary location of segment `ordinal`: `<destination>.part<ordinal>`.
pub fn segment_path(destination: &Path, ordinal: usize) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".part{}", ordinal));
    destination.with_file_name(name)
}

/// Downloads `range` of `url` into `path`, streaming chunk by chunk.
///
/// Compression is disabled so byte offsets stay meaningful. A non-success
/// status fails with [`DownloadError::Fetch`]; a `200` that carries more than
/// the requested range fails with [`DownloadError::RangeIgnored`].
pub async fn fetch_segment(
    client: &Client,
    url: &str,
    range: ByteRange,
    ordinal: usize,
    path: PathBuf,
    tracker: &ProgressTracker,
) -> Result<Segment, DownloadError> {
    debug!("Segment {} requesting range {}", ordinal, range.header_value());

    let response = client
        .get(url)
        .header(RANGE, range.header_value())
        .header(ACCEPT_ENCODING, "identity")
        .send()
        .await
        .map_err(|e| DownloadError::transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Fetch {
            status: status.as_u16(),
            url: url.to_string(),
            range: Some(range),
        });
    }

    if status != StatusCode::PARTIAL_CONTENT {
        let whole_body_matches = range.start == 0 && response.content_length() == Some(range.len());
        if !whole_body_matches {
            return Err(DownloadError::RangeIgnored {
                url: url.to_string(),
                range,
            });
        }
    }

    let file = File::create(&path).await?;
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

    // Make sure every byte is on disk before the segment is handed over.
    writer.flush().await?;

    debug!("Segment {} complete ({} bytes)", ordinal, range.len());

    Ok(Segment {
        range,
        ordinal,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_path_sits_next_to_destination() {
        let path = segment_path(Path::new("/data/iso/disk.img"), 3);
        assert_eq!(path, PathBuf::from("/data/iso/disk.img.part3"));
    }
}
