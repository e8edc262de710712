//! Concatenation of downloaded segments into the final file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{self, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::state::Segment;

/// Writes `segments` to `destination` in the given order, deleting each
/// segment file once it has been copied.
///
/// Segments must already be sorted by ordinal. On error the destination is
/// left partially written; the caller removes it.
pub async fn assemble(destination: &Path, segments: &[Segment]) -> Result<u64, DownloadError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(destination)
        .await?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;

    for segment in segments {
        let mut part = File::open(&segment.path).await?;
        written += io::copy(&mut part, &mut writer).await?;
        drop(part);
        fs::remove_file(&segment.path).await?;
        debug!("Merged segment {} into {:?}", segment.ordinal, destination);
    }

    writer.flush().await?;
    writer.get_ref().sync_all().await?;

    Ok(written)
}

/// Removes segment files, ignoring ones that were never created.
pub async fn discard_segments(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed segment {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove segment {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::segment_path;
    use crate::ranges::plan;
    use tempfile::tempdir;

    async fn split_into_segments(data: &[u8], destination: &Path, workers: usize) -> Vec<Segment> {
        let mut segments = Vec::new();
        for (ordinal, range) in plan(data.len() as u64, workers).into_iter().enumerate() {
            let path = segment_path(destination, ordinal);
            fs::write(&path, &data[range.start as usize..=range.end as usize])
                .await
                .unwrap();
            segments.push(Segment { range, ordinal, path });
        }
        segments
    }

    #[tokio::test]
    async fn test_assembly_reproduces_split_bytes() {
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..10_007u32).map(|i| (i % 251) as u8).collect();

        for workers in 1..=8 {
            let destination = dir.path().join(format!("out_{}.bin", workers));
            let segments = split_into_segments(&data, &destination, workers).await;

            let written = assemble(&destination, &segments).await.unwrap();

            assert_eq!(written, data.len() as u64);
            assert_eq!(fs::read(&destination).await.unwrap(), data);
            for segment in &segments {
                assert!(!segment.path.exists(), "segment {:?} left behind", segment.path);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_segment_is_io_error() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        let segments = vec![Segment {
            range: crate::state::ByteRange::new(0, 9),
            ordinal: 0,
            path: dir.path().join("missing.part0"),
        }];

        let err = assemble(&destination, &segments).await.unwrap_err();
        assert!(matches!(err, DownloadError::Io(_)));
    }

    #[tokio::test]
    async fn test_discard_ignores_absent_files() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("a.part0");
        fs::write(&present, b"x").await.unwrap();
        let absent = dir.path().join("a.part1");

        discard_segments(&[present.clone(), absent]).await;

        assert!(!present.exists());
    }
}
