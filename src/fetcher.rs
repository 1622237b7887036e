// Streaming fetch with live byte-ceiling enforcement
//
// The copy loop is generic over a chunk stream so the backend's HTTP body
// and test fixtures share one code path. A synchronous observer sees the
// cumulative byte count after every chunk and is the only cancellation
// channel; the ceiling is just one such observer. On every failure path the
// partially-written destination is deleted before the error propagates.

use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::backends::ExtractionBackend;
use crate::errors::{truncate_detail, DownloadError};
use crate::models::Variant;
use crate::workspace::cleanup_file;

/// Boxed chunk stream produced by a backend's `open_stream`.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// Verdict returned by a progress observer after each chunk.
pub enum ProgressAction {
    Continue,
    /// Abort the in-flight transfer, failing with the given error
    Cancel(DownloadError),
}

/// Observer that cancels the instant the cumulative count passes the ceiling.
pub fn ceiling_observer(max_bytes: Option<u64>) -> impl FnMut(u64) -> ProgressAction {
    move |written| match max_bytes {
        Some(limit) if written > limit => {
            ProgressAction::Cancel(DownloadError::SizeExceeded { actual: written, limit })
        }
        _ => ProgressAction::Continue,
    }
}

/// Copy a chunk stream to `dest`, consulting the observer after each chunk.
///
/// The observer only fires between chunks, so a transfer that completes is
/// never retroactively failed by it; final-size policy is the caller's.
/// Returns the on-disk byte size on success.
pub async fn write_stream<S, E>(
    mut stream: S,
    dest: &Path,
    mut observer: impl FnMut(u64) -> ProgressAction,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| DownloadError::Transfer(format!("create {}: {}", dest.display(), e)))?;

    let mut written: u64 = 0;
    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                cleanup_file(dest).await;
                return Err(DownloadError::Transfer(truncate_detail(&e.to_string())));
            }
        };
        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            cleanup_file(dest).await;
            return Err(DownloadError::Transfer(format!("write: {}", e)));
        }
        written += chunk.len() as u64;
        if let ProgressAction::Cancel(err) = observer(written) {
            drop(file);
            cleanup_file(dest).await;
            return Err(err);
        }
    }

    if let Err(e) = file.flush().await {
        drop(file);
        cleanup_file(dest).await;
        return Err(DownloadError::Transfer(format!("flush: {}", e)));
    }
    drop(file);

    let size = tokio::fs::metadata(dest)
        .await
        .map_err(|e| DownloadError::Transfer(format!("stat {}: {}", dest.display(), e)))?
        .len();
    Ok(size)
}

/// Stream one selected variant to disk through the backend that resolved it.
///
/// Enforces the ceiling live via the observer and once more against the
/// final file size, covering transfers where no progress tick fired past
/// the limit. The file never survives a failure.
pub async fn fetch_variant(
    backend: &dyn ExtractionBackend,
    variant: &Variant,
    dest: &Path,
    max_bytes: Option<u64>,
) -> Result<u64, DownloadError> {
    let stream = backend.open_stream(variant).await?;
    let size = write_stream(stream, dest, ceiling_observer(max_bytes)).await?;
    if let Some(limit) = max_bytes {
        if size > limit {
            cleanup_file(dest).await;
            return Err(DownloadError::SizeExceeded { actual: size, limit });
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(sizes: &[usize]) -> Vec<Result<Bytes, String>> {
        sizes
            .iter()
            .map(|n| Ok(Bytes::from(vec![0u8; *n])))
            .collect()
    }

    #[tokio::test]
    async fn test_write_stream_within_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let source = stream::iter(chunks(&[1024, 1024, 512]));

        let size = write_stream(source, &dest, ceiling_observer(Some(4096)))
            .await
            .unwrap();
        assert_eq!(size, 2560);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 2560);
    }

    #[tokio::test]
    async fn test_overflow_aborts_and_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let source = stream::iter(chunks(&[1024, 1024, 1024]));

        let err = write_stream(source, &dest, ceiling_observer(Some(1500)))
            .await
            .unwrap_err();
        assert!(err.is_size_exceeded());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_exact_fit_is_not_retroactively_failed() {
        // A transfer whose total equals the ceiling finishes normally:
        // the observer never sees written > limit.
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let source = stream::iter(chunks(&[1000, 1000]));

        let size = write_stream(source, &dest, ceiling_observer(Some(2000)))
            .await
            .unwrap();
        assert_eq!(size, 2000);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_transport_error_deletes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset".to_string()),
        ]);

        let err = write_stream(source, &dest, ceiling_observer(None)).await.unwrap_err();
        match err {
            DownloadError::Transfer(msg) => assert!(msg.contains("connection reset")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_custom_observer_can_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let source = stream::iter(chunks(&[100, 100, 100]));

        let mut ticks = 0;
        let err = write_stream(source, &dest, |_written| {
            ticks += 1;
            if ticks == 2 {
                ProgressAction::Cancel(DownloadError::Transfer("stop".to_string()))
            } else {
                ProgressAction::Continue
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::Transfer(_)));
        assert!(!dest.exists());
    }
}
