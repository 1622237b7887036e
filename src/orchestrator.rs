// Acquisition orchestrator
//
// Sequences resolution, selection, fetching, muxing and the external
// fallback into one strategy per request. Owns fallback order and cleanup:
// every abandoned path deletes its temporary artifacts, and only a Success
// outcome leaves a file on disk.

use std::path::PathBuf;

use crate::backends::{ExtractionBackend, MetadataResolver};
use crate::config::AcquisitionConfig;
use crate::errors::DownloadError;
use crate::fetcher::fetch_variant;
use crate::models::{
    DownloadOutcome, DownloadedVideo, FailureReport, VideoMetadata,
};
use crate::mux::{Muxer, Remuxer};
use crate::selector::FormatSelector;
use crate::workspace::{cleanup_file, sanitize_filename, short_id, Workspace};
use crate::ytdlp::{ExternalExtractor, FallbackExtractor};

/// Share of the ceiling granted to each half of a separate pair: video gets
/// the larger share, audio the smaller, leaving headroom for the mux.
fn track_ceilings(limit: u64) -> (u64, u64) {
    (limit * 85 / 100, limit * 25 / 100)
}

pub struct Acquisition {
    config: AcquisitionConfig,
    workspace: Workspace,
    resolver: MetadataResolver,
    muxer: Box<dyn Remuxer>,
    extractor: Box<dyn FallbackExtractor>,
}

impl Acquisition {
    pub fn new(config: AcquisitionConfig) -> Result<Self, DownloadError> {
        let resolver = MetadataResolver::new(&config)?;
        Ok(Self::assemble(
            config,
            resolver,
            Box::new(Muxer::new()),
            Box::new(ExternalExtractor::new()),
        ))
    }

    /// Build with caller-supplied backends; the orchestrator itself is
    /// backend-agnostic.
    pub fn with_backends(
        config: AcquisitionConfig,
        backends: Vec<Box<dyn ExtractionBackend>>,
    ) -> Self {
        Self::assemble(
            config,
            MetadataResolver::from_backends(backends),
            Box::new(Muxer::new()),
            Box::new(ExternalExtractor::new()),
        )
    }

    /// Build with every strategy supplied by the caller.
    pub fn with_components(
        config: AcquisitionConfig,
        backends: Vec<Box<dyn ExtractionBackend>>,
        muxer: Box<dyn Remuxer>,
        extractor: Box<dyn FallbackExtractor>,
    ) -> Self {
        Self::assemble(config, MetadataResolver::from_backends(backends), muxer, extractor)
    }

    fn assemble(
        config: AcquisitionConfig,
        resolver: MetadataResolver,
        muxer: Box<dyn Remuxer>,
        extractor: Box<dyn FallbackExtractor>,
    ) -> Self {
        let workspace = Workspace::new(config.workspace_dir.clone());
        Self {
            config,
            workspace,
            resolver,
            muxer,
            extractor,
        }
    }

    /// Acquire one URL into a single local MP4 under `max_bytes`.
    ///
    /// Never returns a raw error: every call resolves to a DownloadOutcome.
    pub async fn download(&self, url: &str, max_bytes: u64) -> DownloadOutcome {
        let limit = Some(max_bytes);

        if let Err(e) = self.workspace.ensure().await {
            return DownloadOutcome::Failure(FailureReport::new(DownloadError::Transfer(
                format!("workspace: {}", e),
            )));
        }

        // Metadata is advisory: the external path resolves and downloads in
        // one step, so resolution failure goes straight there.
        let (meta, backend) = match self.resolver.resolve(url).await {
            Ok(pair) => pair,
            Err(e) => {
                let base = format!("video-{}", short_id());
                return self.external_fallback(url, &base, None, None, limit, e).await;
            }
        };
        let title = sanitize_filename(&meta.title);
        let base = format!("{}-{}", title, short_id());

        // 1. Progressive variant
        if let Some(progressive) = FormatSelector::pick_progressive(&meta, limit) {
            let dest = self.workspace.named_path(&base, "mp4");
            eprintln!(
                "[Acquisition] Fetching progressive variant ({})",
                progressive.quality_label.as_deref().unwrap_or("unknown quality")
            );
            match fetch_variant(backend, &progressive, &dest, limit).await {
                Ok(size) => {
                    return DownloadOutcome::Success(assemble_success(dest, size, &meta, &title));
                }
                Err(e) if e.is_size_exceeded() => {
                    // A separate pair at different bitrates may still fit
                    eprintln!("[Acquisition] Progressive overflowed: {}", e);
                }
                Err(e) => {
                    return self
                        .external_fallback(url, &base, Some(&meta), Some(&title), limit, e)
                        .await;
                }
            }
        }

        // 2. Separate video/audio pair + mux
        let (video, audio) = match FormatSelector::pick_separate(&meta) {
            (Some(video), Some(audio)) => (video, audio),
            _ => {
                return self
                    .external_fallback(
                        url,
                        &base,
                        Some(&meta),
                        Some(&title),
                        limit,
                        DownloadError::NoUsableFormat,
                    )
                    .await;
            }
        };

        let video_path = self.workspace.named_path(&base, "video");
        let audio_path = self.workspace.named_path(&base, "audio");
        let (video_limit, audio_limit) = track_ceilings(max_bytes);

        eprintln!(
            "[Acquisition] Fetching separate tracks ({} video, {} bps audio)",
            video.quality_label.as_deref().unwrap_or("unknown"),
            audio.bitrate.unwrap_or(0)
        );
        let fetched = async {
            fetch_variant(backend, &video, &video_path, Some(video_limit)).await?;
            fetch_variant(backend, &audio, &audio_path, Some(audio_limit)).await?;
            Ok::<(), DownloadError>(())
        }
        .await;

        if let Err(e) = fetched {
            cleanup_file(&video_path).await;
            cleanup_file(&audio_path).await;
            return self
                .external_fallback(url, &base, Some(&meta), Some(&title), limit, e)
                .await;
        }

        // 3. Mux. Past this point the external path is not retried: a mux
        // failure or a post-mux overflow is terminal.
        let dest = self.workspace.named_path(&base, "mp4");
        let muxed = self.muxer.mux_to_mp4(&video_path, &audio_path, &dest).await;
        cleanup_file(&video_path).await;
        cleanup_file(&audio_path).await;

        if let Err(e) = muxed {
            return DownloadOutcome::Failure(FailureReport::new(e));
        }

        let size = match tokio::fs::metadata(&dest).await {
            Ok(m) => m.len(),
            Err(e) => {
                cleanup_file(&dest).await;
                return DownloadOutcome::Failure(FailureReport::new(DownloadError::Transfer(
                    format!("stat muxed file: {}", e),
                )));
            }
        };
        if size > max_bytes {
            cleanup_file(&dest).await;
            return DownloadOutcome::Failure(FailureReport::new(DownloadError::SizeExceeded {
                actual: size,
                limit: max_bytes,
            }));
        }

        DownloadOutcome::Success(assemble_success(dest, size, &meta, &title))
    }

    async fn external_fallback(
        &self,
        url: &str,
        base: &str,
        meta: Option<&VideoMetadata>,
        title: Option<&str>,
        max_bytes: Option<u64>,
        original: DownloadError,
    ) -> DownloadOutcome {
        eprintln!("[Acquisition] Falling back to external extractor: {}", original);
        match self
            .extractor
            .download(url, base, title, &self.workspace, &self.config, max_bytes)
            .await
        {
            Ok(mut downloaded) => {
                if let Some(meta) = meta {
                    downloaded.duration_seconds = meta.duration_seconds;
                    downloaded.thumbnail_url = meta.thumbnail_url.clone();
                }
                DownloadOutcome::Success(downloaded)
            }
            Err(fallback) => {
                DownloadOutcome::Failure(FailureReport::with_fallback(original, fallback))
            }
        }
    }
}

fn assemble_success(
    path: PathBuf,
    byte_size: u64,
    meta: &VideoMetadata,
    title: &str,
) -> DownloadedVideo {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    DownloadedVideo {
        file_path: path,
        file_name,
        byte_size,
        title: title.to_string(),
        duration_seconds: meta.duration_seconds,
        thumbnail_url: meta.thumbnail_url.clone(),
    }
}
