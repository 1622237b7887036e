// Common data models for the acquisition pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::DownloadError;
use crate::workspace::format_bytes;

/// Which extraction backend produced a piece of metadata.
///
/// The two backends require different request configurations (raw cookie
/// header vs structured cookie list), so downstream fetches must reuse the
/// backend that resolved the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Web player client; honors the raw `Cookie` header string
    Web,
    /// Android player client; honors the structured cookie list
    Android,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Android => write!(f, "android"),
        }
    }
}

/// One concrete encoded stream option for a video.
///
/// Variants are filtered and ranked during selection, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Direct media URL
    pub url: String,
    /// Whether the variant carries a video track
    pub has_video: bool,
    /// Whether the variant carries an audio track
    pub has_audio: bool,
    /// Container name (e.g. "mp4", "webm")
    pub container: String,
    /// HLS/DASH manifests are excluded from selection
    pub is_manifest: bool,
    /// Quality label (e.g. "1080p", "720p60")
    pub quality_label: Option<String>,
    /// Bitrate in bits per second
    pub bitrate: Option<u64>,
    /// Known byte size, when the host reports one
    pub content_length: Option<u64>,
}

impl Variant {
    /// Numeric height parsed from the quality label, 0 when unknown.
    ///
    /// Takes the leading digits only, so "720p60" ranks as 720.
    pub fn quality_height(&self) -> u32 {
        let label = match &self.quality_label {
            Some(l) => l,
            None => return 0,
        };
        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    }

    /// Whether this is a progressive mp4 usable without muxing.
    pub fn is_progressive_mp4(&self) -> bool {
        self.has_video && self.has_audio && !self.is_manifest && self.container == "mp4"
    }
}

/// Video metadata resolved once per acquisition attempt, immutable afterward.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub title: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub variants: Vec<Variant>,
    /// Backend that produced this metadata
    pub backend: BackendKind,
}

/// Result of format selection.
#[derive(Debug, Clone)]
pub enum Selection {
    /// One combined audio+video variant
    Progressive(Variant),
    /// Best video-only and best audio-only variants, to be muxed
    Separate { video: Variant, audio: Variant },
    /// Nothing usable
    None,
}

/// Successful acquisition result, the file is the caller's to clean up.
#[derive(Debug, Clone)]
pub struct DownloadedVideo {
    pub file_path: PathBuf,
    pub file_name: String,
    pub byte_size: u64,
    pub title: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
}

impl DownloadedVideo {
    /// Human-readable size for presentation (e.g. "42.17 MB").
    pub fn human_size(&self) -> String {
        format_bytes(self.byte_size)
    }
}

/// Failure report carrying the original error and, when the external
/// fallback also ran and failed, its error too.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub error: DownloadError,
    pub fallback_error: Option<DownloadError>,
}

impl FailureReport {
    pub fn new(error: DownloadError) -> Self {
        Self { error, fallback_error: None }
    }

    pub fn with_fallback(error: DownloadError, fallback: DownloadError) -> Self {
        Self { error, fallback_error: Some(fallback) }
    }

    /// Stable reason code of the most specific failure.
    pub fn code(&self) -> &'static str {
        self.fallback_error
            .as_ref()
            .map(|e| e.code())
            .unwrap_or_else(|| self.error.code())
    }

    /// Human-readable reason citing both failures when both exist.
    pub fn message(&self) -> String {
        match &self.fallback_error {
            Some(fb) => format!("{}. External fallback also failed: {}", self.error, fb),
            None => self.error.to_string(),
        }
    }
}

/// The only value exposed across the pipeline's outer boundary.
///
/// Every call resolves to one of these; no failure escapes as a raw error.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Success(DownloadedVideo),
    Failure(FailureReport),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
