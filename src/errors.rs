// Error types for the acquisition pipeline

use std::fmt;

/// Maximum length of upstream error text embedded in a message.
const DETAIL_LIMIT: usize = 400;

/// Truncate upstream error output so a failure message stays readable.
pub fn truncate_detail(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() <= DETAIL_LIMIT {
        return trimmed.to_string();
    }
    let mut end = DETAIL_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// Both extraction backends failed to resolve metadata
    MetadataUnavailable(String),

    /// No progressive variant and no complete separate pair
    NoUsableFormat,

    /// Byte ceiling violated (pre-check, mid-stream, post-download,
    /// post-mux, or post-external-fetch)
    SizeExceeded { actual: u64, limit: u64 },

    /// Network/stream error during a fetch
    Transfer(String),

    /// Multiplexing tool error
    Mux(String),

    /// No usable external extractor found on the host
    ExtractorUnavailable(String),

    /// External tool ran but did not succeed
    ExternalExtraction(String),
}

impl DownloadError {
    /// Stable reason code for the boundary contract.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MetadataUnavailable(_) => "metadata_unavailable",
            Self::NoUsableFormat => "no_usable_format",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::Transfer(_) => "transfer_failure",
            Self::Mux(_) => "mux_failure",
            Self::ExtractorUnavailable(_) => "extractor_unavailable",
            Self::ExternalExtraction(_) => "external_extraction_failure",
        }
    }

    /// Whether this failure means the byte ceiling was hit.
    pub fn is_size_exceeded(&self) -> bool {
        matches!(self, Self::SizeExceeded { .. })
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MetadataUnavailable(msg) => {
                write!(f, "Could not resolve video metadata: {}", msg)
            }
            Self::NoUsableFormat => {
                write!(f, "No usable format: no progressive variant and no separate pair")
            }
            Self::SizeExceeded { actual, limit } => {
                write!(f, "File size {} exceeds the {} byte ceiling", actual, limit)
            }
            Self::Transfer(msg) => write!(f, "Transfer failed: {}", msg),
            Self::Mux(msg) => write!(f, "Muxing failed: {}", msg),
            Self::ExtractorUnavailable(msg) => {
                write!(f, "No external extractor available: {}", msg)
            }
            Self::ExternalExtraction(msg) => {
                write!(f, "External extraction failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for DownloadError {}
