// vidfetch - fetches a remote video into one size-bounded local MP4
//
// Acquisition pipeline: metadata resolution across two extraction backends,
// format selection under a byte ceiling, streamed download with live size
// enforcement, separate-track muxing, and an external yt-dlp fallback.

pub mod backends;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod mux;
pub mod orchestrator;
pub mod selector;
pub mod workspace;
pub mod ytdlp;

pub use config::{AcquisitionConfig, CookieSpec};
pub use errors::DownloadError;
pub use models::{
    BackendKind, DownloadOutcome, DownloadedVideo, FailureReport, Selection, Variant,
    VideoMetadata,
};
pub use orchestrator::Acquisition;
pub use selector::FormatSelector;
pub use workspace::{cleanup_file, Workspace};
