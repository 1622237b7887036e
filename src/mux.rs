// MP4 multiplexing via ffmpeg
//
// Combines a separately-fetched video file and audio file into one MP4:
// video stream copied unmodified, audio encoded to AAC at 192k, moov atom
// up front so playback can start before the whole file arrives. The two
// input files belong to the caller and are cleaned up there regardless of
// outcome.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::{truncate_detail, DownloadError};
use crate::workspace::cleanup_file;

/// Combines one video file and one audio file into a single MP4.
#[async_trait]
pub trait Remuxer: Send + Sync {
    async fn mux_to_mp4(
        &self,
        video: &Path,
        audio: &Path,
        dest: &Path,
    ) -> Result<(), DownloadError>;
}

pub struct Muxer {
    ffmpeg_path: String,
}

impl Muxer {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: find_ffmpeg(),
        }
    }

    pub fn with_path(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

}

#[async_trait]
impl Remuxer for Muxer {
    /// Mux `video` and `audio` into `dest`. On any failure the partially
    /// written destination is removed before the error propagates.
    async fn mux_to_mp4(
        &self,
        video: &Path,
        audio: &Path,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        let args = build_args(video, audio, dest);
        eprintln!("[Muxer] {} {}", self.ffmpeg_path, args.join(" "));

        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => {
                cleanup_file(dest).await;
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(DownloadError::Mux(truncate_detail(&stderr)))
            }
            Err(e) => {
                cleanup_file(dest).await;
                Err(DownloadError::Mux(format!(
                    "failed to start {}: {}",
                    self.ffmpeg_path, e
                )))
            }
        }
    }
}

impl Default for Muxer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_args(video: &Path, audio: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        video.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        dest.display().to_string(),
    ]
}

/// Find an ffmpeg binary: common install paths, then PATH via `which`,
/// then the bare name as a last resort.
fn find_ffmpeg() -> String {
    let common_paths = [
        "/opt/homebrew/bin/ffmpeg",
        "/usr/local/bin/ffmpeg",
        "/usr/bin/ffmpeg",
    ];
    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }

    if let Ok(output) = std::process::Command::new("which").arg("ffmpeg").output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return path;
            }
        }
    }

    "ffmpeg".to_string()
}
