// CLI entry point: one URL in, one bounded MP4 out.
//
// Stands in for the delivery layer: configuration is read from the
// environment once at startup and passed into the pipeline explicitly.

use vidfetch::{Acquisition, AcquisitionConfig, DownloadOutcome};

/// Telegram-style default ceiling: 50 MiB.
const DEFAULT_MAX_BYTES: u64 = 52_428_800;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let url = match args.next() {
        Some(url) => url,
        None => {
            eprintln!("Usage: vidfetch <url> [max_bytes]");
            std::process::exit(2);
        }
    };
    let max_bytes = args
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .or_else(|| {
            std::env::var("MAX_BYTES").ok().and_then(|s| s.parse().ok())
        })
        .unwrap_or(DEFAULT_MAX_BYTES);

    let config = AcquisitionConfig::from_env();
    let pipeline = match Acquisition::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Failed to initialize pipeline: {}", e);
            std::process::exit(1);
        }
    };

    match pipeline.download(&url, max_bytes).await {
        DownloadOutcome::Success(video) => {
            println!("{}", video.file_path.display());
            eprintln!(
                "Downloaded \"{}\" ({}) to {}",
                video.title,
                video.human_size(),
                video.file_path.display()
            );
        }
        DownloadOutcome::Failure(report) => {
            eprintln!("Download failed [{}]: {}", report.code(), report.message());
            std::process::exit(1);
        }
    }
}
