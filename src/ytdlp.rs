// External extractor bridge (yt-dlp)
//
// Last-resort acquisition strategy: an independently-maintained command-line
// extractor that resolves and downloads in one step, succeeding where the
// library backends cannot (cipher breakage, access restrictions, missing
// formats). The tool is located through an ordered list of invocation
// candidates tried until one responds to a version probe; the winner is
// cached for the process lifetime.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::AcquisitionConfig;
use crate::errors::{truncate_detail, DownloadError};
use crate::models::DownloadedVideo;
use crate::workspace::{cleanup_file, sanitize_filename, Workspace};

/// How long a version probe may take before the candidate is skipped.
const PROBE_TIMEOUT_SECS: u64 = 15;

/// Ceiling on one external download run.
const DOWNLOAD_TIMEOUT_SECS: u64 = 1800;

/// yt-dlp format selection: best mergeable mp4, else best combined.
const FORMAT_SPEC: &str = "bv*[ext=mp4]+ba/b[ext=mp4]/b";

/// One way of invoking the external extractor on this host.
#[derive(Debug, Clone)]
pub struct InvocationCandidate {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl InvocationCandidate {
    fn binary(program: &str) -> Self {
        Self {
            program: program.to_string(),
            prefix_args: Vec::new(),
        }
    }

    fn module(launcher: &str) -> Self {
        Self {
            program: launcher.to_string(),
            prefix_args: vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }

    fn describe(&self) -> String {
        if self.prefix_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.prefix_args.join(" "))
        }
    }
}

/// Ordered invocation candidates: known install paths, PATH, then the
/// python module launchers.
fn candidates() -> Vec<InvocationCandidate> {
    vec![
        InvocationCandidate::binary("/opt/homebrew/bin/yt-dlp"),
        InvocationCandidate::binary("/usr/local/bin/yt-dlp"),
        InvocationCandidate::binary("/usr/bin/yt-dlp"),
        InvocationCandidate::binary("yt-dlp"),
        InvocationCandidate::module("python3"),
        InvocationCandidate::module("python"),
    ]
}

/// Run a command to completion with a hard timeout, killing it on expiry.
async fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to start {}: {}", program, e))?;

    match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
    {
        Ok(result) => result.map_err(|e| format!("failed to wait for {}: {}", program, e)),
        Err(_) => Err(format!("{} timed out after {}s", program, timeout_secs)),
    }
}

/// Last-resort resolve-and-download strategy, tried when the library
/// backends cannot deliver.
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    async fn download(
        &self,
        url: &str,
        base_name: &str,
        title_hint: Option<&str>,
        workspace: &Workspace,
        config: &AcquisitionConfig,
        max_bytes: Option<u64>,
    ) -> Result<DownloadedVideo, DownloadError>;
}

pub struct ExternalExtractor {
    resolved: OnceCell<Option<InvocationCandidate>>,
}

impl ExternalExtractor {
    pub fn new() -> Self {
        Self {
            resolved: OnceCell::new(),
        }
    }

    /// First candidate that passes a `--version` probe, cached.
    async fn resolve(&self) -> Option<&InvocationCandidate> {
        self.resolved
            .get_or_init(|| async {
                for candidate in candidates() {
                    // Absolute paths that do not exist are not worth spawning
                    if candidate.program.contains('/') && !Path::new(&candidate.program).exists()
                    {
                        continue;
                    }
                    let mut args = candidate.prefix_args.clone();
                    args.push("--version".to_string());
                    match run_with_timeout(&candidate.program, &args, PROBE_TIMEOUT_SECS).await {
                        Ok(out) if out.status.success() => {
                            let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                            eprintln!(
                                "[ExternalExtractor] Using {} ({})",
                                candidate.describe(),
                                version
                            );
                            return Some(candidate);
                        }
                        Ok(_) | Err(_) => continue,
                    }
                }
                eprintln!("[ExternalExtractor] No usable invocation found");
                None
            })
            .await
            .as_ref()
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_download(
        &self,
        candidate: &InvocationCandidate,
        url: &str,
        base_name: &str,
        title_hint: Option<&str>,
        output_spec: &str,
        cookie_file: Option<&Path>,
        workspace: &Workspace,
        config: &AcquisitionConfig,
        max_bytes: Option<u64>,
    ) -> Result<DownloadedVideo, DownloadError> {
        let mut args = candidate.prefix_args.clone();
        args.extend(build_download_args(
            url,
            output_spec,
            config,
            cookie_file,
            max_bytes,
        ));
        eprintln!("[ExternalExtractor] {} {}", candidate.program, args.join(" "));

        let output = match run_with_timeout(&candidate.program, &args, DOWNLOAD_TIMEOUT_SECS).await
        {
            Ok(out) => out,
            Err(e) => {
                sweep_partial_outputs(workspace.root(), base_name);
                return Err(DownloadError::ExternalExtraction(e));
            }
        };

        if !output.status.success() {
            sweep_partial_outputs(workspace.root(), base_name);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::ExternalExtraction(truncate_detail(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let file_path = locate_output(&stdout, workspace.root(), base_name)
            .ok_or_else(|| {
                DownloadError::ExternalExtraction("output file not found".to_string())
            })?;

        let byte_size = tokio::fs::metadata(&file_path)
            .await
            .map_err(|e| DownloadError::ExternalExtraction(format!("stat output: {}", e)))?
            .len();

        if let Some(limit) = max_bytes {
            if byte_size > limit {
                cleanup_file(&file_path).await;
                return Err(DownloadError::SizeExceeded { actual: byte_size, limit });
            }
        }

        let title = match title_hint {
            Some(t) => t.to_string(),
            None => derive_title(&file_path, base_name),
        };
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.mp4", base_name));

        Ok(DownloadedVideo {
            file_path,
            file_name,
            byte_size,
            title,
            duration_seconds: None,
            thumbnail_url: None,
        })
    }
}

#[async_trait]
impl FallbackExtractor for ExternalExtractor {
    /// Resolve-and-download in one step.
    ///
    /// `title_hint` is the sanitized title when the library path already
    /// resolved metadata; without it the tool's own title lands in the
    /// output filename and is derived back from there.
    async fn download(
        &self,
        url: &str,
        base_name: &str,
        title_hint: Option<&str>,
        workspace: &Workspace,
        config: &AcquisitionConfig,
        max_bytes: Option<u64>,
    ) -> Result<DownloadedVideo, DownloadError> {
        let candidate = self.resolve().await.ok_or_else(|| {
            DownloadError::ExtractorUnavailable(
                "no yt-dlp binary and no yt_dlp python module on this host".to_string(),
            )
        })?;

        let output_spec = match title_hint {
            Some(_) => workspace.named_path(base_name, "mp4").display().to_string(),
            None => workspace
                .root()
                .join(format!("{}-%(title)s.%(ext)s", base_name))
                .display()
                .to_string(),
        };

        let cookie_file = match config.netscape_cookie_contents() {
            Some(contents) => {
                let path = workspace.scratch_path("cookies", "txt");
                tokio::fs::write(&path, contents).await.map_err(|e| {
                    DownloadError::ExternalExtraction(format!("cookie file: {}", e))
                })?;
                Some(path)
            }
            None => None,
        };

        let result = self
            .run_download(
                candidate,
                url,
                base_name,
                title_hint,
                &output_spec,
                cookie_file.as_deref(),
                workspace,
                config,
                max_bytes,
            )
            .await;

        if let Some(path) = &cookie_file {
            cleanup_file(path).await;
        }
        result
    }
}

impl Default for ExternalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for one download run.
fn build_download_args(
    url: &str,
    output_spec: &str,
    config: &AcquisitionConfig,
    cookie_file: Option<&Path>,
    max_bytes: Option<u64>,
) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--add-metadata".to_string(),
        "-f".to_string(),
        FORMAT_SPEC.to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "-o".to_string(),
        output_spec.to_string(),
        "--user-agent".to_string(),
        config.user_agent.clone(),
        "--add-header".to_string(),
        format!("Accept-Language: {}", config.accept_language),
        // Machine-readable path of the finished file
        "--no-simulate".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
    ];
    if let Some(path) = cookie_file {
        args.push("--cookies".to_string());
        args.push(path.display().to_string());
    }
    if let Some(limit) = max_bytes {
        // Best-effort hint; the final size is re-validated regardless
        args.push("--max-filesize".to_string());
        args.push(limit.to_string());
    }
    args
}

/// Find the produced file: trust the tool's printed path first, then fall
/// back to the most recently modified matching file in the workspace.
fn locate_output(stdout: &str, workspace_root: &Path, base_name: &str) -> Option<PathBuf> {
    for line in stdout.lines().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let path = PathBuf::from(line);
        if path.is_file() {
            return Some(path);
        }
    }
    newest_matching_file(workspace_root, base_name)
}

fn newest_matching_file(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.path().is_file()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(prefix)
        })
        .max_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
        .map(|entry| entry.path())
}

/// Remove whatever a failed run left behind: yt-dlp writes `.part` and
/// per-track intermediates next to the output spec, all sharing our base
/// prefix. Best effort, failures only logged.
fn sweep_partial_outputs(dir: &Path, prefix: &str) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && entry.file_name().to_string_lossy().starts_with(prefix) {
            if let Err(e) = std::fs::remove_file(&path) {
                eprintln!(
                    "[ExternalExtractor] Failed to sweep {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
}

/// Sanitized title from an output filename: the stem minus our base prefix.
fn derive_title(path: &Path, base_name: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let raw = stem
        .strip_prefix(base_name)
        .map(|rest| rest.trim_start_matches('-'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(&stem);
    sanitize_filename(raw)
}
