// Scratch workspace management
//
// Every pipeline stage that touches disk goes through the workspace:
// temporary paths get a random suffix so concurrent acquisitions never
// collide, and cleanup is best-effort and idempotent.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Scratch directory for temporary artifacts.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the scratch directory if it does not exist yet.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Collision-resistant path for a temporary artifact.
    pub fn scratch_path(&self, base: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{}-{}.{}", base, short_id(), ext))
    }

    /// Path for a named artifact without a random suffix. The caller must
    /// already have made `base` collision-resistant.
    pub fn named_path(&self, base: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{}", base, ext))
    }
}

/// Short random suffix for collision-resistant filenames.
pub fn short_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Best-effort file deletion; a missing path is not an error.
pub async fn cleanup_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            eprintln!("[Workspace] Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Replace characters that are unsafe in filenames, cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .take(150)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Human-readable byte count, powers of 1024.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let exp = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exp as i32);
    format!("{:.2} {}", value, UNITS[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_paths_do_not_collide() {
        let ws = Workspace::new("/tmp/vidfetch-test");
        let a = ws.scratch_path("clip", "mp4");
        let b = ws.scratch_path("clip", "mp4");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_cleanup_missing_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-existed.mp4");
        // Must not panic or error
        cleanup_file(&gone).await;
        cleanup_file(&gone).await;
    }

    #[tokio::test]
    async fn test_ensure_and_cleanup_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("nested").join("tmp"));
        ws.ensure().await.unwrap();
        assert!(ws.root().is_dir());

        let path = ws.scratch_path("artifact", "bin");
        tokio::fs::write(&path, b"data").await.unwrap();
        cleanup_file(&path).await;
        assert!(!path.exists());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("   "), "video");
        assert_eq!(sanitize_filename(""), "video");
        let long = "x".repeat(400);
        assert_eq!(sanitize_filename(&long).len(), 150);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(52_428_800), "50.00 MB");
    }
}
