// Extraction backends
//
// Metadata resolution and stream opening sit behind one trait so the
// orchestrator stays backend-agnostic: it only threads the backend that
// successfully resolved metadata back in for the fetches.

pub mod innertube;

use async_trait::async_trait;

pub use innertube::InnertubeBackend;

use crate::config::AcquisitionConfig;
use crate::errors::{truncate_detail, DownloadError};
use crate::fetcher::ByteStream;
use crate::models::{BackendKind, Variant, VideoMetadata};

/// One metadata/stream extraction provider.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Which request configuration this backend carries
    fn kind(&self) -> BackendKind;

    /// Resolve title, duration, thumbnail and the available variants.
    async fn resolve_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError>;

    /// Open a chunk stream for one variant, using this backend's request
    /// configuration.
    async fn open_stream(&self, variant: &Variant) -> Result<ByteStream, DownloadError>;
}

impl std::fmt::Debug for dyn ExtractionBackend + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionBackend")
            .field("name", &self.name())
            .finish()
    }
}

/// Ordered backend list with fallback resolution.
pub struct MetadataResolver {
    backends: Vec<Box<dyn ExtractionBackend>>,
}

impl MetadataResolver {
    /// Standard pair: web client first, android client as fallback.
    pub fn new(config: &AcquisitionConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            backends: vec![
                Box::new(InnertubeBackend::web(config)?),
                Box::new(InnertubeBackend::android(config)?),
            ],
        })
    }

    pub fn from_backends(backends: Vec<Box<dyn ExtractionBackend>>) -> Self {
        Self { backends }
    }

    /// Try each backend in order; the winner is returned alongside the
    /// metadata so fetches reuse its request configuration.
    pub async fn resolve(
        &self,
        url: &str,
    ) -> Result<(VideoMetadata, &dyn ExtractionBackend), DownloadError> {
        let mut failures: Vec<String> = Vec::new();

        for backend in &self.backends {
            eprintln!("[Resolver] Trying backend: {}", backend.name());
            match backend.resolve_metadata(url).await {
                Ok(meta) => {
                    eprintln!(
                        "[Resolver] Resolved \"{}\" ({} variants) via {}",
                        meta.title,
                        meta.variants.len(),
                        backend.name()
                    );
                    return Ok((meta, backend.as_ref()));
                }
                Err(e) => {
                    eprintln!("[Resolver] {} failed: {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        Err(DownloadError::MetadataUnavailable(truncate_detail(
            &failures.join("; "),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    struct StubBackend {
        kind: BackendKind,
        fail: bool,
    }

    #[async_trait]
    impl ExtractionBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn resolve_metadata(&self, _url: &str) -> Result<VideoMetadata, DownloadError> {
            if self.fail {
                return Err(DownloadError::Transfer("boom".to_string()));
            }
            Ok(VideoMetadata {
                title: "stub clip".to_string(),
                duration_seconds: None,
                thumbnail_url: None,
                variants: Vec::new(),
                backend: self.kind,
            })
        }

        async fn open_stream(&self, _variant: &Variant) -> Result<ByteStream, DownloadError> {
            Ok(Box::pin(stream::iter(vec![Ok(Bytes::from_static(b"x"))])))
        }
    }

    #[tokio::test]
    async fn test_resolver_falls_back_to_second_backend() {
        let resolver = MetadataResolver::from_backends(vec![
            Box::new(StubBackend { kind: BackendKind::Web, fail: true }),
            Box::new(StubBackend { kind: BackendKind::Android, fail: false }),
        ]);
        let (meta, backend) = resolver.resolve("https://example.com").await.unwrap();
        assert_eq!(meta.backend, BackendKind::Android);
        assert_eq!(backend.kind(), BackendKind::Android);
    }

    #[tokio::test]
    async fn test_resolver_reports_all_failures() {
        let resolver = MetadataResolver::from_backends(vec![
            Box::new(StubBackend { kind: BackendKind::Web, fail: true }),
            Box::new(StubBackend { kind: BackendKind::Android, fail: true }),
        ]);
        let err = resolver.resolve("https://example.com").await.unwrap_err();
        match err {
            DownloadError::MetadataUnavailable(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
