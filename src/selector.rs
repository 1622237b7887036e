// Format selection under a byte ceiling
//
// Pure functions over resolved metadata: variants are filtered and ranked,
// never mutated. Size enforcement here is advisory (known sizes only); the
// streaming fetcher re-enforces the ceiling live.

use crate::models::{Selection, Variant, VideoMetadata};

pub struct FormatSelector;

impl FormatSelector {
    /// Combined selection: progressive when one exists, otherwise a
    /// separate pair, otherwise nothing.
    pub fn select(meta: &VideoMetadata, max_bytes: Option<u64>) -> Selection {
        if let Some(variant) = Self::pick_progressive(meta, max_bytes) {
            return Selection::Progressive(variant);
        }
        match Self::pick_separate(meta) {
            (Some(video), Some(audio)) => Selection::Separate { video, audio },
            _ => Selection::None,
        }
    }

    /// Best progressive mp4 variant under the ceiling.
    ///
    /// Ranked by quality-label height, best first. A candidate with no
    /// known size is accepted optimistically; if every known size is over
    /// the ceiling, the lowest-ranked variant is returned as a last resort
    /// (the caller re-validates after download).
    pub fn pick_progressive(meta: &VideoMetadata, max_bytes: Option<u64>) -> Option<Variant> {
        let mut candidates: Vec<&Variant> = meta
            .variants
            .iter()
            .filter(|v| v.is_progressive_mp4())
            .collect();
        candidates.sort_by(|a, b| b.quality_height().cmp(&a.quality_height()));

        for variant in &candidates {
            match (max_bytes, variant.content_length) {
                (Some(limit), Some(size)) if size > limit => continue,
                _ => return Some((*variant).clone()),
            }
        }
        candidates.last().map(|v| (*v).clone())
    }

    /// Best video-only variant (by height) and best audio-only variant
    /// (by bitrate). Either side may be absent.
    pub fn pick_separate(meta: &VideoMetadata) -> (Option<Variant>, Option<Variant>) {
        let video = meta
            .variants
            .iter()
            .filter(|v| v.has_video && !v.has_audio && !v.is_manifest)
            .max_by_key(|v| v.quality_height())
            .cloned();
        let audio = meta
            .variants
            .iter()
            .filter(|v| v.has_audio && !v.has_video && !v.is_manifest)
            .max_by_key(|v| v.bitrate.unwrap_or(0))
            .cloned();
        (video, audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendKind;

    fn progressive(label: &str, size: Option<u64>) -> Variant {
        Variant {
            url: format!("https://example.com/{}", label),
            has_video: true,
            has_audio: true,
            container: "mp4".to_string(),
            is_manifest: false,
            quality_label: Some(label.to_string()),
            bitrate: None,
            content_length: size,
        }
    }

    fn video_only(label: &str, size: Option<u64>) -> Variant {
        Variant {
            has_audio: false,
            container: "webm".to_string(),
            ..progressive(label, size)
        }
    }

    fn audio_only(bitrate: u64) -> Variant {
        Variant {
            url: format!("https://example.com/a{}", bitrate),
            has_video: false,
            has_audio: true,
            container: "m4a".to_string(),
            is_manifest: false,
            quality_label: None,
            bitrate: Some(bitrate),
            content_length: None,
        }
    }

    fn meta(variants: Vec<Variant>) -> VideoMetadata {
        VideoMetadata {
            title: "clip".to_string(),
            duration_seconds: Some(60),
            thumbnail_url: None,
            variants,
            backend: BackendKind::Web,
        }
    }

    #[test]
    fn test_progressive_prefers_highest_under_ceiling() {
        let m = meta(vec![
            progressive("360p", Some(10_000_000)),
            progressive("1080p", Some(80_000_000)),
            progressive("720p", Some(40_000_000)),
        ]);
        let pick = FormatSelector::pick_progressive(&m, Some(50_000_000)).unwrap();
        assert_eq!(pick.quality_label.as_deref(), Some("720p"));
    }

    #[test]
    fn test_progressive_unknown_size_is_optimistic() {
        let m = meta(vec![
            progressive("1080p", None),
            progressive("720p", Some(40_000_000)),
        ]);
        let pick = FormatSelector::pick_progressive(&m, Some(50_000_000)).unwrap();
        assert_eq!(pick.quality_label.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_progressive_last_resort_when_all_too_big() {
        // Scenario A entry condition: single 80MB 1080p progressive with a
        // 50MB ceiling still gets selected; the fetch re-validates later.
        let m = meta(vec![progressive("1080p", Some(80_000_000))]);
        let pick = FormatSelector::pick_progressive(&m, Some(50_000_000)).unwrap();
        assert_eq!(pick.quality_label.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_progressive_excludes_manifests_and_non_mp4() {
        let mut hls = progressive("1080p", Some(1));
        hls.is_manifest = true;
        let mut webm = progressive("720p", Some(1));
        webm.container = "webm".to_string();
        let m = meta(vec![hls, webm]);
        assert!(FormatSelector::pick_progressive(&m, None).is_none());
    }

    #[test]
    fn test_progressive_ignores_ceiling_when_unbounded() {
        let m = meta(vec![
            progressive("720p", Some(40_000_000)),
            progressive("1080p", Some(80_000_000)),
        ]);
        let pick = FormatSelector::pick_progressive(&m, None).unwrap();
        assert_eq!(pick.quality_label.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_separate_pair_by_height_and_bitrate() {
        let m = meta(vec![
            video_only("720p", None),
            video_only("1080p", None),
            audio_only(128_000),
            audio_only(160_000),
        ]);
        let (video, audio) = FormatSelector::pick_separate(&m);
        let video = video.unwrap();
        let audio = audio.unwrap();
        assert_eq!(video.quality_label.as_deref(), Some("1080p"));
        assert!(video.has_video && !video.has_audio);
        assert_eq!(audio.bitrate, Some(160_000));
        assert!(audio.has_audio && !audio.has_video);
    }

    #[test]
    fn test_separate_missing_side_is_none() {
        let m = meta(vec![video_only("1080p", None)]);
        let (video, audio) = FormatSelector::pick_separate(&m);
        assert!(video.is_some());
        assert!(audio.is_none());
    }

    #[test]
    fn test_select_prefers_progressive_over_pair() {
        let m = meta(vec![
            progressive("360p", Some(10_000_000)),
            video_only("1080p", None),
            audio_only(160_000),
        ]);
        assert!(matches!(
            FormatSelector::select(&m, Some(50_000_000)),
            Selection::Progressive(_)
        ));
    }

    #[test]
    fn test_select_none_when_nothing_usable() {
        let m = meta(vec![audio_only(128_000)]);
        assert!(matches!(FormatSelector::select(&m, None), Selection::None));
    }
}
