// Data models shared by the pipeline components

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Output codec settings; fixed, not user configurable
pub const TARGET_BITRATE_KBPS: u32 = 192;
pub const TARGET_EXTENSION: &str = "mp3";
pub const TARGET_MIME_TYPE: &str = "audio/mpeg";

/// Canonical result of metadata resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: String,
    pub artist: String,
    pub audio_formats: Vec<AudioFormat>,
}

impl VideoInfo {
    pub fn format(&self, format_id: &str) -> Option<&AudioFormat> {
        self.audio_formats.iter().find(|f| f.format_id == format_id)
    }
}

/// One audio-only candidate encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub format_id: String,
    pub extension: String,
    pub bitrate_kbps: Option<f64>,
    pub source_url: String,
    pub file_size_bytes: Option<u64>,
}

/// Raw document returned by the resolution engine (`--dump-json`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// Raw stream descriptor; the engine returns video, audio and muxed streams
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    /// Average audio bitrate in kbps
    pub abr: Option<f64>,
    pub url: Option<String>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl RawFormat {
    /// No video track, an audio track, and a usable average bitrate
    pub fn is_audio_only(&self) -> bool {
        let no_video = self.vcodec.as_deref() == Some("none");
        let has_audio = self
            .acodec
            .as_deref()
            .map_or(false, |a| a != "none" && !a.is_empty());
        let has_bitrate = self.abr.map_or(false, |b| b.is_finite() && b > 0.0);
        no_video && has_audio && has_bitrate
    }

    /// Exact size, or the approximate one when exact is unknown
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize
            .or(self.filesize_approx)
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s.round() as u64)
    }
}

/// Stable opaque identity of a library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(pub u64);

impl ArtifactId {
    /// Process-wide unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque binary payload tagged with its MIME type
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub bytes: Bytes,
    pub mime_type: &'static str,
}

impl AudioBlob {
    pub fn mp3(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: TARGET_MIME_TYPE,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A produced, playable clip. Metadata is a copy taken when the run started.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewArtifact {
    pub id: ArtifactId,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    pub audio: AudioBlob,
}

impl PreviewArtifact {
    /// Playing time implied by the constant output bitrate
    pub fn estimated_duration(&self) -> Duration {
        let bits = self.audio.len() as f64 * 8.0;
        Duration::from_secs_f64(bits / (TARGET_BITRATE_KBPS as f64 * 1000.0))
    }

    /// Name used when the clip is saved to disk
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.title, TARGET_EXTENSION)
    }
}

/// Transcode pipeline states, in the only order they may occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Idle,
    Fetching,
    Staging,
    Converting,
    Ready,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Staging => "staging",
            Self::Converting => "converting",
            Self::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Pipeline progress checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub percent: f32,
    pub stage: PipelineStage,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient, auto-dismissing user notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Initiating controls that are disabled while their action runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Extract,
    Preview,
}

/// Versions reported by the engines once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineVersions {
    pub metadata: String,
    pub transcoder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// One line of transcoder output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineLogRecord {
    pub stream: LogStream,
    pub line: String,
}

/// Result of a transcoder invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub log: Vec<EngineLogRecord>,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log.iter().map(|r| r.line.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(vcodec: Option<&str>, acodec: Option<&str>, abr: Option<f64>) -> RawFormat {
        RawFormat {
            format_id: "x".to_string(),
            ext: "m4a".to_string(),
            vcodec: vcodec.map(str::to_string),
            acodec: acodec.map(str::to_string),
            abr,
            ..Default::default()
        }
    }

    #[test]
    fn test_audio_only_filter() {
        assert!(raw(Some("none"), Some("opus"), Some(130.5)).is_audio_only());
        assert!(!raw(Some("avc1.4d401f"), Some("mp4a.40.2"), Some(128.0)).is_audio_only());
        assert!(!raw(Some("none"), Some("none"), Some(128.0)).is_audio_only());
        assert!(!raw(Some("none"), None, Some(128.0)).is_audio_only());
        assert!(!raw(Some("none"), Some("opus"), None).is_audio_only());
        assert!(!raw(Some("none"), Some("opus"), Some(0.0)).is_audio_only());
        assert!(!raw(None, Some("opus"), Some(128.0)).is_audio_only());
    }

    #[test]
    fn test_effective_size_falls_back_to_approx() {
        let mut f = raw(Some("none"), Some("opus"), Some(128.0));
        f.filesize_approx = Some(2048.4);
        assert_eq!(f.effective_size(), Some(2048));
        f.filesize = Some(1000.0);
        assert_eq!(f.effective_size(), Some(1000));
    }

    #[test]
    fn test_raw_document_tolerates_nulls() {
        let json = r#"{"title":"T","thumbnail":null,"formats":[{"format_id":"140","ext":"m4a","acodec":"mp4a.40.2","vcodec":"none","abr":129.5,"url":"https://x/140","filesize":null}]}"#;
        let info: RawVideoInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title.as_deref(), Some("T"));
        assert!(info.thumbnail.is_none());
        assert!(info.uploader.is_none());
        assert_eq!(info.formats.len(), 1);
        assert!(info.formats[0].is_audio_only());
    }

    #[test]
    fn test_estimated_duration() {
        // 24_000 bytes at 192 kbps is exactly one second
        let artifact = PreviewArtifact {
            id: ArtifactId(1),
            title: "Song".into(),
            artist: "A".into(),
            thumbnail: String::new(),
            audio: AudioBlob::mp3(vec![0u8; 24_000]),
        };
        assert_eq!(artifact.estimated_duration(), Duration::from_secs(1));
        assert_eq!(artifact.file_name(), "Song.mp3");
        assert_eq!(artifact.audio.mime_type, "audio/mpeg");
    }
}
