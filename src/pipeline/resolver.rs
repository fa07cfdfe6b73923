// Metadata resolver - URL in, canonical VideoInfo out

use std::sync::Arc;

use super::errors::PreviewError;
use super::models::{AudioFormat, RawVideoInfo, VideoInfo};
use super::traits::MetadataEngine;

pub struct MetadataResolver {
    engine: Arc<dyn MetadataEngine>,
}

impl MetadataResolver {
    pub fn new(engine: Arc<dyn MetadataEngine>) -> Self {
        Self { engine }
    }

    /// Resolve `url` into a VideoInfo holding only audio-only formats.
    ///
    /// An empty format list is still a success; callers warn about it.
    pub async fn resolve(&self, url: &str) -> Result<VideoInfo, PreviewError> {
        let url = validate_url(url)?;

        tracing::info!("[Resolver] Resolving {} via {}", url, self.engine.name());
        let raw = self.engine.resolve(url).await?;
        let info = normalize(raw);

        tracing::info!(
            "[Resolver] ✓ '{}' with {} audio format(s)",
            info.title,
            info.audio_formats.len()
        );
        Ok(info)
    }
}

/// Trimmed URL, or a validation error before anything touches the network
pub fn validate_url(input: &str) -> Result<&str, PreviewError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PreviewError::Validation("Please enter a URL".to_string()));
    }

    let parses = url::Url::parse(trimmed).is_ok()
        || url::Url::parse(&format!("https://{}", trimmed))
            .map_or(false, |u| u.host_str().map_or(false, |h| h.contains('.')));
    if !parses || trimmed.contains(char::is_whitespace) {
        return Err(PreviewError::Validation(format!("Invalid URL: {}", trimmed)));
    }

    Ok(trimmed)
}

/// Filter the raw engine document down to audio-only streams, keeping order
pub fn normalize(raw: RawVideoInfo) -> VideoInfo {
    let audio_formats = raw
        .formats
        .iter()
        .filter(|f| f.is_audio_only())
        .map(|f| AudioFormat {
            format_id: f.format_id.clone(),
            extension: f.ext.clone(),
            bitrate_kbps: f.abr,
            source_url: f.url.clone().unwrap_or_default(),
            file_size_bytes: f.effective_size(),
        })
        .collect();

    VideoInfo {
        title: raw.title.unwrap_or_else(|| "Unknown".to_string()),
        thumbnail: raw.thumbnail.unwrap_or_default(),
        artist: raw.uploader.unwrap_or_else(|| "Unknown".to_string()),
        audio_formats,
    }
}
