// FormatSelector - current VideoInfo plus the chosen audio format
//
// Both live in one struct so a new resolution replaces them together; the
// selection can never point into a VideoInfo that is no longer current.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::models::{AudioFormat, VideoInfo};
use super::utils::format_bytes;

/// Quality option for UI display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    pub format_id: String,

    /// Display label (e.g., "160 kbps (webm)")
    pub label: String,

    /// File size (e.g., "3.42 MB"), when the engine reported one
    pub size: Option<String>,

    pub is_selected: bool,
}

#[derive(Debug, Default, Clone)]
pub struct FormatSelector {
    current: Option<Arc<VideoInfo>>,
    selected: Option<String>,
}

impl FormatSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current VideoInfo; selection resets to the first format
    pub fn load(&mut self, info: Arc<VideoInfo>) {
        self.selected = info.audio_formats.first().map(|f| f.format_id.clone());
        self.current = Some(info);
    }

    pub fn current(&self) -> Option<&Arc<VideoInfo>> {
        self.current.as_ref()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_format(&self) -> Option<&AudioFormat> {
        let id = self.selected.as_deref()?;
        self.current.as_ref()?.format(id)
    }

    /// Point the selection at `format_id`.
    ///
    /// Callers must only pass ids offered by `quality_options`; anything else
    /// is rejected and leaves the selection untouched.
    pub fn select(&mut self, format_id: &str) -> bool {
        let known = self
            .current
            .as_ref()
            .map_or(false, |info| info.format(format_id).is_some());
        if !known {
            tracing::warn!("[FormatSelector] Ignoring unknown format id '{}'", format_id);
            return false;
        }
        self.selected = Some(format_id.to_string());
        true
    }

    /// One option per audio format, in engine order
    pub fn quality_options(&self) -> Vec<QualityOption> {
        let Some(info) = &self.current else {
            return Vec::new();
        };

        info.audio_formats
            .iter()
            .map(|f| QualityOption {
                format_id: f.format_id.clone(),
                label: Self::label(f),
                size: f.file_size_bytes.map(format_bytes),
                is_selected: self.selected.as_deref() == Some(f.format_id.as_str()),
            })
            .collect()
    }

    fn label(format: &AudioFormat) -> String {
        match format.bitrate_kbps {
            Some(kbps) => format!("{} kbps ({})", kbps.round() as u64, format.extension),
            None => format!("? kbps ({})", format.extension),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: &str, ext: &str, kbps: f64, size: Option<u64>) -> AudioFormat {
        AudioFormat {
            format_id: id.to_string(),
            extension: ext.to_string(),
            bitrate_kbps: Some(kbps),
            source_url: format!("https://media.example/{}", id),
            file_size_bytes: size,
        }
    }

    fn info(title: &str, formats: Vec<AudioFormat>) -> Arc<VideoInfo> {
        Arc::new(VideoInfo {
            title: title.to_string(),
            thumbnail: String::new(),
            artist: String::new(),
            audio_formats: formats,
        })
    }

    #[test]
    fn test_load_defaults_to_first_format() {
        let mut selector = FormatSelector::new();
        selector.load(info(
            "a",
            vec![format("a", "m4a", 128.0, None), format("b", "webm", 160.0, None)],
        ));
        assert_eq!(selector.selected_id(), Some("a"));
    }

    #[test]
    fn test_load_empty_clears_selection() {
        let mut selector = FormatSelector::new();
        selector.load(info("one", vec![format("a", "m4a", 128.0, None)]));
        selector.load(info("two", vec![]));
        assert_eq!(selector.selected_id(), None);
        assert!(selector.selected_format().is_none());
        assert_eq!(selector.current().unwrap().title, "two");
    }

    #[test]
    fn test_select_known_and_unknown() {
        let mut selector = FormatSelector::new();
        assert!(!selector.select("a"));

        selector.load(info(
            "x",
            vec![format("a", "m4a", 128.0, None), format("b", "webm", 160.0, None)],
        ));
        assert!(selector.select("b"));
        assert_eq!(selector.selected_format().unwrap().extension, "webm");
        assert!(!selector.select("zzz"));
        assert_eq!(selector.selected_id(), Some("b"));
    }

    #[test]
    fn test_new_load_resets_previous_choice() {
        let mut selector = FormatSelector::new();
        selector.load(info(
            "x",
            vec![format("a", "m4a", 128.0, None), format("b", "webm", 160.0, None)],
        ));
        selector.select("b");
        selector.load(info("y", vec![format("c", "opus", 48.0, None)]));
        assert_eq!(selector.selected_id(), Some("c"));
    }

    #[test]
    fn test_quality_options() {
        let mut selector = FormatSelector::new();
        selector.load(info(
            "x",
            vec![
                format("a", "m4a", 129.476, Some(1536)),
                format("b", "webm", 160.0, None),
            ],
        ));
        let options = selector.quality_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "129 kbps (m4a)");
        assert_eq!(options[0].size.as_deref(), Some("1.5 KB"));
        assert!(options[0].is_selected);
        assert_eq!(options[1].size, None);
        assert!(!options[1].is_selected);
    }
}
