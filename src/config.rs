// Configuration file support
//
// Settings come from a TOML file (every section optional) and can be
// overridden from the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engines::ytdlp::ExtractorMode;
use crate::pipeline::PreviewError;

const APP_DIR: &str = "audio-preview";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engines: EngineSettings,
    pub network: NetworkSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// python, cli or auto
    pub mode: ExtractorMode,
    /// Interpreter hosting the yt_dlp module
    pub python: Option<String>,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub resolve_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mode: ExtractorMode::Auto,
            python: None,
            ytdlp_path: None,
            ffmpeg_path: None,
            resolve_timeout_secs: 60,
            transcode_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Relay prefix; the target URL is appended percent-encoded
    pub relay_url: Option<String>,
    /// HTTP or SOCKS5 proxy URL (e.g., "socks5h://127.0.0.1:1080")
    pub proxy: Option<String>,
    pub fetch_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            relay_url: None,
            proxy: None,
            fetch_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub download_dir: Option<PathBuf>,
}

impl OutputSettings {
    /// Configured directory, else the user's download folder, else cwd
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/audio-preview/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load `path`, or the default location. A missing default file means
    /// defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, PreviewError> {
        match path {
            Some(p) => Self::from_file(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PreviewError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PreviewError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PreviewError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_relay(mut self, relay: Option<String>) -> Self {
        if relay.is_some() {
            self.network.relay_url = relay;
        }
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        if proxy.is_some() {
            self.network.proxy = proxy;
        }
        self
    }

    pub fn with_download_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.output.download_dir = dir;
        }
        self
    }
}
