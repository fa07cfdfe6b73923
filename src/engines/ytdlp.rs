// yt-dlp metadata engine
//
// Runs either `python3 -m yt_dlp` or the native `yt-dlp` binary with
// `--dump-json`, so only the metadata document is fetched. Python mode is
// better at getting past bot detection; the binary needs no interpreter.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::tools::ToolManager;
use crate::config::{EngineSettings, NetworkSettings};
use crate::pipeline::diagnostics::FailureReason;
use crate::pipeline::models::RawVideoInfo;
use crate::pipeline::traits::MetadataEngine;
use crate::pipeline::utils::run_output_with_timeout;
use crate::pipeline::PreviewError;

/// Probing an interpreter or binary should never take long
const PROBE_TIMEOUT_SECS: u64 = 15;

/// Which yt-dlp flavour to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorMode {
    /// `python3 -m yt_dlp`
    Python,
    /// Native `yt-dlp` binary
    Cli,
    /// Python when the module is installed, else the binary
    #[default]
    Auto,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractorMode::Python => "python",
            ExtractorMode::Cli => "cli",
            ExtractorMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// How the engine is invoked once the package check has passed
#[derive(Debug, Clone, PartialEq)]
enum Invocation {
    Module { python: String },
    Binary { path: String },
}

impl Invocation {
    fn program(&self) -> &str {
        match self {
            Invocation::Module { python } => python,
            Invocation::Binary { path } => path,
        }
    }

    fn command_args(&self, args: Vec<String>) -> Vec<String> {
        match self {
            Invocation::Module { .. } => {
                let mut full = vec!["-m".to_string(), "yt_dlp".to_string()];
                full.extend(args);
                full
            }
            Invocation::Binary { .. } => args,
        }
    }
}

#[derive(Debug, Default)]
struct Located {
    python: Option<String>,
    binary: Option<String>,
}

pub struct YtDlpEngine {
    mode: ExtractorMode,
    python_override: Option<String>,
    ytdlp_override: Option<String>,
    proxy: Option<String>,
    timeout_secs: u64,
    located: Mutex<Located>,
    invocation: Mutex<Option<Invocation>>,
}

impl YtDlpEngine {
    pub fn new(engines: &EngineSettings, network: &NetworkSettings) -> Self {
        Self {
            mode: engines.mode,
            python_override: engines.python.clone(),
            ytdlp_override: engines.ytdlp_path.clone(),
            proxy: network.proxy.clone(),
            timeout_secs: engines.resolve_timeout_secs,
            located: Mutex::new(Located::default()),
            invocation: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> ExtractorMode {
        self.mode
    }

    /// Config value, then YTDLP_PYTHON, then the usual locations
    async fn python_candidates(&self) -> Vec<String> {
        if let Some(custom) = &self.python_override {
            return vec![custom.clone()];
        }
        if let Ok(custom) = std::env::var("YTDLP_PYTHON") {
            return vec![custom];
        }

        let mut candidates = Vec::new();
        if let Some(path) = locate("python3").await {
            candidates.push(path);
        }
        candidates.push("python3".to_string());
        candidates
    }

    async fn find_ytdlp(&self) -> String {
        if let Some(path) = &self.ytdlp_override {
            return path.clone();
        }
        locate("yt-dlp")
            .await
            .unwrap_or_else(|| "yt-dlp".to_string())
    }

    async fn find_python(&self) -> Option<String> {
        for candidate in self.python_candidates().await {
            if probe(&candidate, &["--version"]).await.is_some() {
                return Some(candidate);
            }
        }
        None
    }

    /// Version of the yt_dlp module, if importable
    async fn module_version(python: &str) -> Option<String> {
        probe(
            python,
            &["-c", "import yt_dlp; print(yt_dlp.version.__version__)"],
        )
        .await
    }

    /// Build command arguments (without the interpreter prefix)
    pub fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.timeout_secs.to_string(),
            "--retries".to_string(),
            "2".to_string(),
        ];

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    /// `--dump-json` prints one document per line; the first one is ours
    pub fn parse_json(stdout: &[u8]) -> Result<RawVideoInfo, PreviewError> {
        let text = String::from_utf8_lossy(stdout);
        let line = text
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with('{'))
            .ok_or_else(|| PreviewError::Resolution {
                message: "Engine returned no metadata".to_string(),
                reason: FailureReason::Unknown,
            })?;

        serde_json::from_str(line).map_err(|e| PreviewError::Resolution {
            message: format!("Invalid JSON from engine: {}", e),
            reason: FailureReason::Unknown,
        })
    }
}

#[async_trait]
impl MetadataEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        match self.mode {
            ExtractorMode::Python => "python-yt-dlp",
            ExtractorMode::Cli => "cli-yt-dlp",
            ExtractorMode::Auto => "yt-dlp",
        }
    }

    async fn start(&self) -> Result<(), PreviewError> {
        let python = match self.mode {
            ExtractorMode::Cli => None,
            _ => self.find_python().await,
        };
        let binary = match self.mode {
            ExtractorMode::Python => None,
            _ => Some(self.find_ytdlp().await),
        };

        if self.mode == ExtractorMode::Python && python.is_none() {
            return Err(PreviewError::Engine(
                "Python 3 interpreter not found (set YTDLP_PYTHON or engines.python)".to_string(),
            ));
        }

        tracing::info!(
            "[YtDlp] Mode {}: python={:?} binary={:?}",
            self.mode,
            python,
            binary
        );
        *self.located.lock() = Located { python, binary };
        Ok(())
    }

    async fn install_package(&self) -> Result<String, PreviewError> {
        let (python, binary) = {
            let located = self.located.lock();
            (located.python.clone(), located.binary.clone())
        };

        if let Some(python) = python {
            if let Some(version) = Self::module_version(&python).await {
                tracing::info!("[YtDlp] ✓ yt_dlp module {} via {}", version, python);
                *self.invocation.lock() = Some(Invocation::Module { python });
                return Ok(version);
            }
            if self.mode == ExtractorMode::Python {
                return Err(PreviewError::Engine(format!(
                    "Python yt_dlp module not installed for {} (pip install yt-dlp)",
                    python
                )));
            }
            tracing::warn!("[YtDlp] yt_dlp module missing for {}, trying binary", python);
        }

        if let Some(path) = binary {
            if let Some(version) = probe(&path, &["--version"]).await {
                tracing::info!("[YtDlp] ✓ yt-dlp binary {} at {}", version, path);
                *self.invocation.lock() = Some(Invocation::Binary { path });
                return Ok(version);
            }
            return Err(PreviewError::Engine(format!(
                "yt-dlp binary not usable at {}",
                path
            )));
        }

        Err(PreviewError::Engine(
            "yt-dlp not found (install the yt_dlp module or the yt-dlp binary)".to_string(),
        ))
    }

    async fn resolve(&self, url: &str) -> Result<RawVideoInfo, PreviewError> {
        let invocation = self
            .invocation
            .lock()
            .clone()
            .ok_or_else(|| PreviewError::Engine("yt-dlp has not been initialized".to_string()))?;

        let args = invocation.command_args(self.build_args(url));
        tracing::debug!("[YtDlp] Running: {} {}", invocation.program(), args.join(" "));

        // Leave the engine some slack beyond its own socket timeout
        let output =
            run_output_with_timeout(invocation.program(), args, None, self.timeout_secs + 30)
                .await
                .map_err(|e| {
                    if e.starts_with("Timed out") {
                        PreviewError::Resolution {
                            message: e,
                            reason: FailureReason::NetworkTimeout,
                        }
                    } else {
                        PreviewError::Engine(e)
                    }
                })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("[YtDlp] Resolution failed: {}", stderr.trim());
            return Err(PreviewError::resolution(&stderr));
        }

        let info = Self::parse_json(&output.stdout)?;
        tracing::info!(
            "[YtDlp] ✓ {} formats for '{}'",
            info.formats.len(),
            info.title.as_deref().unwrap_or("?")
        );
        Ok(info)
    }
}

/// Path lookup runs `which`; keep it off the async workers
async fn locate(binary: &'static str) -> Option<String> {
    tokio::task::spawn_blocking(move || ToolManager::new().find_binary(binary))
        .await
        .ok()
        .flatten()
}

/// First stdout line of a successful run, or None
async fn probe(program: &str, args: &[&str]) -> Option<String> {
    let args = args.iter().map(|a| a.to_string()).collect();
    match run_output_with_timeout(program, args, None, PROBE_TIMEOUT_SECS).await {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        _ => None,
    }
}
