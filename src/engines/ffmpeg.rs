// ffmpeg transcode engine
//
// The engine's file namespace is a private scratch directory that lives as
// long as the engine. Arguments refer to files by bare name; ffmpeg runs with
// the scratch directory as its working directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use tempfile::TempDir;

use super::tools::{clean_version, ToolManager, ToolType};
use crate::config::EngineSettings;
use crate::pipeline::models::{EngineLogRecord, ExecOutcome, LogStream};
use crate::pipeline::traits::{EngineLogListener, TranscodeEngine};
use crate::pipeline::utils::run_output_with_timeout;
use crate::pipeline::PreviewError;

lazy_static! {
    static ref PROBLEM_LINE_RE: Regex = Regex::new(
        r"(?i)(error|invalid data|no such file|not found|unknown encoder|could not|failed)"
    )
    .unwrap();
}

pub struct FfmpegEngine {
    binary: String,
    timeout_secs: u64,
    scratch: TempDir,
    listeners: Mutex<Vec<Arc<dyn EngineLogListener>>>,
}

impl FfmpegEngine {
    pub fn new(settings: &EngineSettings) -> Result<Self, PreviewError> {
        let binary = settings
            .ffmpeg_path
            .clone()
            .or_else(|| ToolManager::new().find_binary(ToolType::Ffmpeg.as_str()))
            .unwrap_or_else(|| "ffmpeg".to_string());

        let scratch = tempfile::Builder::new()
            .prefix("audio-preview-")
            .tempdir()?;
        tracing::debug!("[Ffmpeg] Scratch directory {}", scratch.path().display());

        Ok(Self {
            binary,
            timeout_secs: settings.transcode_timeout_secs,
            scratch,
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Namespace entries are single plain file names
    fn resolve_name(&self, name: &str) -> Result<PathBuf, PreviewError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');
        if !valid {
            return Err(PreviewError::Engine(format!(
                "Invalid scratch file name '{}'",
                name
            )));
        }
        Ok(self.scratch.path().join(name))
    }

    fn emit(&self, record: &EngineLogRecord) {
        if PROBLEM_LINE_RE.is_match(&record.line) {
            tracing::warn!("[Ffmpeg] {}", record.line);
        }
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.on_log(record);
        }
    }
}

fn records(stream: LogStream, bytes: &[u8]) -> Vec<EngineLogRecord> {
    String::from_utf8_lossy(bytes)
        // progress updates are separated by carriage returns
        .split(|c| c == '\n' || c == '\r')
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(|line| EngineLogRecord {
            stream,
            line: line.to_string(),
        })
        .collect()
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn load(&self) -> Result<String, PreviewError> {
        let output = run_output_with_timeout(&self.binary, vec!["-version".to_string()], None, 15)
            .await
            .map_err(|e| PreviewError::Engine(format!("ffmpeg not available: {}", e)))?;

        if !output.status.success() {
            return Err(PreviewError::Engine(format!(
                "ffmpeg at {} exited with {}",
                self.binary, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout
            .lines()
            .next()
            .map(|l| clean_version(l, ToolType::Ffmpeg))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::info!("[Ffmpeg] ✓ ffmpeg {} at {}", version, self.binary);
        Ok(version)
    }

    async fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), PreviewError> {
        let path = self.resolve_name(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PreviewError::Engine(format!("Failed to write {}: {}", name, e)))
    }

    async fn execute(&self, args: &[String]) -> Result<ExecOutcome, PreviewError> {
        let mut full = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
        ];
        full.extend(args.iter().cloned());

        let output = run_output_with_timeout(
            &self.binary,
            full,
            Some(self.scratch.path()),
            self.timeout_secs,
        )
        .await
        .map_err(|e| PreviewError::Transcode {
            message: e,
            log: Vec::new(),
        })?;

        let mut log = records(LogStream::Stdout, &output.stdout);
        log.extend(records(LogStream::Stderr, &output.stderr));
        for record in &log {
            self.emit(record);
        }

        // Killed by a signal has no code
        let exit_code = output.status.code().unwrap_or(-1);
        Ok(ExecOutcome { exit_code, log })
    }

    async fn read_output(&self, name: &str) -> Result<Vec<u8>, PreviewError> {
        let path = self.resolve_name(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| PreviewError::Engine(format!("Failed to read {}: {}", name, e)))
    }

    async fn remove(&self, name: &str) -> Result<(), PreviewError> {
        let path = self.resolve_name(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PreviewError::Engine(format!(
                "Failed to remove {}: {}",
                name, e
            ))),
        }
    }

    fn subscribe_logs(&self, listener: Arc<dyn EngineLogListener>) {
        self.listeners.lock().push(listener);
    }
}
