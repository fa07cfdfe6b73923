// In-memory engines and hooks for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::errors::PreviewError;
use super::models::{
    Control, EngineLogRecord, ExecOutcome, LogStream, Notice, PipelineProgress, PreviewArtifact,
    RawFormat, RawVideoInfo, VideoInfo,
};
use super::traits::{EngineLogListener, MetadataEngine, PresentationHooks, Relay, TranscodeEngine};

pub fn raw_audio(id: &str, ext: &str, abr: f64) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        ext: ext.to_string(),
        acodec: Some("opus".to_string()),
        vcodec: Some("none".to_string()),
        abr: Some(abr),
        url: Some(format!("https://media.example/{}", id)),
        filesize: Some(1024.0 * abr),
        filesize_approx: None,
    }
}

pub fn raw_video(id: &str) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        ext: "mp4".to_string(),
        acodec: Some("mp4a.40.2".to_string()),
        vcodec: Some("avc1.4d401f".to_string()),
        abr: Some(128.0),
        url: Some(format!("https://media.example/{}", id)),
        filesize: None,
        filesize_approx: Some(9_000_000.0),
    }
}

pub fn raw_document(title: &str, formats: Vec<RawFormat>) -> RawVideoInfo {
    RawVideoInfo {
        title: Some(title.to_string()),
        thumbnail: Some(format!("https://img.example/{}.jpg", title)),
        uploader: Some(format!("{} Artist", title)),
        formats,
    }
}

#[derive(Default)]
pub struct FakeMetadataEngine {
    calls: Mutex<Vec<String>>,
    documents: Mutex<HashMap<String, RawVideoInfo>>,
    fail_start: Mutex<Option<String>>,
    hang_start: Mutex<bool>,
    fail_install: Mutex<Option<String>>,
    fail_resolve: Mutex<Option<String>>,
}

impl FakeMetadataEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, url: &str, doc: RawVideoInfo) -> Self {
        self.documents.lock().insert(url.to_string(), doc);
        self
    }

    pub fn fail_start(&self, msg: &str) {
        *self.fail_start.lock() = Some(msg.to_string());
    }

    /// `start` never completes until `clear_failures`
    pub fn hang_start(&self) {
        *self.hang_start.lock() = true;
    }

    pub fn fail_install(&self, msg: &str) {
        *self.fail_install.lock() = Some(msg.to_string());
    }

    pub fn fail_resolve(&self, stderr: &str) {
        *self.fail_resolve.lock() = Some(stderr.to_string());
    }

    pub fn clear_failures(&self) {
        *self.fail_start.lock() = None;
        *self.hang_start.lock() = false;
        *self.fail_install.lock() = None;
        *self.fail_resolve.lock() = None;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn resolve_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("resolve"))
            .count()
    }
}

#[async_trait]
impl MetadataEngine for FakeMetadataEngine {
    fn name(&self) -> &'static str {
        "fake-metadata"
    }

    async fn start(&self) -> Result<(), PreviewError> {
        self.calls.lock().push("start".to_string());
        let hang = *self.hang_start.lock();
        if hang {
            std::future::pending::<()>().await;
        }
        match self.fail_start.lock().clone() {
            Some(msg) => Err(PreviewError::Engine(msg)),
            None => Ok(()),
        }
    }

    async fn install_package(&self) -> Result<String, PreviewError> {
        self.calls.lock().push("install".to_string());
        match self.fail_install.lock().clone() {
            Some(msg) => Err(PreviewError::Engine(msg)),
            None => Ok("2024.01.01".to_string()),
        }
    }

    async fn resolve(&self, url: &str) -> Result<RawVideoInfo, PreviewError> {
        self.calls.lock().push(format!("resolve {}", url));
        if let Some(stderr) = self.fail_resolve.lock().clone() {
            return Err(PreviewError::resolution(&stderr));
        }
        self.documents
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| PreviewError::resolution("ERROR: Unsupported URL"))
    }
}

#[derive(Default)]
pub struct FakeTranscodeEngine {
    loads: AtomicUsize,
    files: Mutex<HashMap<String, Vec<u8>>>,
    written: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    executions: Mutex<Vec<Vec<String>>>,
    exit_code: Mutex<i32>,
    fail_write: Mutex<bool>,
    listeners: Mutex<Vec<Arc<dyn EngineLogListener>>>,
    /// When set, `execute` waits for `release` before converting
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl FakeTranscodeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn set_exit_code(&self, code: i32) {
        *self.exit_code.lock() = code;
    }

    pub fn fail_writes(&self) {
        *self.fail_write.lock() = true;
    }

    pub fn executions(&self) -> Vec<Vec<String>> {
        self.executions.lock().clone()
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns (entered, release): `entered` fires once execute starts,
    /// execute then blocks until `release` is notified.
    pub fn hold_execution(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock() = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    fn emit(&self, record: EngineLogRecord) {
        for listener in self.listeners.lock().iter() {
            listener.on_log(&record);
        }
    }
}

#[async_trait]
impl TranscodeEngine for FakeTranscodeEngine {
    fn name(&self) -> &'static str {
        "fake-transcoder"
    }

    async fn load(&self) -> Result<String, PreviewError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok("6.1".to_string())
    }

    async fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), PreviewError> {
        if *self.fail_write.lock() {
            return Err(PreviewError::Engine("virtual filesystem unavailable".to_string()));
        }
        self.written.lock().push(name.to_string());
        self.files.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> Result<ExecOutcome, PreviewError> {
        self.executions.lock().push(args.to_vec());

        let gate = self.gate.lock().clone();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        let code = *self.exit_code.lock();
        if code != 0 {
            let record = EngineLogRecord {
                stream: LogStream::Stderr,
                line: "input.webm: Invalid data found when processing input".to_string(),
            };
            self.emit(record.clone());
            return Ok(ExecOutcome { exit_code: code, log: vec![record] });
        }

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_default();
        let output = args.last().cloned().unwrap_or_default();
        let source = self.files.lock().get(&input).cloned().ok_or_else(|| {
            PreviewError::Engine(format!("{}: No such file or directory", input))
        })?;

        let mut encoded = b"ID3".to_vec();
        encoded.extend_from_slice(&source);
        self.files.lock().insert(output.clone(), encoded);

        let record = EngineLogRecord {
            stream: LogStream::Stderr,
            line: format!("size=1kB time=00:00:01.00 bitrate=192.0kbits/s ({})", output),
        };
        self.emit(record.clone());
        Ok(ExecOutcome { exit_code: 0, log: vec![record] })
    }

    async fn read_output(&self, name: &str) -> Result<Vec<u8>, PreviewError> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| PreviewError::Engine(format!("{}: No such file", name)))
    }

    async fn remove(&self, name: &str) -> Result<(), PreviewError> {
        self.removed.lock().push(name.to_string());
        self.files.lock().remove(name);
        Ok(())
    }

    fn subscribe_logs(&self, listener: Arc<dyn EngineLogListener>) {
        self.listeners.lock().push(listener);
    }
}

#[derive(Default)]
pub struct FakeRelay {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(self, url: &str, bytes: &[u8]) -> Self {
        self.payloads.lock().insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl Relay for FakeRelay {
    fn name(&self) -> &'static str {
        "fake-relay"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PreviewError> {
        self.fetched.lock().push(url.to_string());
        self.payloads
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| PreviewError::Fetch("relay responded with status 404".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    Notice(Notice),
    Progress(Option<PipelineProgress>),
    Busy(Control, bool),
    Details(Option<String>),
    UrlCleared,
    Library(usize),
}

#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<HookEvent>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HookEvent::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress_percents(&self) -> Vec<f32> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HookEvent::Progress(Some(p)) => Some(p.percent),
                _ => None,
            })
            .collect()
    }
}

impl PresentationHooks for RecordingHooks {
    fn notify(&self, notice: Notice) {
        self.events.lock().push(HookEvent::Notice(notice));
    }

    fn progress(&self, progress: Option<PipelineProgress>) {
        self.events.lock().push(HookEvent::Progress(progress));
    }

    fn control_busy(&self, control: Control, busy: bool) {
        self.events.lock().push(HookEvent::Busy(control, busy));
    }

    fn details_changed(&self, info: Option<&VideoInfo>) {
        self.events
            .lock()
            .push(HookEvent::Details(info.map(|i| i.title.clone())));
    }

    fn url_cleared(&self) {
        self.events.lock().push(HookEvent::UrlCleared);
    }

    fn library_changed(&self, entries: &[PreviewArtifact]) {
        self.events.lock().push(HookEvent::Library(entries.len()));
    }
}
