// Engine adapters - the real collaborators behind the pipeline traits
//
// - `YtDlpEngine`: metadata resolution via `python3 -m yt_dlp` or the `yt-dlp` binary
// - `FfmpegEngine`: transcoding over a private scratch directory
// - `HttpRelay`: stream download, optionally through a relay prefix or proxy

pub mod ffmpeg;
pub mod relay;
pub mod tools;
pub mod ytdlp;

pub use ffmpeg::FfmpegEngine;
pub use relay::HttpRelay;
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use ytdlp::{ExtractorMode, YtDlpEngine};
