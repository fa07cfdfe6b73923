// Command line front end: one-shot commands and an interactive shell
//
// The terminal plays the presentation layer; `TerminalHooks` prints what a
// UI would show. Playback has no audio device behind it, only the player
// clock, which the shell advances once per second.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::engines::{FfmpegEngine, HttpRelay, ToolManager, YtDlpEngine};
use crate::pipeline::{
    format_bytes, AudioPlayer, Control, Notice, NoticeLevel, PipelineProgress, PlaybackListener,
    PlayerState, PresentationHooks, PreviewArtifact, PreviewError, PreviewSession, SessionId,
    VideoInfo,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file (default: <config dir>/audio-preview/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Relay prefix; the stream URL is appended percent-encoded
    #[arg(long)]
    pub relay: Option<String>,

    /// HTTP or SOCKS5 proxy for resolution and downloads
    #[arg(long)]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve a URL and list its audio-only formats
    Info { url: String },

    /// Resolve, transcode to MP3 and save the result
    Convert {
        url: String,

        /// Format id to use instead of the first one
        #[arg(short, long)]
        format: Option<String>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Interactive session with a preview library and playback
    Shell,

    /// Show detected external tools
    Tools,
}

/// Entry point used by the binary
pub async fn run(args: Args) -> ExitCode {
    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config
            .with_relay(args.relay.clone())
            .with_proxy(args.proxy.clone()),
        Err(e) => {
            init_logging("info");
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.level);

    let outcome = match args.command {
        Command::Tools => {
            print_tools();
            Ok(())
        }
        Command::Info { url } => match build_session(&config) {
            Ok(session) => info(&session, &url).await,
            Err(e) => Err(e),
        },
        Command::Convert { url, format, out } => {
            let config = config.with_download_dir(out);
            match build_session(&config) {
                Ok(session) => convert(&session, &config, &url, format.as_deref()).await,
                Err(e) => Err(e),
            }
        }
        Command::Shell => match build_session(&config) {
            Ok(session) => shell(Arc::new(session), &config).await,
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        // Session operations have already reported through the hooks
        Err(e) => {
            tracing::debug!("[Cli] Exiting after {:?}", e);
            ExitCode::FAILURE
        }
    }
}

pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("audio_preview_lib={0},audio_preview={0}", level))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_session(config: &AppConfig) -> Result<PreviewSession, PreviewError> {
    let built = FfmpegEngine::new(&config.engines).and_then(|transcoder| {
        let relay = HttpRelay::new(&config.network)?;
        Ok((transcoder, relay))
    });
    let (transcoder, relay) = match built {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Err(e);
        }
    };

    let metadata = YtDlpEngine::new(&config.engines, &config.network);
    Ok(PreviewSession::new(
        Arc::new(metadata),
        Arc::new(transcoder),
        Arc::new(relay),
        Arc::new(TerminalHooks),
    ))
}

async fn info(session: &PreviewSession, url: &str) -> Result<(), PreviewError> {
    session.initialize().await?;
    session.extract(url).await?;
    print_formats(session);
    Ok(())
}

async fn convert(
    session: &PreviewSession,
    config: &AppConfig,
    url: &str,
    format: Option<&str>,
) -> Result<(), PreviewError> {
    session.initialize().await?;
    session.extract(url).await?;

    if let Some(id) = format {
        if !session.select(id) {
            let e = PreviewError::Selection(format!("Unknown format id '{}'", id));
            eprintln!("✗ {}", e);
            print_formats(session);
            return Err(e);
        }
    }

    session.preview().await?;
    let index = session.library().len().saturating_sub(1);
    session.download(index, &config.output.download_dir())?;
    Ok(())
}

fn print_tools() {
    for tool in ToolManager::new().get_all_tools() {
        let mark = if tool.is_available { "✓" } else { "✗" };
        println!(
            "{} {:<8} {:<14} {}",
            mark,
            tool.name,
            tool.version.as_deref().unwrap_or("-"),
            tool.path.as_deref().unwrap_or("not found")
        );
    }
}

fn print_formats(session: &PreviewSession) {
    let options = session.quality_options();
    if options.is_empty() {
        return;
    }
    println!("Audio formats:");
    for option in options {
        let marker = if option.is_selected { "*" } else { " " };
        println!(
            " {} {:<8} {:<18} {}",
            marker,
            option.format_id,
            option.label,
            option.size.as_deref().unwrap_or("")
        );
    }
}

fn print_library(entries: &[PreviewArtifact]) {
    if entries.is_empty() {
        println!("Library is empty");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. {} - {} ({})",
            i + 1,
            entry.title,
            entry.artist,
            format_bytes(entry.audio.len() as u64)
        );
    }
}

/// Prints what a UI would display
pub struct TerminalHooks;

impl PresentationHooks for TerminalHooks {
    fn notify(&self, notice: Notice) {
        let mark = match notice.level {
            NoticeLevel::Info => "ℹ",
            NoticeLevel::Success => "✓",
            NoticeLevel::Warning => "⚠",
            NoticeLevel::Error => "✗",
        };
        eprintln!("{} {}", mark, notice.message);
    }

    fn progress(&self, progress: Option<PipelineProgress>) {
        if let Some(p) = progress {
            eprintln!("[{:>3}%] {} {}", p.percent, p.stage, p.status);
        }
    }

    fn control_busy(&self, control: Control, busy: bool) {
        tracing::trace!("[Cli] {:?} busy={}", control, busy);
    }

    fn details_changed(&self, info: Option<&VideoInfo>) {
        if let Some(info) = info {
            println!("{}", info.title);
            println!("  by {}", info.artist);
            if !info.thumbnail.is_empty() {
                println!("  {}", info.thumbnail);
            }
        }
    }

    fn library_changed(&self, entries: &[PreviewArtifact]) {
        tracing::debug!("[Cli] Library now has {} entries", entries.len());
    }
}

struct TerminalPlayback;

impl PlaybackListener for TerminalPlayback {
    fn on_state_change(&self, id: SessionId, state: PlayerState) {
        let label = match state {
            PlayerState::Playing => "▶ playing",
            PlayerState::Paused => "⏸ paused",
            PlayerState::Ended => "⏹ ended",
        };
        println!("{} {}", id, label);
    }
}

const SHELL_HELP: &str = "\
Commands:
  extract <url>        resolve a URL
  formats              list audio formats of the current media
  select <format id>   choose a format
  preview              transcode the selection into the library
  list                 show the library
  download <n> [dir]   save entry n as MP3
  delete <n>           remove entry n
  play <n>             play entry n (pauses anything else)
  pause [n]            pause entry n, or whatever is playing
  seek <n> <seconds>   move the playhead of entry n
  status               show players
  help | quit";

struct Shell {
    session: Arc<PreviewSession>,
    download_dir: PathBuf,
    listener: Arc<dyn PlaybackListener>,
}

async fn shell(session: Arc<PreviewSession>, config: &AppConfig) -> Result<(), PreviewError> {
    // Engine failures are reported by the hooks; `extract` retries later
    let _ = session.initialize().await;

    let shell = Shell {
        session,
        download_dir: config.output.download_dir(),
        listener: Arc::new(TerminalPlayback),
    };

    println!("{}", SHELL_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                if !shell.dispatch(line.trim(), &mut lines).await? {
                    break;
                }
                prompt();
            }
            _ = ticker.tick() => {
                for player in shell.session.players() {
                    player.advance(Duration::from_secs(1));
                }
            }
        }
    }
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// 1-based position from user input
fn parse_index(arg: Option<&str>) -> Option<usize> {
    arg?.parse::<usize>().ok()?.checked_sub(1)
}

impl Shell {
    /// Returns false when the user asked to quit
    async fn dispatch(
        &self,
        line: &str,
        lines: &mut Lines<BufReader<Stdin>>,
    ) -> Result<bool, PreviewError> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(true);
        };
        let arg = parts.next();

        match command {
            "extract" => match arg {
                Some(url) => {
                    if self.session.extract(url).await.is_ok() {
                        print_formats(&self.session);
                    }
                }
                None => println!("usage: extract <url>"),
            },
            "formats" => print_formats(&self.session),
            "select" => match arg {
                Some(id) if self.session.select(id) => print_formats(&self.session),
                Some(id) => println!("Unknown format id '{}'", id),
                None => println!("usage: select <format id>"),
            },
            "preview" => {
                let _ = self.session.preview().await;
            }
            "list" => print_library(&self.session.library().all()),
            "download" => match parse_index(arg) {
                Some(index) => {
                    let dir = parts
                        .next()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| self.download_dir.clone());
                    let _ = self.session.download(index, &dir);
                }
                None => println!("usage: download <n> [dir]"),
            },
            "delete" => match parse_index(arg) {
                Some(index) => self.delete(index, lines).await?,
                None => println!("usage: delete <n>"),
            },
            "play" => match parse_index(arg).and_then(|i| self.player(i)) {
                Some(player) => player.play(),
                None => println!("usage: play <n>"),
            },
            "pause" => match arg {
                Some(_) => match parse_index(arg).and_then(|i| self.player(i)) {
                    Some(player) => player.pause(),
                    None => println!("usage: pause [n]"),
                },
                None => {
                    let current = self.session.coordinator().current();
                    let playing = self.session.players().into_iter().find(|p| Some(p.id()) == current);
                    if let Some(player) = playing {
                        player.pause();
                    }
                }
            },
            "seek" => {
                let seconds = parts.next().and_then(|s| s.parse::<f64>().ok());
                match (parse_index(arg).and_then(|i| self.player(i)), seconds) {
                    (Some(player), Some(secs)) if secs.is_finite() && secs >= 0.0 => {
                        player.seek(Duration::from_secs_f64(secs));
                        println!("{}", player.time_label());
                    }
                    _ => println!("usage: seek <n> <seconds>"),
                }
            }
            "status" => self.print_status(),
            "help" => println!("{}", SHELL_HELP),
            "quit" | "exit" => return Ok(false),
            other => println!("Unknown command '{}', try help", other),
        }
        Ok(true)
    }

    fn player(&self, index: usize) -> Option<Arc<AudioPlayer>> {
        self.session.player(index, Some(self.listener.clone()))
    }

    async fn delete(
        &self,
        index: usize,
        lines: &mut Lines<BufReader<Stdin>>,
    ) -> Result<(), PreviewError> {
        let confirmed = match self.session.library().get(index) {
            Some(artifact) => {
                print!("Delete '{}'? [y/N] ", artifact.title);
                let _ = std::io::stdout().flush();
                let answer = lines.next_line().await?.unwrap_or_default();
                matches!(answer.trim(), "y" | "Y" | "yes")
            }
            // Let the session report the bad position
            None => false,
        };

        // The session stops the clip if it was playing
        self.session.delete(index, |_| confirmed);
        Ok(())
    }

    fn print_status(&self) {
        let entries = self.session.library().all();
        let players = self.session.players();
        if players.is_empty() {
            println!("No players");
            return;
        }
        for player in players {
            let title = entries
                .iter()
                .find(|e| e.id == player.artifact_id())
                .map_or("", |e| e.title.as_str());
            println!(
                "{} {:?} {} {}",
                player.id(),
                player.state(),
                player.time_label(),
                title
            );
        }
    }
}
