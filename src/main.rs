use clap::Parser;

use audio_preview_lib::cli::Args;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    audio_preview_lib::run(Args::parse()).await
}
