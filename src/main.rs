use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use speech_assistant::assistant::Assistant;
use speech_assistant::config::{load_config, ApiConfig};
use speech_assistant::room;
use speech_assistant::worker::{run_app, ConsoleInput, WorkerOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Talk to the assistant from the terminal
    Console {
        /// Recording to use as the user's speech instead of typed input
        #[arg(long)]
        wav: Option<PathBuf>,

        /// Directory for the agent's synthesized speech
        #[arg(long)]
        out: Option<PathBuf>,

        /// Room name
        #[arg(long, default_value = "console")]
        room: String,
    },
    /// Print a LiveKit token for joining a room
    Token {
        #[arg(long)]
        room: String,

        #[arg(long, default_value = "user")]
        identity: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    log::info!("🚀 Starting speech-assistant");

    match args.command {
        Command::Console { wav, out, room } => {
            let config = load_config().context("Failed to load configuration")?;
            console(config, wav, out, room).await
        }
        Command::Token { room, identity } => token(&room, &identity),
    }
}

async fn console(
    config: ApiConfig,
    wav: Option<PathBuf>,
    out: Option<PathBuf>,
    room_name: String,
) -> Result<()> {
    let assistant = Assistant::from_config(&config)
        .await
        .context("Failed to initialize services")?;

    let input = match wav {
        Some(path) => ConsoleInput::Wav(path),
        None => ConsoleInput::Text,
    };

    let options = WorkerOptions {
        entrypoint: Arc::new(assistant),
        room_name,
        output_dir: out,
    };

    run_app(options, input).await.context("Session failed")?;
    Ok(())
}

fn token(room_name: &str, identity: &str) -> Result<()> {
    dotenvy::dotenv().ok();
    let livekit = ApiConfig::load_livekit()
        .context("LIVEKIT_URL, LIVEKIT_API_KEY and LIVEKIT_API_SECRET must be set")?;

    let jwt = room::mint_join_token(&livekit, room_name, identity, identity)
        .context("Failed to mint join token")?;

    println!("{}", livekit.url);
    println!("{}", jwt);
    Ok(())
}
