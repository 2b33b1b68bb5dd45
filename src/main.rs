use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley_gateway::api::ApiServerBuilder;
use parley_gateway::{Config, SpeechSynthesizer, SpeechToText, TextToSpeech};

/// Parley - turn-based voice conversation relay
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the page and the voice API (default)
    Serve,
    /// Transcribe an audio file once and print the text
    Transcribe {
        /// Recording to transcribe
        file: PathBuf,
    },
    /// Synthesize text once and write the audio to a file
    Synthesize {
        /// Text to speak
        text: String,
        /// Output file
        #[arg(short, long, default_value = "speech.mp3")]
        out: PathBuf,
    },
    /// Load the configuration and print it with secrets redacted
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,parley_gateway=info",
        1 => "info,parley_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Transcribe { file } => transcribe_file(&config, &file).await,
        Command::Synthesize { text, out } => synthesize_to_file(&config, &text, &out).await,
        Command::CheckConfig => {
            println!("{config:#?}");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.port,
        persona = %config.persona.id,
        model = %config.llm.model,
        "starting parley"
    );

    let server = ApiServerBuilder::from_config(config)?.build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

async fn transcribe_file(config: &Config, file: &Path) -> anyhow::Result<()> {
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("recording.webm");

    let stt = SpeechToText::from_config(config)?;
    let text = stt.transcribe(&audio, file_name).await?;
    println!("{text}");
    Ok(())
}

async fn synthesize_to_file(config: &Config, text: &str, out: &Path) -> anyhow::Result<()> {
    let tts = TextToSpeech::from_config(config)?;
    let audio = tts.synthesize(text).await?;
    tokio::fs::write(out, &audio)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;

    tracing::info!(bytes = audio.len(), path = %out.display(), "speech written");
    Ok(())
}
