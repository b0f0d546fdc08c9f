//! narrate CLI: synthesize text to a WAV file with the ONNX Kokoro backend.
//!
//! ```text
//! narrate "Hello there" [--voice af_heart] [--user alice] [--config narrate.toml]
//! echo "Hello there" | narrate --voice bm_george
//! narrate voices
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use narrate_core::{OnnxBackend, TtsConfig, TtsEngine, VoiceCatalog};
use tracing_subscriber::EnvFilter;

/// Cached Kokoro text-to-speech
#[derive(Parser)]
#[command(name = "narrate", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Text to speak; read from stdin when omitted
    text: Option<String>,

    /// Voice id
    #[arg(long)]
    voice: Option<String>,

    /// Identity the output is filed under
    #[arg(long, default_value = "cli")]
    user: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in voices
    Voices,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Some(Command::Voices) => {
            list_voices();
            Ok(())
        }
        None => speak(&cli),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn list_voices() {
    for voice in VoiceCatalog::default().voices() {
        println!("{:<12} {:<8} {}", voice.id, voice.gender().to_string(), voice.label);
    }
}

fn speak(cli: &Cli) -> anyhow::Result<()> {
    let text = match &cli.text {
        Some(text) => text.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading text from stdin")?;
            buf
        }
    };
    if text.trim().is_empty() {
        bail!("no text given");
    }

    let config = match &cli.config {
        Some(path) => TtsConfig::from_toml_file_with_base(path, &TtsConfig::kokoro_onnx())
            .with_context(|| format!("loading {}", path.display()))?,
        None => TtsConfig::kokoro_onnx(),
    };
    tracing::debug!("Configuration: {:?}", config);

    let engine = TtsEngine::new(config, OnnxBackend::new())?;
    let result = engine.synthesize(&text, cli.voice.as_deref(), &cli.user)?;

    println!("{}", result.output_path.display());
    eprintln!(
        "{:.2}s at {} Hz with voice {}",
        result.duration_secs(),
        result.sample_rate,
        result.voice
    );
    Ok(())
}
