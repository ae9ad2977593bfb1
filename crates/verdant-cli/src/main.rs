mod config;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use verdant::prelude::*;

#[derive(Parser)]
#[command(name = "verdant")]
#[command(about = "Verdant CLI - Speak text through the playback coordinator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize text and play it on the default audio device
    Speak {
        /// Key identifying the content being read
        #[arg(short, long)]
        key: String,

        /// Text to read aloud
        #[arg(short, long)]
        text: String,

        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "verdant.toml")]
        config: PathBuf,
    },
    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "verdant.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Speak { key, text, config } => {
            speak(config, key, text).await?;
        }
        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

async fn speak(config_path: PathBuf, key: String, text: String) -> Result<()> {
    let config = AppConfig::from_file(&config_path)?;
    log::info!("Loaded configuration from {}", config_path.display());

    let synthesizer = HttpSynthesisClient::new(config.resolved_synthesis())
        .context("Failed to create synthesis client")?;
    let output = RodioOutput::try_new(RodioOutputConfig {
        poll_interval: config.output.poll_interval(),
    })
    .context("Failed to open audio output")?;

    let coordinator = PlaybackCoordinator::builder(Arc::new(synthesizer), Arc::new(output))
        .config(config.playback.clone())
        .build();

    let mut card = coordinator.attach(key.clone());
    let handle = card.play(text);

    loop {
        tokio::select! {
            status = card.changed() => {
                match status {
                    Some(status) => {
                        println!("{key}: {status:?}");
                        if status == PlaybackStatus::Idle {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping '{key}'");
                card.stop();
                break;
            }
        }
    }

    match handle.await.context("Playback task panicked")? {
        Ok(PlaybackOutcome::Started) => Ok(()),
        Ok(PlaybackOutcome::Superseded) => {
            println!("{key}: stopped before playback started");
            Ok(())
        }
        Err(e) if e.is_configuration_error() => {
            bail!("Speech is not configured: {e}")
        }
        Err(e) => bail!("Could not generate or play audio: {e}"),
    }
}

fn check_config(config_path: PathBuf) -> Result<()> {
    let config = AppConfig::from_file(&config_path)?;
    let synthesis = config.resolved_synthesis();

    println!("Configuration {} is valid", config_path.display());
    println!("  endpoint:          {}", synthesis.endpoint);
    println!(
        "  api key:           {}",
        match synthesis.api_key {
            Some(_) => "set (redacted)".to_string(),
            None => format!("missing (set {})", config.synthesis.api_key_env),
        }
    );
    println!(
        "  voice:             {}",
        synthesis.voice.as_deref().unwrap_or("provider default")
    );
    println!(
        "  synthesis timeout: {}",
        config
            .playback
            .synthesis_timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  event buffer:      {}", config.playback.event_buffer);
    println!("  poll interval:     {}ms", config.output.poll_interval_ms);

    Ok(())
}
