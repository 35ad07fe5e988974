use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use subtitle_pipeline::backend::check_health;
use subtitle_pipeline::document::load_sidecar;
use subtitle_pipeline::{Backend, Config, ContentFingerprint};

#[derive(Parser)]
#[command(name = "subtitle-tools")]
#[command(about = "Maintenance utilities for the subtitle pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the health endpoint of transcription backends
    Health {
        /// Backend base URLs; defaults to the configured backends
        backends: Vec<String>,

        #[arg(long, default_value_t = 10)]
        timeout_seconds: u64,
    },
    /// Summarize a subtitle document
    Inspect {
        /// Path to the JSON sidecar
        sidecar: PathBuf,
    },
    /// Print the content fingerprint of a video
    Fingerprint {
        /// Video file path
        video: PathBuf,
    },
    /// Write the default configuration to a TOML file
    InitConfig {
        #[arg(default_value = "subtitle-pipeline.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("subtitle_pipeline=info,subtitle_tools=info")
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Health {
            backends,
            timeout_seconds,
        } => {
            let backends = if backends.is_empty() {
                Config::load()?.transcription.backends
            } else {
                backends
            };

            let client = reqwest::Client::new();
            for address in backends {
                let backend = Backend::new(address);
                match check_health(&client, &backend, Duration::from_secs(timeout_seconds)).await {
                    Ok(health) => info!(
                        "{} {} - status: {}, model loaded: {}, version: {}",
                        if health.model_loaded { "✅" } else { "⚠️" },
                        backend.address,
                        health.status,
                        health.model_loaded,
                        health.version.as_deref().unwrap_or("unknown")
                    ),
                    Err(e) => warn!("❌ {} - {}", backend.address, e),
                }
            }
        }

        Commands::Inspect { sidecar } => {
            let document = load_sidecar(&sidecar)
                .await
                .with_context(|| format!("Cannot read {}", sidecar.display()))?;
            let info = &document.video_info;
            let translation = Config::load()?.translation;
            let failed = document.count_tagged(&translation.failure_tag);
            let untranslated = document.count_tagged(&translation.fallback_tag);

            info!("📄 {}", sidecar.display());
            info!("   Video: {}/{}", info.channel, info.filename);
            info!("   Processed at: {}", info.processed_at);
            info!("   Duration: {:.1}s", info.duration);
            info!(
                "   Segments: {} ({} failed translations, {} left untranslated)",
                document.subtitles.len(),
                failed,
                untranslated
            );
            if info.video_hash.is_empty() {
                info!("   Fingerprint: none (legacy document)");
            } else {
                info!("   Fingerprint: {} ({} bytes)", info.video_hash, info.file_size);
            }
        }

        Commands::Fingerprint { video } => {
            let fingerprint = ContentFingerprint::compute(&video)
                .await
                .with_context(|| format!("Cannot fingerprint {}", video.display()))?;
            info!(
                "🔑 {} {} ({} bytes, mtime {})",
                fingerprint.digest,
                video.display(),
                fingerprint.file_size,
                fingerprint.file_mtime
            );
        }

        Commands::InitConfig { path } => {
            if path.exists() {
                warn!("⚠️ {} already exists, not overwriting", path.display());
                return Ok(());
            }
            Config::default().save(&path)?;
        }
    }

    Ok(())
}
