use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use subtitle_pipeline::{Config, DedupStrategy, DiscoveryReport, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Subtitle Pipeline")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Parallel Whisper transcription and bilingual subtitle generation")
        .arg(
            Arg::new("video-dir")
                .short('d')
                .long("video-dir")
                .value_name("DIR")
                .help("Root directory with one sub-directory per channel")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .value_name("URL")
                .help("Transcription backend base URL (repeatable, dispatch order)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("transcribe-workers")
                .long("transcribe-workers")
                .value_name("NUM")
                .help("Concurrent transcription workers")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("translate-workers")
                .long("translate-workers")
                .value_name("NUM")
                .help("Concurrent translation workers")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("dedup")
                .long("dedup")
                .value_name("STRATEGY")
                .help("Skip already processed videos: none, path_exists or fingerprint"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Write documents under DIR/<channel>/ instead of next to each video")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .help("Start without asking for confirmation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("List videos that would be processed and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // No logging before the subscriber is initialized
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .or_else(|| Config::locate(Path::new(".")));
    let mut config = match &config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::from_env()?,
    };

    let level = if matches.get_flag("verbose") {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("subtitle_pipeline={},warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &config_path {
        Some(path) => info!("📄 Loaded configuration from: {}", path.display()),
        None => info!("📄 No configuration file found, using defaults and environment"),
    }

    if let Some(backends) = matches.get_many::<String>("backend") {
        config.transcription.backends = backends.cloned().collect();
    }
    if let Some(workers) = matches.get_one::<usize>("transcribe-workers") {
        config.transcription.workers = *workers;
    }
    if let Some(workers) = matches.get_one::<usize>("translate-workers") {
        config.translation.workers = *workers;
    }
    if let Some(dedup) = matches.get_one::<String>("dedup") {
        config.processing.dedup = dedup.parse::<DedupStrategy>()?;
    }
    if let Some(output_dir) = matches.get_one::<PathBuf>("output-dir") {
        config.processing.output_dir = Some(output_dir.clone());
    }

    let video_dir = matches
        .get_one::<PathBuf>("video-dir")
        .cloned()
        .context("--video-dir is required")?;

    info!("🚀 Subtitle Pipeline starting...");
    info!("📁 Video directory: {}", video_dir.display());
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let pipeline = Pipeline::new(config)?;

    if matches.get_flag("dry-run") {
        let report = pipeline.discover(&video_dir).await?;
        print_report(&report);
        return Ok(());
    }

    let assume_yes = matches.get_flag("yes");
    let outcome = pipeline
        .run_with_confirm(&video_dir, |report| {
            print_report(report);
            assume_yes || ask_to_continue()
        })
        .await?;

    match outcome {
        Some(summary) => summary.log(),
        None => info!("👋 Nothing was processed"),
    }

    Ok(())
}

fn print_report(report: &DiscoveryReport) {
    println!(
        "📹 {} video(s) to process ({:.2} GB), {} already done",
        report.videos.len(),
        report.total_bytes() as f64 / (1024.0 * 1024.0 * 1024.0),
        report.skipped
    );
    for video in &report.videos {
        println!("   {}/{} ({:.1} MB)", video.channel, video.file_name, video.size_mb());
    }
}

fn ask_to_continue() -> bool {
    print!("Start processing? (y/n): ");
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match std::io::stdin().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
