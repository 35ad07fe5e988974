//! Two-stage pipeline orchestration.
//!
//! Discovered videos are seeded into a transcription queue, transcribed by a
//! pool of workers that dispatch round-robin across the healthy backends,
//! handed to a translation queue, translated in batches and persisted. A
//! coordinator ends the run once every video is either persisted or failed.

pub mod coordinator;
pub mod queue;
pub mod state;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::backend::BackendPool;
use crate::config::Config;
use crate::document::{SidecarLayout, SidecarWriter};
use crate::error::{PipelineError, Result};
use crate::fingerprint::FingerprintStore;
use crate::transcription::{Transcriber, TranscriptionStage, WhisperClient};
use crate::translation::{BatchTranslator, MyMemoryTranslator, TranslationStage, Translator};
use crate::video::{DiscoveryReport, VideoFile, VideoScanner};

pub use coordinator::{Coordinator, ProgressReporter, TracingReporter};
pub use queue::{Ack, Lease, WorkQueue};
pub use state::{CounterSnapshot, PipelineCounters, ProgressSnapshot, QueueSnapshot};

/// Final accounting of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub transcribed: usize,
    pub translated: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_snapshot(counters: CounterSnapshot, elapsed: Duration) -> Self {
        Self {
            total: counters.total,
            transcribed: counters.transcribed,
            translated: counters.translated,
            processed: counters.processed,
            failed: counters.failed,
            skipped: counters.skipped,
            elapsed,
        }
    }

    pub fn videos_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.processed as f64 / minutes
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        info!("🎉 Processing complete!");
        info!("   Total: {}", self.total);
        info!("   Succeeded: {}", self.processed);
        info!("   Failed: {}", self.failed);
        info!("   Skipped: {}", self.skipped);
        info!("   Elapsed: {:.1} minutes", self.elapsed.as_secs_f64() / 60.0);
        if self.processed > 0 {
            info!("   Throughput: {:.2} videos/minute", self.videos_per_minute());
        }
    }
}

/// Runs discovery, both worker stages and the coordinator for one video root.
///
/// Counters accumulate over the lifetime of the value, so use one `Pipeline`
/// per run.
pub struct Pipeline {
    config: Config,
    http: reqwest::Client,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    reporter: Arc<dyn ProgressReporter>,
    fingerprints: FingerprintStore,
    counters: Arc<PipelineCounters>,
    progress_interval: Duration,
}

impl Pipeline {
    /// Build a pipeline with the HTTP transcription and translation clients
    pub fn new(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let transcriber = Arc::new(WhisperClient::new(&config.transcription)?);
        let translator = Arc::new(MyMemoryTranslator::new(&config.translation)?);

        Ok(Self {
            http: reqwest::Client::new(),
            transcriber,
            translator,
            reporter: Arc::new(TracingReporter),
            fingerprints: FingerprintStore::new(),
            counters: Arc::new(PipelineCounters::new()),
            progress_interval: config.progress.interval(),
            config,
        })
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    /// Probe the configured backends; fails if none is ready
    pub async fn probe_backends(&self) -> Result<BackendPool> {
        let timeout = Duration::from_secs(self.config.transcription.health_timeout_seconds);
        BackendPool::probe(&self.config.transcription.backends, &self.http, timeout).await
    }

    /// Find the videos under `root` that still need a document
    pub async fn discover(&self, root: &Path) -> Result<DiscoveryReport> {
        info!("🔍 Scanning {}", root.display());
        VideoScanner::new(&self.config.processing)
            .with_fingerprint_store(self.fingerprints.clone())
            .discover(root, &self.counters)
            .await
    }

    /// Probe, discover and process everything without asking
    pub async fn run(&self, root: &Path) -> Result<RunSummary> {
        Ok(self.run_with_confirm(root, |_| true).await?.unwrap_or_default())
    }

    /// Probe, discover, ask `confirm` about the pending videos, then process them.
    ///
    /// Returns `None` if `confirm` declined. Probe and discovery errors are
    /// returned before any work is queued.
    pub async fn run_with_confirm<F>(&self, root: &Path, confirm: F) -> Result<Option<RunSummary>>
    where
        F: FnOnce(&DiscoveryReport) -> bool,
    {
        let started = Instant::now();
        let pool = self.probe_backends().await?;
        let report = self.discover(root).await?;

        if report.videos.is_empty() {
            info!("✨ All videos already processed");
            return Ok(Some(RunSummary::from_snapshot(
                self.counters.snapshot(),
                started.elapsed(),
            )));
        }

        if !confirm(&report) {
            info!("Processing cancelled");
            return Ok(None);
        }

        Ok(Some(self.process(pool, report.videos).await))
    }

    /// Run both stages over `videos` until every one is persisted or failed
    pub async fn process(&self, pool: BackendPool, videos: Vec<VideoFile>) -> RunSummary {
        let started = Instant::now();
        let transcribe_workers = self.config.transcription.workers;
        let translate_workers = self.config.translation.workers;

        info!("🚀 Starting pipeline for {} video(s)", videos.len());
        info!(
            "   Backends: {} | transcription workers: {} | translation workers: {}",
            pool.addresses().join(", "),
            transcribe_workers,
            translate_workers
        );

        let transcription_queue = WorkQueue::new();
        let translation_queue = WorkQueue::new();

        self.counters.set_total(videos.len());
        for video in videos {
            if let Err(video) = transcription_queue.push(video) {
                warn!("Transcription queue closed, dropping {}", video.file_name);
                self.counters.record_failed();
            }
        }
        // Nothing else is ever seeded, so transcription workers exit once it drains
        transcription_queue.close();

        let writer = SidecarWriter::new(
            SidecarLayout::from_output_dir(self.config.processing.output_dir.clone()),
            self.config.processing.sidecar_extension.clone(),
        );

        let mut handles = TranscriptionStage::new(
            Arc::clone(&self.transcriber),
            Arc::new(pool),
            transcription_queue.clone(),
            translation_queue.clone(),
            Arc::clone(&self.counters),
        )
        .spawn(transcribe_workers);

        handles.extend(
            TranslationStage::new(
                BatchTranslator::new(Arc::clone(&self.translator), &self.config.translation),
                writer,
                translation_queue.clone(),
                Arc::clone(&self.counters),
            )
            .spawn(translate_workers),
        );

        let coordinator = Coordinator::new(
            Arc::clone(&self.counters),
            transcription_queue,
            translation_queue,
            self.progress_interval,
            Arc::clone(&self.reporter),
        );
        coordinator.run().await;

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Worker task ended abnormally: {}", e);
            }
        }

        RunSummary::from_snapshot(self.counters.snapshot(), started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_videos_per_minute() {
        let summary = RunSummary {
            processed: 6,
            elapsed: Duration::from_secs(120),
            ..Default::default()
        };
        assert_eq!(summary.videos_per_minute(), 3.0);
        assert_eq!(RunSummary::default().videos_per_minute(), 0.0);
    }

    #[test]
    fn test_summary_from_snapshot() {
        let counters = PipelineCounters::new();
        counters.set_total(3);
        counters.record_transcribed();
        counters.record_processed();
        counters.record_failed();
        counters.record_skipped();

        let summary = RunSummary::from_snapshot(counters.snapshot(), Duration::from_secs(1));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.translated, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.transcription.workers = 0;
        assert!(matches!(Pipeline::new(config), Err(PipelineError::Config(_))));
    }
}
