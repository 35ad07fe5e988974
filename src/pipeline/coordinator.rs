use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::queue::WorkQueue;
use super::state::{PipelineCounters, ProgressSnapshot};
use crate::translation::TranslationJob;
use crate::video::VideoFile;

/// Receives a progress snapshot on every coordinator tick
pub trait ProgressReporter: Send + Sync {
    fn report(&self, snapshot: &ProgressSnapshot);
}

/// Writes progress reports to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, snapshot: &ProgressSnapshot) {
        snapshot.log();
    }
}

/// Watches both stages and ends the run once every video is accounted for
pub struct Coordinator {
    counters: Arc<PipelineCounters>,
    transcription: WorkQueue<VideoFile>,
    translation: WorkQueue<TranslationJob>,
    interval: Duration,
    reporter: Arc<dyn ProgressReporter>,
}

impl Coordinator {
    pub fn new(
        counters: Arc<PipelineCounters>,
        transcription: WorkQueue<VideoFile>,
        translation: WorkQueue<TranslationJob>,
        interval: Duration,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            counters,
            transcription,
            translation,
            interval,
            reporter,
        }
    }

    /// Sample counters first, then the queues in pipeline order.
    ///
    /// Workers push downstream before acknowledging upstream, so a drained
    /// reading taken in this order cannot miss work moving between stages.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = self.counters.snapshot();
        let transcription_queue = self.transcription.snapshot();
        let translation_queue = self.translation.snapshot();

        ProgressSnapshot {
            counters,
            transcription_queue,
            translation_queue,
        }
    }

    /// Tick until the run is complete, then close both queues so idle workers exit
    pub async fn run(self) -> ProgressSnapshot {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let snapshot = self.snapshot();
            self.reporter.report(&snapshot);

            if snapshot.is_complete() {
                info!("🎉 All videos accounted for, shutting down workers");
                self.transcription.close();
                self.translation.close();
                return snapshot;
            }
        }
    }
}
