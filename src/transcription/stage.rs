use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Transcriber;
use crate::backend::BackendPool;
use crate::pipeline::{PipelineCounters, WorkQueue};
use crate::translation::TranslationJob;
use crate::video::VideoFile;

/// Workers that move videos from the transcription queue to the translation queue
#[derive(Clone)]
pub struct TranscriptionStage {
    transcriber: Arc<dyn Transcriber>,
    pool: Arc<BackendPool>,
    input: WorkQueue<VideoFile>,
    output: WorkQueue<TranslationJob>,
    counters: Arc<PipelineCounters>,
}

impl TranscriptionStage {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        pool: Arc<BackendPool>,
        input: WorkQueue<VideoFile>,
        output: WorkQueue<TranslationJob>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            transcriber,
            pool,
            input,
            output,
            counters,
        }
    }

    /// Start `workers` tasks; each exits once the input queue is closed and empty
    pub fn spawn(self, workers: usize) -> Vec<JoinHandle<()>> {
        (0..workers.max(1))
            .map(|worker_id| {
                let stage = self.clone();
                tokio::spawn(async move { stage.run_worker(worker_id).await })
            })
            .collect()
    }

    async fn run_worker(self, worker_id: usize) {
        debug!("Transcription worker {} started", worker_id);

        while let Some(lease) = self.input.pop().await {
            // The ack is held until the outcome is recorded
            let (video, _ack) = lease.into_parts();
            self.process(worker_id, video).await;
        }

        debug!("Transcription worker {} finished", worker_id);
    }

    async fn process(&self, worker_id: usize, video: VideoFile) {
        let backend = self.pool.next();
        info!(
            "🎤 [worker {}] Transcribing {}/{} on {}",
            worker_id, video.channel, video.file_name, backend.address
        );

        match self.transcriber.transcribe(backend, &video).await {
            Ok(segments) => {
                let label = format!("{}/{}", video.channel, video.file_name);
                let count = segments.len();

                match self.output.push(TranslationJob { video, segments }) {
                    Ok(()) => {
                        self.counters.record_transcribed();
                        info!("✅ Transcribed {} ({} segments)", label, count);
                    }
                    Err(_) => {
                        warn!("⚠️ Translation queue closed, dropping {}", label);
                        self.counters.record_failed();
                    }
                }
            }
            Err(e) => {
                error!("❌ Transcription failed for {}/{}: {}", video.channel, video.file_name, e);
                self.counters.record_failed();
            }
        }
    }
}
