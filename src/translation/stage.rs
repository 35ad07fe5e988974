use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{BatchTranslator, TranslationJob};
use crate::document::SidecarWriter;
use crate::pipeline::{PipelineCounters, WorkQueue};

/// Workers that translate transcribed videos and persist their documents
#[derive(Clone)]
pub struct TranslationStage {
    translator: BatchTranslator,
    writer: SidecarWriter,
    input: WorkQueue<TranslationJob>,
    counters: Arc<PipelineCounters>,
}

impl TranslationStage {
    pub fn new(
        translator: BatchTranslator,
        writer: SidecarWriter,
        input: WorkQueue<TranslationJob>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            translator,
            writer,
            input,
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
        debug!("Translation worker {} started", worker_id);

        while let Some(lease) = self.input.pop().await {
            let (job, _ack) = lease.into_parts();
            self.process(worker_id, job).await;
        }

        debug!("Translation worker {} finished", worker_id);
    }

    async fn process(&self, worker_id: usize, job: TranslationJob) {
        let TranslationJob { video, segments } = job;
        info!(
            "🌐 [worker {}] Translating {}/{} ({} segments)",
            worker_id,
            video.channel,
            video.file_name,
            segments.len()
        );

        let bilingual = self.translator.translate_segments(&segments).await;

        match self.writer.write(&video, bilingual).await {
            Ok(_) => {
                self.counters.record_processed();
                info!("✅ Completed {}/{}", video.channel, video.file_name);
            }
            Err(e) => {
                error!("❌ Failed to save document for {}/{}: {}", video.channel, video.file_name, e);
                self.counters.record_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::{load_sidecar, SidecarLayout};
    use crate::error::TranslationError;
    use crate::subtitle::SubtitleSegment;
    use crate::translation::Translator;
    use crate::video::VideoFile;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct UppercaseTranslator;

    #[async_trait]
    impl Translator for UppercaseTranslator {
        async fn translate(&self, text: &str) -> Result<String, TranslationError> {
            Ok(text.to_uppercase())
        }
    }

    fn stage_for(input: WorkQueue<TranslationJob>, counters: Arc<PipelineCounters>) -> TranslationStage {
        let config = Config::default();
        TranslationStage::new(
            BatchTranslator::new(Arc::new(UppercaseTranslator), &config.translation),
            SidecarWriter::new(SidecarLayout::BesideVideo, "json"),
            input,
            counters,
        )
    }

    #[tokio::test]
    async fn test_stage_persists_and_counts() {
        let temp_dir = TempDir::new().unwrap();
        let channel = temp_dir.path().join("A");
        std::fs::create_dir_all(&channel).unwrap();
        let path = channel.join("vid1.mp4");
        std::fs::write(&path, b"payload").unwrap();

        let input = WorkQueue::new();
        let counters = Arc::new(PipelineCounters::new());
        input
            .push(TranslationJob {
                video: VideoFile::new(path, "A".to_string(), 7),
                segments: vec![SubtitleSegment::new(0.0, 2.0, "hello")],
            })
            .unwrap();
        // Missing video: the writer cannot fingerprint it
        input
            .push(TranslationJob {
                video: VideoFile::new(channel.join("gone.mp4"), "A".to_string(), 0),
                segments: vec![SubtitleSegment::new(0.0, 1.0, "bye")],
            })
            .unwrap();
        input.close();

        for handle in stage_for(input.clone(), Arc::clone(&counters)).spawn(2) {
            handle.await.unwrap();
        }

        assert_eq!(counters.processed(), 1);
        assert_eq!(counters.translated(), 1);
        assert_eq!(counters.failed(), 1);
        assert_eq!(input.pending(), 0);

        let document = load_sidecar(&channel.join("vid1.json")).await.unwrap();
        assert_eq!(document.subtitles[0].translation, "HELLO");
        assert!(!channel.join("gone.json").exists());
    }
}
