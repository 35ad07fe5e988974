use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Counters shared by every stage worker and the coordinator.
///
/// All updates are single atomic increments, so concurrent workers never lose
/// an update. Reads use `SeqCst` to keep the coordinator's view consistent with
/// the queue counters it samples right after.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    total: AtomicUsize,
    transcribed: AtomicUsize,
    translated: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of videos handed to the transcription stage
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn record_transcribed(&self) {
        self.transcribed.fetch_add(1, Ordering::SeqCst);
    }

    /// A document was persisted: counts as both translated and processed
    pub fn record_processed(&self) {
        self.translated.fetch_add(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn transcribed(&self) -> usize {
        self.transcribed.load(Ordering::SeqCst)
    }

    pub fn translated(&self) -> usize {
        self.translated.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total: self.total(),
            transcribed: self.transcribed(),
            translated: self.translated(),
            processed: self.processed(),
            failed: self.failed(),
            skipped: self.skipped(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub total: usize,
    pub transcribed: usize,
    pub translated: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Depth and in-flight work of one stage queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Items waiting to be picked up
    pub queued: usize,
    /// Items queued plus items leased by a worker and not yet acknowledged
    pub pending: usize,
}

impl QueueSnapshot {
    pub fn in_flight(&self) -> usize {
        self.pending.saturating_sub(self.queued)
    }

    pub fn is_drained(&self) -> bool {
        self.pending == 0
    }
}

/// Everything the coordinator looks at on one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub counters: CounterSnapshot,
    pub transcription_queue: QueueSnapshot,
    pub translation_queue: QueueSnapshot,
}

impl ProgressSnapshot {
    /// Every discovered video has been accounted for and no stage holds work.
    ///
    /// Transcribed + failed can reach the total while a transcription is still
    /// running (a persistence failure also counts as failed), so both queues
    /// must be drained including leased items.
    pub fn is_complete(&self) -> bool {
        let counters = &self.counters;
        counters.transcribed + counters.failed >= counters.total
            && self.transcription_queue.is_drained()
            && self.translation_queue.queued == 0
            && self.translation_queue.is_drained()
    }

    pub fn log(&self) {
        let c = &self.counters;
        info!("📊 Progress report:");
        info!(
            "   Transcription: {}/{} done, {} queued, {} running",
            c.transcribed,
            c.total,
            self.transcription_queue.queued,
            self.transcription_queue.in_flight()
        );
        info!(
            "   Translation: {}/{} done, {} queued, {} running",
            c.translated,
            c.total,
            self.translation_queue.queued,
            self.translation_queue.in_flight()
        );
        info!("   Overall: {} succeeded, {} failed, {} skipped", c.processed, c.failed, c.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(total: usize, transcribed: usize, failed: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            counters: CounterSnapshot {
                total,
                transcribed,
                failed,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_when_all_accounted_and_drained() {
        assert!(snapshot(3, 2, 1).is_complete());
        assert!(snapshot(0, 0, 0).is_complete());
    }

    #[test]
    fn test_not_complete_with_queued_translation() {
        let mut progress = snapshot(3, 2, 1);
        progress.translation_queue = QueueSnapshot { queued: 1, pending: 1 };
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_not_complete_with_translation_in_flight() {
        let mut progress = snapshot(3, 2, 1);
        progress.translation_queue = QueueSnapshot { queued: 0, pending: 1 };
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_not_complete_while_transcription_running() {
        // One persistence failure inflates `failed` while the last video is still transcribing
        let mut progress = snapshot(3, 2, 1);
        progress.transcription_queue = QueueSnapshot { queued: 0, pending: 1 };
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_not_complete_before_all_transcribed() {
        assert!(!snapshot(3, 1, 1).is_complete());
    }

    #[test]
    fn test_queue_snapshot_in_flight() {
        let queue = QueueSnapshot { queued: 2, pending: 5 };
        assert_eq!(queue.in_flight(), 3);
        assert!(!queue.is_drained());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(PipelineCounters::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counters = Arc::clone(&counters);
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    counters.record_transcribed();
                    counters.record_failed();
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.transcribed, 2000);
        assert_eq!(snapshot.failed, 2000);
    }
}
