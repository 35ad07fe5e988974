use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::Translator;
use crate::config::TranslationConfig;
use crate::error::TranslationError;
use crate::subtitle::{BilingualSegment, SubtitleSegment};

/// Translates a video's segments in small concurrent batches.
///
/// A failed call never fails the video: the segment gets a tagged copy of
/// its source text instead. Output order always matches input order.
#[derive(Clone)]
pub struct BatchTranslator {
    translator: Arc<dyn Translator>,
    batch_size: usize,
    pause: Duration,
    call_timeout: Duration,
    fallback_tag: String,
    failure_tag: String,
}

impl BatchTranslator {
    pub fn new(translator: Arc<dyn Translator>, config: &TranslationConfig) -> Self {
        Self {
            translator,
            batch_size: config.batch_size.max(1),
            pause: config.batch_pause(),
            call_timeout: config.call_timeout(),
            fallback_tag: config.fallback_tag.clone(),
            failure_tag: config.failure_tag.clone(),
        }
    }

    pub async fn translate_segments(&self, segments: &[SubtitleSegment]) -> Vec<BilingualSegment> {
        let batches = segments.len().div_ceil(self.batch_size);
        let mut bilingual = Vec::with_capacity(segments.len());

        for (index, batch) in segments.chunks(self.batch_size).enumerate() {
            debug!("Translating batch {}/{} ({} segments)", index + 1, batches, batch.len());

            let translations = join_all(batch.iter().map(|segment| self.translate_one(&segment.text))).await;
            bilingual.extend(
                batch
                    .iter()
                    .zip(translations)
                    .map(|(segment, translation)| BilingualSegment::new(segment.clone(), translation)),
            );

            // Rate limit between batches, not after the last one
            if index + 1 < batches && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        bilingual
    }

    async fn translate_one(&self, text: &str) -> String {
        let result = match tokio::time::timeout(self.call_timeout, self.translator.translate(text)).await {
            Ok(result) => result,
            Err(_) => Err(TranslationError::Timeout(self.call_timeout.as_secs())),
        };

        result.unwrap_or_else(|e| self.fallback_for(text, &e))
    }

    /// Substitute text for a segment whose translation failed
    pub fn fallback_for(&self, text: &str, error: &TranslationError) -> String {
        if error.is_transport_failure() {
            warn!("Translation failed for {:?}: {}", text, error);
            format!("{} {}", self.failure_tag, text)
        } else {
            debug!("Translation unusable for {:?}: {}", text, error);
            format!("{} {}", self.fallback_tag, text)
        }
    }
}
