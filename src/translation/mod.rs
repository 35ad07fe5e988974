pub mod batch;
pub mod mymemory;
pub mod stage;

use async_trait::async_trait;

use crate::error::TranslationError;
use crate::subtitle::SubtitleSegment;
use crate::video::VideoFile;

pub use batch::BatchTranslator;
pub use mymemory::MyMemoryTranslator;
pub use stage::TranslationStage;

/// Translates one short piece of text
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

/// A transcribed video waiting for translation
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub video: VideoFile,
    pub segments: Vec<SubtitleSegment>,
}
