pub mod stage;
pub mod whisper;

use async_trait::async_trait;

use crate::backend::Backend;
use crate::error::TranscriptionError;
use crate::subtitle::SubtitleSegment;
use crate::video::VideoFile;

pub use stage::TranscriptionStage;
pub use whisper::WhisperClient;

/// Turns a video into timed source-language segments using one backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        backend: &Backend,
        video: &VideoFile,
    ) -> Result<Vec<SubtitleSegment>, TranscriptionError>;
}
