//! Subtitle Pipeline
//!
//! Scans a directory of channel folders for videos, transcribes them across a
//! pool of Whisper backends, translates the segments and writes a bilingual
//! JSON subtitle document next to each video.

pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod subtitle;
pub mod transcription;
pub mod translation;
pub mod video;

// Re-export main types for easy access
pub use crate::backend::{Backend, BackendPool};
pub use crate::config::{Config, ConfigBuilder, DedupStrategy};
pub use crate::document::{SidecarLayout, SidecarWriter, SubtitleDocument};
pub use crate::error::{PersistenceError, PipelineError, TranscriptionError, TranslationError};
pub use crate::fingerprint::{ContentFingerprint, FingerprintStore};
pub use crate::pipeline::{Pipeline, PipelineCounters, ProgressReporter, RunSummary};
pub use crate::subtitle::{BilingualSegment, SubtitleSegment};
pub use crate::transcription::{Transcriber, WhisperClient};
pub use crate::translation::{MyMemoryTranslator, Translator};
pub use crate::video::{DiscoveryReport, VideoFile, VideoScanner};
