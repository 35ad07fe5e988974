//! Sidecar subtitle documents and the writer that persists them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::fingerprint::ContentFingerprint;
use crate::subtitle::{total_duration, BilingualSegment};
use crate::video::VideoFile;

/// Video metadata stored at the top of every sidecar document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfoRecord {
    pub filename: String,
    pub channel: String,
    /// ISO-8601 local timestamp
    pub processed_at: String,
    /// Largest segment end time in seconds
    pub duration: f64,
    #[serde(default)]
    pub video_hash: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_mtime: f64,
}

/// The persisted artifact for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleDocument {
    pub video_info: VideoInfoRecord,
    pub subtitles: Vec<BilingualSegment>,
}

impl SubtitleDocument {
    pub fn new(
        video: &VideoFile,
        fingerprint: &ContentFingerprint,
        subtitles: Vec<BilingualSegment>,
    ) -> Self {
        Self {
            video_info: VideoInfoRecord {
                filename: video.file_name.clone(),
                channel: video.channel.clone(),
                processed_at: chrono::Local::now().to_rfc3339(),
                duration: total_duration(&subtitles),
                video_hash: fingerprint.digest.clone(),
                file_size: fingerprint.file_size,
                file_mtime: fingerprint.file_mtime,
            },
            subtitles,
        }
    }

    /// Number of segments whose translation starts with `tag`
    pub fn count_tagged(&self, tag: &str) -> usize {
        self.subtitles
            .iter()
            .filter(|s| s.translation.starts_with(tag))
            .count()
    }
}

/// Where sidecar documents live relative to their videos
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarLayout {
    /// `<video_dir>/<stem>.<ext>`
    BesideVideo,
    /// `<root>/<channel>/<sanitized stem>.<ext>`
    Mirrored { root: PathBuf },
}

impl SidecarLayout {
    pub fn from_output_dir(output_dir: Option<PathBuf>) -> Self {
        match output_dir {
            Some(root) => Self::Mirrored { root },
            None => Self::BesideVideo,
        }
    }

    /// Deterministic document path for a video
    pub fn path_for(&self, video: &VideoFile, extension: &str) -> PathBuf {
        match self {
            Self::BesideVideo => video.path.with_file_name(format!("{}.{}", video.name, extension)),
            Self::Mirrored { root } => root
                .join(&video.channel)
                .join(format!("{}.{}", sanitize_filename(&video.name), extension)),
        }
    }
}

/// Replace characters that are unsafe in file names and cap the length at 100 chars
pub fn sanitize_filename(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| {
        Regex::new(r#"[<>:"/\\|?*：｜？]"#).expect("static regex is valid")
    });

    unsafe_chars
        .replace_all(name, "_")
        .chars()
        .take(100)
        .collect()
}

/// Read a sidecar document from disk
pub async fn load_sidecar(path: &Path) -> Result<SubtitleDocument, PersistenceError> {
    let content = tokio::fs::read(path).await.map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Serializes documents and replaces the sidecar in one rename
#[derive(Debug, Clone)]
pub struct SidecarWriter {
    layout: SidecarLayout,
    extension: String,
}

impl SidecarWriter {
    pub fn new(layout: SidecarLayout, extension: impl Into<String>) -> Self {
        Self {
            layout,
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, video: &VideoFile) -> PathBuf {
        self.layout.path_for(video, &self.extension)
    }

    /// Build and persist the document for a video, overwriting any existing one
    pub async fn write(
        &self,
        video: &VideoFile,
        subtitles: Vec<BilingualSegment>,
    ) -> Result<PathBuf, PersistenceError> {
        let fingerprint = match &video.fingerprint {
            Some(fingerprint) => fingerprint.clone(),
            None => ContentFingerprint::compute(&video.path)
                .await
                .map_err(|source| PersistenceError::Fingerprint {
                    path: video.path.clone(),
                    source,
                })?,
        };

        let document = SubtitleDocument::new(video, &fingerprint, subtitles);
        let path = self.path_for(video);
        self.write_document(&document, &path).await?;

        info!(
            "💾 Subtitle document saved: {} ({} segments)",
            path.display(),
            document.subtitles.len()
        );
        Ok(path)
    }

    /// Persist an already built document
    pub async fn write_document(
        &self,
        document: &SubtitleDocument,
        path: &Path,
    ) -> Result<(), PersistenceError> {
        // Serialize fully before touching the filesystem
        let json = serde_json::to_vec_pretty(document)?;
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomically(&target, &json))
            .await
            .map_err(|e| PersistenceError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| PersistenceError::NoParent(path.to_path_buf()))?;
    let io_err = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(contents).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Replaced {}", path.display());
    Ok(())
}
