use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{DedupStrategy, ProcessingConfig};
use crate::document::{load_sidecar, SidecarLayout};
use crate::error::{PipelineError, Result};
use crate::fingerprint::{ContentFingerprint, FingerprintStore};
use crate::pipeline::PipelineCounters;

/// A discovered video waiting to be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    /// Full path to the video
    pub path: PathBuf,
    /// Name of the channel directory the video lives in
    pub channel: String,
    /// File name without extension
    pub name: String,
    /// File name with extension
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// Fingerprint taken during discovery, if it could be computed
    pub fingerprint: Option<ContentFingerprint>,
}

impl VideoFile {
    pub fn new(path: PathBuf, channel: String, size: u64) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path,
            channel,
            name,
            file_name,
            size,
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: ContentFingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Lowercased file extension
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Videos that need processing, sorted by path
    pub videos: Vec<VideoFile>,
    /// Videos skipped because an up-to-date document exists
    pub skipped: usize,
}

impl DiscoveryReport {
    pub fn total_bytes(&self) -> u64 {
        self.videos.iter().map(|v| v.size).sum()
    }
}

/// Finds videos under `<root>/<channel>/` that still need a subtitle document
#[derive(Debug, Clone)]
pub struct VideoScanner {
    supported_extensions: Vec<String>,
    dedup: DedupStrategy,
    layout: SidecarLayout,
    sidecar_extension: String,
    fingerprints: FingerprintStore,
}

impl VideoScanner {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            supported_extensions: config
                .supported_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            dedup: config.dedup,
            layout: SidecarLayout::from_output_dir(config.output_dir.clone()),
            sidecar_extension: config.sidecar_extension.clone(),
            fingerprints: FingerprintStore::new(),
        }
    }

    /// Share a fingerprint cache across scans
    pub fn with_fingerprint_store(mut self, store: FingerprintStore) -> Self {
        self.fingerprints = store;
        self
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.supported_extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// Discover videos that need processing and count the ones skipped
    pub async fn discover(&self, root: &Path, counters: &PipelineCounters) -> Result<DiscoveryReport> {
        let is_dir = tokio::fs::metadata(root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Video directory not found: {}", root.display()),
            )));
        }

        let candidates = self.scan_candidates(root).await?;
        let mut report = DiscoveryReport::default();

        for (path, channel, size) in candidates {
            let video = VideoFile::new(path, channel, size);

            match self.check(video).await {
                Some(video) => report.videos.push(video),
                None => {
                    report.skipped += 1;
                    counters.record_skipped();
                }
            }
        }

        info!(
            "📹 Discovery found {} video(s) to process, {} skipped",
            report.videos.len(),
            report.skipped
        );
        Ok(report)
    }

    /// Walk exactly one level of channel directories
    async fn scan_candidates(&self, root: &Path) -> Result<Vec<(PathBuf, String, u64)>> {
        let root = root.to_path_buf();
        let scanner = self.clone();

        let candidates = tokio::task::spawn_blocking(move || {
            let mut candidates = Vec::new();

            let walker = WalkDir::new(&root)
                .min_depth(2)
                .max_depth(2)
                .follow_links(true)
                .sort_by_file_name();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                        continue;
                    }
                };

                if !entry.file_type().is_file() || !scanner.is_supported(entry.path()) {
                    continue;
                }

                let channel = entry
                    .path()
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

                candidates.push((entry.into_path(), channel, size));
            }

            candidates
        })
        .await
        .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;

        Ok(candidates)
    }

    /// Returns the video if it needs processing, `None` if it can be skipped
    async fn check(&self, video: VideoFile) -> Option<VideoFile> {
        let sidecar = self.layout.path_for(&video, &self.sidecar_extension);
        let sidecar_exists = self.dedup != DedupStrategy::None
            && tokio::fs::try_exists(&sidecar).await.unwrap_or(false);

        if self.dedup == DedupStrategy::PathExists && sidecar_exists {
            info!("⏭️  Skipping already processed: {}", video.file_name);
            return None;
        }

        let fingerprint = match self.fingerprints.get_or_compute(&video.path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                // Reprocessing is safer than silently dropping the video
                warn!("Cannot fingerprint {}: {}; queuing it anyway", video.path.display(), e);
                return Some(video);
            }
        };

        if self.dedup == DedupStrategy::Fingerprint && sidecar_exists {
            match load_sidecar(&sidecar).await {
                Ok(document) if document.video_info.video_hash == fingerprint.digest => {
                    info!("⏭️  Skipping up-to-date: {}", video.file_name);
                    return None;
                }
                Ok(_) => debug!("🔄 Fingerprint changed for {}", video.file_name),
                Err(e) => debug!("Unreadable sidecar {}: {}", sidecar.display(), e),
            }
        }

        Some(video.with_fingerprint(fingerprint))
    }
}
