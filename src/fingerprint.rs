use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::RwLock;
use tracing::debug;

/// Size of each sampled block
pub const SAMPLE_BLOCK_SIZE: u64 = 64 * 1024;

/// Dedup key for a video file.
///
/// Derived from up to three sampled blocks of the file plus its exact size and
/// modification time, so touching a file invalidates its fingerprint even when
/// the sampled bytes are unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFingerprint {
    /// Hex encoded MD5 digest
    pub digest: String,

    /// File size in bytes
    pub file_size: u64,

    /// Modification time, seconds since the Unix epoch
    pub file_mtime: f64,
}

impl ContentFingerprint {
    /// Compute the fingerprint of a file on disk
    pub async fn compute(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path).await?;
        let file_size = metadata.len();
        let file_mtime = mtime_seconds(&metadata)?;

        let mut file = fs::File::open(path).await?;
        let mut samples = Vec::with_capacity((SAMPLE_BLOCK_SIZE * 3) as usize);

        for (offset, len) in sample_ranges(file_size) {
            let start = samples.len();
            samples.resize(start + len as usize, 0);
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut samples[start..]).await?;
        }

        Ok(Self::from_parts(&samples, file_size, file_mtime))
    }

    /// Fingerprint from already sampled bytes
    pub fn from_parts(samples: &[u8], file_size: u64, file_mtime: f64) -> Self {
        let mut context = md5::Context::new();
        context.consume(samples);
        context.consume(file_size.to_le_bytes());
        context.consume(file_mtime.to_bits().to_le_bytes());

        Self {
            digest: format!("{:x}", context.compute()),
            file_size,
            file_mtime,
        }
    }
}

/// Byte ranges `(offset, len)` sampled from a file of `size` bytes
pub fn sample_ranges(size: u64) -> Vec<(u64, u64)> {
    let mut ranges = vec![(0, size.min(SAMPLE_BLOCK_SIZE))];

    if size > SAMPLE_BLOCK_SIZE * 2 {
        ranges.push((size / 2 - SAMPLE_BLOCK_SIZE / 2, SAMPLE_BLOCK_SIZE));
    }

    if size > SAMPLE_BLOCK_SIZE {
        let len = SAMPLE_BLOCK_SIZE.min(size - SAMPLE_BLOCK_SIZE);
        ranges.push((size - len, len));
    }

    ranges
}

fn mtime_seconds(metadata: &std::fs::Metadata) -> std::io::Result<f64> {
    let modified = metadata.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_secs_f64())
}

#[derive(Debug, Clone)]
struct CachedFingerprint {
    file_size: u64,
    file_mtime: f64,
    fingerprint: ContentFingerprint,
}

/// Per-path fingerprint cache, invalidated by size or mtime changes
#[derive(Debug, Clone, Default)]
pub struct FingerprintStore {
    cache: Arc<RwLock<HashMap<PathBuf, CachedFingerprint>>>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached fingerprint if the file is unchanged, otherwise recompute
    pub async fn get_or_compute(&self, path: &Path) -> std::io::Result<ContentFingerprint> {
        let metadata = fs::metadata(path).await?;
        let file_size = metadata.len();
        let file_mtime = mtime_seconds(&metadata)?;

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(path) {
                if cached.file_size == file_size && cached.file_mtime == file_mtime {
                    debug!("📋 Using cached fingerprint for: {}", path.display());
                    return Ok(cached.fingerprint.clone());
                }
                debug!("🔄 File changed, recomputing fingerprint: {}", path.display());
            }
        }

        let fingerprint = ContentFingerprint::compute(path).await?;
        self.cache.write().await.insert(
            path.to_path_buf(),
            CachedFingerprint {
                file_size: fingerprint.file_size,
                file_mtime: fingerprint.file_mtime,
                fingerprint: fingerprint.clone(),
            },
        );

        Ok(fingerprint)
    }

    /// Drop the cached entry for a path
    pub async fn invalidate(&self, path: &Path) {
        self.cache.write().await.remove(path);
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}
