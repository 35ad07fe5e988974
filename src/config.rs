use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration for the subtitle pipeline
///
/// Every section and field is optional in a config file; anything missing
/// keeps its default value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discovery and sidecar settings
    pub processing: ProcessingConfig,

    /// Speech-to-text backend settings
    pub transcription: TranscriptionConfig,

    /// Translation backend settings
    pub translation: TranslationConfig,

    /// Progress reporting settings
    pub progress: ProgressConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Recognized video file extensions (compared case-insensitively)
    pub supported_extensions: Vec<String>,

    /// How already-processed videos are detected
    pub dedup: DedupStrategy,

    /// Extension of the sidecar document
    pub sidecar_extension: String,

    /// Write documents under `<output_dir>/<channel>/` instead of next to the video
    pub output_dir: Option<PathBuf>,
}

/// Strategy used during discovery to skip videos that already have a document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Every video is processed
    None,
    /// A video is skipped whenever its sidecar exists
    PathExists,
    /// A video is skipped only if its sidecar carries the current fingerprint
    Fingerprint,
}

impl std::str::FromStr for DedupStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "path_exists" | "path" => Ok(Self::PathExists),
            "fingerprint" | "hash" => Ok(Self::Fingerprint),
            other => Err(anyhow!("Unknown dedup strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URLs of the transcription backends, in dispatch order
    pub backends: Vec<String>,

    /// Language hint sent with every request
    pub language: String,

    /// Number of concurrent transcription workers
    pub workers: usize,

    /// Timeout for a single transcription request (seconds)
    pub timeout_seconds: u64,

    /// Timeout for the startup health probe (seconds)
    pub health_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Translation query endpoint
    pub endpoint: String,

    /// Source language code
    pub source_language: String,

    /// Target language code
    pub target_language: String,

    /// Number of concurrent translation workers
    pub workers: usize,

    /// Segments translated concurrently per batch
    pub batch_size: usize,

    /// Pause between batches (milliseconds)
    pub batch_pause_ms: u64,

    /// Timeout for a single translation call (seconds)
    pub timeout_seconds: u64,

    /// Prefix for texts the service answered but did not translate
    pub fallback_tag: String,

    /// Prefix for texts whose translation call failed outright
    pub failure_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Interval between progress reports (seconds)
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is not set
    pub level: String,
}

impl TranslationConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// MyMemory style language pair, e.g. `en|zh`
    pub fn langpair(&self) -> String {
        format!("{}|{}", self.source_language, self.target_language)
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Config {
    /// Load the first config file found in the working directory, or the
    /// defaults with environment overrides if there is none.
    ///
    /// A config file that exists but cannot be parsed is an error.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(Path::new("."))
    }

    /// Same as [`Config::load`], searching relative to `dir`
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        match Self::locate(dir) {
            Some(path) => Self::from_file(&path),
            None => Self::from_env(),
        }
    }

    /// First existing config file under `dir`, in search order
    pub fn locate(dir: &Path) -> Option<PathBuf> {
        const CONFIG_PATHS: [&str; 2] = ["subtitle-pipeline.toml", "config/subtitle-pipeline.toml"];

        CONFIG_PATHS
            .iter()
            .map(|path| dir.join(path))
            .find(|path| path.is_file())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Default configuration with environment variable overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(backends) = std::env::var("SUBTITLE_PIPELINE_BACKENDS") {
            let backends: Vec<String> = backends
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !backends.is_empty() {
                config.transcription.backends = backends;
            }
        }

        if let Ok(workers) = std::env::var("SUBTITLE_PIPELINE_TRANSCRIBE_WORKERS") {
            config.transcription.workers = workers.parse().unwrap_or(config.transcription.workers);
        }

        if let Ok(workers) = std::env::var("SUBTITLE_PIPELINE_TRANSLATE_WORKERS") {
            config.translation.workers = workers.parse().unwrap_or(config.translation.workers);
        }

        if let Ok(endpoint) = std::env::var("SUBTITLE_PIPELINE_TRANSLATION_ENDPOINT") {
            config.translation.endpoint = endpoint;
        }

        if let Ok(log_level) = std::env::var("SUBTITLE_PIPELINE_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.transcription.workers == 0 {
            return Err(anyhow!("transcription.workers must be greater than 0"));
        }

        if self.translation.workers == 0 {
            return Err(anyhow!("translation.workers must be greater than 0"));
        }

        if self.translation.batch_size == 0 {
            return Err(anyhow!("translation.batch_size must be greater than 0"));
        }

        if self.transcription.timeout_seconds == 0 {
            return Err(anyhow!("transcription.timeout_seconds must be greater than 0"));
        }

        if self.transcription.health_timeout_seconds == 0 {
            return Err(anyhow!("transcription.health_timeout_seconds must be greater than 0"));
        }

        if self.translation.timeout_seconds == 0 {
            return Err(anyhow!("translation.timeout_seconds must be greater than 0"));
        }

        if self.processing.supported_extensions.is_empty() {
            return Err(anyhow!("processing.supported_extensions must not be empty"));
        }

        if self.transcription.backends.is_empty() {
            return Err(anyhow!("At least one transcription backend is required"));
        }

        for backend in &self.transcription.backends {
            Url::parse(backend).map_err(|e| anyhow!("Invalid backend address {}: {}", backend, e))?;
        }

        Url::parse(&self.translation.endpoint)
            .map_err(|e| anyhow!("Invalid translation endpoint {}: {}", self.translation.endpoint, e))?;

        if self.progress.interval_seconds == 0 {
            return Err(anyhow!("progress.interval_seconds must be greater than 0"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Subtitle Pipeline Configuration:\n\
            - Backends: {}\n\
            - Transcription Workers: {}\n\
            - Translation Workers: {}\n\
            - Translation: {} ({})\n\
            - Batch Size: {} (pause {}ms)\n\
            - Dedup: {:?}\n\
            - Supported Extensions: {}",
            self.transcription.backends.join(", "),
            self.transcription.workers,
            self.translation.workers,
            self.translation.endpoint,
            self.translation.langpair(),
            self.translation.batch_size,
            self.translation.batch_pause_ms,
            self.processing.dedup,
            self.processing.supported_extensions.join(", "),
        )
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_extensions: vec![
                "mp4".to_string(),
                "avi".to_string(),
                "mov".to_string(),
                "mkv".to_string(),
                "webm".to_string(),
            ],
            dedup: DedupStrategy::Fingerprint,
            sidecar_extension: "json".to_string(),
            output_dir: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backends: vec!["http://localhost:5000".to_string()],
            language: "en".to_string(),
            workers: 2,
            timeout_seconds: 3600, // 60 minutes for large files
            health_timeout_seconds: 10,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mymemory.translated.net/get".to_string(),
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            workers: 4,
            batch_size: 5,
            batch_pause_ms: 200,
            timeout_seconds: 30,
            fallback_tag: "[中文]".to_string(),
            failure_tag: "[翻译失败]".to_string(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { interval_seconds: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_backends(mut self, backends: Vec<String>) -> Self {
        self.config.transcription.backends = backends;
        self
    }

    pub fn with_transcribe_workers(mut self, workers: usize) -> Self {
        self.config.transcription.workers = workers;
        self
    }

    pub fn with_translate_workers(mut self, workers: usize) -> Self {
        self.config.translation.workers = workers;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupStrategy) -> Self {
        self.config.processing.dedup = dedup;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.processing.output_dir = Some(dir);
        self
    }

    pub fn with_translation_endpoint(mut self, endpoint: String) -> Self {
        self.config.translation.endpoint = endpoint;
        self
    }

    pub fn with_batch_pause_ms(mut self, pause_ms: u64) -> Self {
        self.config.translation.batch_pause_ms = pause_ms;
        self
    }

    pub fn with_progress_interval(mut self, seconds: u64) -> Self {
        self.config.progress.interval_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.translation.batch_size, 5);
        assert_eq!(config.translation.langpair(), "en|zh");
        assert_eq!(config.processing.dedup, DedupStrategy::Fingerprint);
        assert_eq!(config.processing.supported_extensions.len(), 5);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_backends(vec!["http://a:5000".to_string(), "http://b:5000".to_string()])
            .with_transcribe_workers(3)
            .with_translate_workers(6)
            .with_dedup(DedupStrategy::PathExists)
            .build();

        assert_eq!(config.transcription.backends.len(), 2);
        assert_eq!(config.transcription.workers, 3);
        assert_eq!(config.translation.workers, 6);
        assert_eq!(config.processing.dedup, DedupStrategy::PathExists);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let config = ConfigBuilder::new().with_transcribe_workers(0).build();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new()
            .with_backends(vec!["not a url".to_string()])
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dedup_strategy_parsing() {
        assert_eq!("none".parse::<DedupStrategy>().unwrap(), DedupStrategy::None);
        assert_eq!("path-exists".parse::<DedupStrategy>().unwrap(), DedupStrategy::PathExists);
        assert_eq!("Fingerprint".parse::<DedupStrategy>().unwrap(), DedupStrategy::Fingerprint);
        assert!("sometimes".parse::<DedupStrategy>().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("subtitle-pipeline.toml");

        let config = ConfigBuilder::new()
            .with_translate_workers(7)
            .with_output_dir(PathBuf::from("/tmp/subs"))
            .build();
        config.save(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.translation.workers, 7);
        assert_eq!(reloaded.processing.output_dir, Some(PathBuf::from("/tmp/subs")));
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let mut config = Config::default();
        config.translation.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transcription.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transcription.health_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("subtitle-pipeline.toml"),
            "[transcription]\nbackends = [\"http://gpu1:5000\"]\n\n[translation]\nfailure_tag = \"[FAILED]\"\n",
        )
        .unwrap();

        let config = Config::load_from_dir(temp_dir.path()).unwrap();
        assert_eq!(config.transcription.backends, vec!["http://gpu1:5000".to_string()]);
        assert_eq!(config.transcription.language, "en");
        assert_eq!(config.transcription.workers, 2);
        assert_eq!(config.translation.failure_tag, "[FAILED]");
        assert_eq!(config.translation.fallback_tag, "[中文]");
        assert_eq!(config.processing.dedup, DedupStrategy::Fingerprint);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("config")).unwrap();
        std::fs::write(
            temp_dir.path().join("config").join("subtitle-pipeline.toml"),
            "[transcription]\nworkers = \"many\"\n",
        )
        .unwrap();

        assert_eq!(
            Config::locate(temp_dir.path()),
            Some(temp_dir.path().join("config").join("subtitle-pipeline.toml"))
        );
        assert!(Config::load_from_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_locate_without_file() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(Config::locate(temp_dir.path()), None);
    }
}
