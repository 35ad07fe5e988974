use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::Transcriber;
use crate::backend::Backend;
use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, TranscriptionError};
use crate::subtitle::SubtitleSegment;
use crate::video::VideoFile;

/// Body of `POST /transcribe`
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    success: bool,
    result: Option<TranscribeResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscribeResult {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// HTTP client for Whisper transcription services.
///
/// Uploads the whole video as a multipart `audio` part together with a
/// `language` field and reads back timed segments.
#[derive(Debug, Clone)]
pub struct WhisperClient {
    client: reqwest::Client,
    language: String,
}

impl WhisperClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self::with_client(client, config.language.clone()))
    }

    pub fn with_client(client: reqwest::Client, language: impl Into<String>) -> Self {
        Self {
            client,
            language: language.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(
        &self,
        backend: &Backend,
        video: &VideoFile,
    ) -> Result<Vec<SubtitleSegment>, TranscriptionError> {
        let data = tokio::fs::read(&video.path)
            .await
            .map_err(|source| TranscriptionError::Io {
                path: video.path.clone(),
                source,
            })?;

        debug!(
            "Uploading {} ({:.1} MB) to {}",
            video.file_name,
            video.size_mb(),
            backend.address
        );

        let audio = Part::bytes(data)
            .file_name(video.file_name.clone())
            .mime_str(content_type_for(&video.extension()))?;
        let form = Form::new()
            .part("audio", audio)
            .text("language", self.language.clone());

        let response = self
            .client
            .post(backend.url("transcribe"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

/// Validate a transcription response and extract its segments
fn parse_response(body: &str) -> Result<Vec<SubtitleSegment>, TranscriptionError> {
    let response: TranscribeResponse =
        serde_json::from_str(body).map_err(|e| TranscriptionError::Malformed(e.to_string()))?;

    if !response.success {
        if let Some(error) = &response.error {
            debug!("Backend error message: {}", error);
        }
        return Err(TranscriptionError::Rejected);
    }

    let result = response
        .result
        .ok_or_else(|| TranscriptionError::Malformed("missing result".to_string()))?;

    if result.segments.is_empty() {
        return Err(TranscriptionError::NoSegments);
    }

    if let Some(language) = &result.language {
        debug!("Detected language: {}", language);
    }

    result
        .segments
        .into_iter()
        .map(|s| {
            let segment = SubtitleSegment::new(s.start, s.end, s.text.trim());
            if segment.is_well_formed() {
                Ok(segment)
            } else {
                Err(TranscriptionError::Malformed(format!(
                    "segment times {}..{}",
                    s.start, s.end
                )))
            }
        })
        .collect()
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn video_in(dir: &TempDir) -> VideoFile {
        let channel = dir.path().join("chan");
        std::fs::create_dir_all(&channel).unwrap();
        let path = channel.join("talk.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        VideoFile::new(path, "chan".to_string(), 18)
    }

    #[test]
    fn test_parse_successful_response() {
        let body = json!({
            "success": true,
            "result": {
                "text": "Hello world",
                "language": "en",
                "segments": [
                    {"start": 0.0, "end": 1.5, "text": " Hello"},
                    {"start": 1.5, "end": 3.0, "text": " world"}
                ]
            }
        })
        .to_string();

        let segments = parse_response(&body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], SubtitleSegment::new(0.0, 1.5, "Hello"));
        assert_eq!(segments[1].end, 3.0);
    }

    #[test]
    fn test_parse_rejects_bad_responses() {
        let unsuccessful = json!({"success": false, "error": "model crashed"}).to_string();
        assert!(matches!(parse_response(&unsuccessful), Err(TranscriptionError::Rejected)));

        let no_result = json!({"success": true}).to_string();
        assert!(matches!(parse_response(&no_result), Err(TranscriptionError::Malformed(_))));

        let empty = json!({"success": true, "result": {"text": "", "segments": []}}).to_string();
        assert!(matches!(parse_response(&empty), Err(TranscriptionError::NoSegments)));

        let backwards = json!({"success": true, "result": {"segments": [{"start": 5.0, "end": 1.0, "text": "x"}]}})
            .to_string();
        assert!(matches!(parse_response(&backwards), Err(TranscriptionError::Malformed(_))));

        assert!(matches!(parse_response("<html>"), Err(TranscriptionError::Malformed(_))));
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for("mp4"), "video/mp4");
        assert_eq!(content_type_for("mkv"), "video/x-matroska");
        assert_eq!(content_type_for("xyz"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_transcribe_uploads_multipart() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/transcribe")
                    .body_contains("name=\"audio\"")
                    .body_contains("filename=\"talk.mp4\"")
                    .body_contains("name=\"language\"");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": {"text": "hi", "language": "en", "segments": [{"start": 0.0, "end": 1.0, "text": "hi"}]}
                }));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let client = WhisperClient::with_client(reqwest::Client::new(), "en");
        let backend = Backend::new(server.base_url());

        let segments = client.transcribe(&backend, &video).await.unwrap();
        mock.assert_async().await;
        assert_eq!(segments, vec![SubtitleSegment::new(0.0, 1.0, "hi")]);
    }

    #[tokio::test]
    async fn test_transcribe_reports_http_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/transcribe");
                then.status(503);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let client = WhisperClient::with_client(reqwest::Client::new(), "en");

        let result = client.transcribe(&Backend::new(server.base_url()), &video).await;
        assert!(matches!(result, Err(TranscriptionError::Status(503))));
    }

    #[tokio::test]
    async fn test_transcribe_missing_file() {
        let dir = TempDir::new().unwrap();
        let video = VideoFile::new(dir.path().join("chan").join("gone.mp4"), "chan".to_string(), 0);
        let client = WhisperClient::with_client(reqwest::Client::new(), "en");

        let result = client.transcribe(&Backend::new("http://127.0.0.1:1"), &video).await;
        assert!(matches!(result, Err(TranscriptionError::Io { .. })));
    }
}
