use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::Translator;
use crate::config::TranslationConfig;
use crate::error::{PipelineError, TranslationError};

const QUOTA_WARNING: &str = "MYMEMORY WARNING";

/// Client for the MyMemory `get` endpoint
#[derive(Debug, Clone)]
pub struct MyMemoryTranslator {
    client: reqwest::Client,
    endpoint: String,
    langpair: String,
}

impl MyMemoryTranslator {
    pub fn new(config: &TranslationConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self::with_client(client, config.endpoint.clone(), config.langpair()))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>, langpair: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            langpair: langpair.into(),
        }
    }
}

#[async_trait]
impl Translator for MyMemoryTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", self.langpair.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<String, TranslationError> {
    let data: Value = serde_json::from_str(body).map_err(|e| TranslationError::Malformed(e.to_string()))?;

    // The service sometimes sends the status as a string
    let status = match &data["responseStatus"] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| TranslationError::Malformed("missing responseStatus".to_string()))?;

    if status != 200 {
        debug!("MyMemory responseStatus {}: {}", status, data["responseDetails"]);
        return Err(TranslationError::Rejected(status));
    }

    let translated = data["responseData"]["translatedText"]
        .as_str()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| TranslationError::Malformed("missing translatedText".to_string()))?;

    if translated.contains(QUOTA_WARNING) {
        return Err(TranslationError::Warning);
    }

    Ok(translated.to_string())
}
