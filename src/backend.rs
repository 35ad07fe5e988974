use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// A transcription service endpoint that passed the startup health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Base URL, without trailing slash
    pub address: String,
    /// Version reported by the health endpoint
    pub version: Option<String>,
}

impl Backend {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            version: None,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.address, path.trim_start_matches('/'))
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// Fixed set of healthy backends with round-robin dispatch.
///
/// Membership is decided once by [`BackendPool::probe`]; backends are never
/// re-probed or ejected during a run.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Backend>,
    cursor: AtomicUsize,
}

impl BackendPool {
    /// Build a pool from already known backends
    pub fn from_backends(backends: Vec<Backend>) -> Result<Self> {
        if backends.is_empty() {
            return Err(PipelineError::NoHealthyBackend { probed: 0 });
        }

        Ok(Self {
            backends,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Probe every address in parallel and keep the ones with a loaded model, in the given order
    pub async fn probe(addresses: &[String], client: &reqwest::Client, timeout: Duration) -> Result<Self> {
        info!("🔍 Probing {} transcription backend(s)...", addresses.len());

        let probes = addresses.iter().map(|address| {
            let backend = Backend::new(address.as_str());
            async move {
                let health = check_health(client, &backend, timeout).await;
                (backend, health)
            }
        });

        let mut healthy = Vec::new();
        for (mut backend, health) in join_all(probes).await {
            match health {
                Ok(status) if status.model_loaded => {
                    info!(
                        "✅ Backend {} ready (status: {}, version: {})",
                        backend.address,
                        status.status,
                        status.version.as_deref().unwrap_or("unknown")
                    );
                    backend.version = status.version;
                    healthy.push(backend);
                }
                Ok(status) => {
                    warn!("⚠️ Backend {} has no model loaded (status: {})", backend.address, status.status);
                }
                Err(e) => {
                    warn!("❌ Backend {} unavailable: {}", backend.address, e);
                }
            }
        }

        if healthy.is_empty() {
            return Err(PipelineError::NoHealthyBackend {
                probed: addresses.len(),
            });
        }

        info!("🔧 Backend pool ready with {}/{} backend(s)", healthy.len(), addresses.len());
        Self::from_backends(healthy)
    }

    /// Next backend in cyclic order, shared by all callers
    pub fn next(&self) -> &Backend {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.backends.len();
        &self.backends[index]
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn addresses(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.address.clone()).collect()
    }
}

/// Query a backend's health endpoint
pub async fn check_health(
    client: &reqwest::Client,
    backend: &Backend,
    timeout: Duration,
) -> std::result::Result<HealthStatus, reqwest::Error> {
    client
        .get(backend.url("health"))
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json::<HealthStatus>()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn pool_of(addresses: &[&str]) -> BackendPool {
        BackendPool::from_backends(addresses.iter().map(|a| Backend::new(*a)).collect()).unwrap()
    }

    #[test]
    fn test_round_robin_is_cyclic() {
        let pool = pool_of(&["http://a", "http://b", "http://c"]);
        let picks: Vec<_> = (0..7).map(|_| pool.next().address.clone()).collect();
        assert_eq!(
            picks,
            vec!["http://a", "http://b", "http://c", "http://a", "http://b", "http://c", "http://a"]
        );
    }

    #[tokio::test]
    async fn test_round_robin_is_fair_under_concurrency() {
        let pool = Arc::new(pool_of(&["http://a", "http://b", "http://c"]));
        let mut handles = Vec::new();

        for _ in 0..10 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let mut picks = Vec::new();
                for _ in 0..10 {
                    picks.push(pool.next().address.clone());
                    tokio::task::yield_now().await;
                }
                picks
            }));
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for address in handle.await.unwrap() {
                *counts.entry(address).or_default() += 1;
            }
        }

        // 100 picks over 3 backends: each gets 33 or 34
        assert_eq!(counts.values().sum::<usize>(), 100);
        assert!(counts.values().all(|&n| n == 33 || n == 34), "{:?}", counts);
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(matches!(
            BackendPool::from_backends(Vec::new()),
            Err(PipelineError::NoHealthyBackend { probed: 0 })
        ));
    }

    #[test]
    fn test_backend_url_joining() {
        let backend = Backend::new("http://localhost:5000/");
        assert_eq!(backend.address, "http://localhost:5000");
        assert_eq!(backend.url("/transcribe"), "http://localhost:5000/transcribe");
    }

    #[tokio::test]
    async fn test_probe_keeps_only_ready_backends_in_order() {
        let ready_a = MockServer::start_async().await;
        let not_loaded = MockServer::start_async().await;
        let ready_b = MockServer::start_async().await;

        for (server, loaded, version) in [(&ready_a, true, "a"), (&not_loaded, false, "x"), (&ready_b, true, "b")] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/health");
                    then.status(200)
                        .json_body(json!({"status": "ok", "model_loaded": loaded, "version": version}));
                })
                .await;
        }

        let addresses = vec![
            ready_a.base_url(),
            not_loaded.base_url(),
            "http://127.0.0.1:1".to_string(),
            ready_b.base_url(),
        ];
        let client = reqwest::Client::new();
        let pool = BackendPool::probe(&addresses, &client, Duration::from_secs(2)).await.unwrap();

        assert_eq!(pool.addresses(), vec![ready_a.base_url(), ready_b.base_url()]);
        assert_eq!(pool.backends()[0].version.as_deref(), Some("a"));
        assert_eq!(pool.next().address, ready_a.base_url());
        assert_eq!(pool.next().address, ready_b.base_url());
    }

    #[tokio::test]
    async fn test_probe_without_healthy_backend_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(500);
            })
            .await;

        let client = reqwest::Client::new();
        let result = BackendPool::probe(&[server.base_url()], &client, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(PipelineError::NoHealthyBackend { probed: 1 })));
    }
}
