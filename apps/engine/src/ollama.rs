//! Local inference adapter (Ollama).
//!
//! The local model runs on commodity hardware and can be legitimately slow
//! without being broken, so the adapter keeps two failure axes apart:
//! *fatal* (connection refused, OOM in the response body, model not found)
//! invalidates the cached health and forces a re-probe; *slow* (the
//! generation timeout fires) leaves health untouched — the caller is told to
//! retry, not that the service is down.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::router::classify::CallFailure;
use crate::router::GenerateResult;

pub const LOCAL_PROVIDER: &str = "ollama";

const HEALTH_TTL: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(90);
/// Token budget for health probes — just enough to prove the model loads.
const PROBE_NUM_PREDICT: u32 = 8;
const PROBE_PROMPT: &str = "Reply with the single word OK.";

/// Snapshot of local-adapter health, cached between probes.
#[derive(Debug, Clone, Serialize)]
pub struct LocalAdapterHealth {
    pub available: bool,
    pub model_used: Option<String>,
    pub latency_ms: u64,
    pub errors: Vec<String>,
    pub note: Option<String>,
}

impl LocalAdapterHealth {
    fn unavailable(errors: Vec<String>, note: Option<String>) -> Self {
        LocalAdapterHealth {
            available: false,
            model_used: None,
            latency_ms: 0,
            errors,
            note,
        }
    }
}

/// The local backend contract the router consumes. Tests substitute a
/// scripted implementation.
#[async_trait]
pub trait LocalBackend: Send + Sync {
    async fn check_health(&self) -> LocalAdapterHealth;
    async fn generate(&self, prompt: &str) -> GenerateResult;
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

struct CachedHealth {
    health: LocalAdapterHealth,
    taken_at: Instant,
}

pub struct OllamaAdapter {
    base_url: String,
    primary_model: String,
    fallback_model: String,
    client: reqwest::Client,
    cache: Mutex<Option<CachedHealth>>,
}

impl OllamaAdapter {
    pub fn new(base_url: &str, primary_model: String, fallback_model: String) -> Self {
        OllamaAdapter {
            base_url: base_url.trim_end_matches('/').to_string(),
            primary_model,
            fallback_model,
            client: reqwest::Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            cache: Mutex::new(None),
        }
    }

    fn cached_health(&self) -> Option<LocalAdapterHealth> {
        let cache = self.cache.lock().unwrap();
        cache
            .as_ref()
            .filter(|c| c.taken_at.elapsed() < HEALTH_TTL)
            .map(|c| c.health.clone())
    }

    fn store_health(&self, health: LocalAdapterHealth) {
        *self.cache.lock().unwrap() = Some(CachedHealth {
            health,
            taken_at: Instant::now(),
        });
    }

    fn invalidate_health(&self) {
        *self.cache.lock().unwrap() = None;
    }

    #[cfg(test)]
    fn seed_health(&self, health: LocalAdapterHealth) {
        self.store_health(health);
    }

    async fn call(
        &self,
        model: &str,
        prompt: &str,
        num_predict: Option<u32>,
        timeout: Duration,
    ) -> Result<String, CallFailure> {
        let body = OllamaGenerateRequest {
            model,
            prompt,
            stream: false,
            options: num_predict.map(|n| OllamaOptions { num_predict: n }),
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| CallFailure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallFailure {
                status: Some(status.as_u16()),
                message: body,
                timed_out: false,
                connection_refused: false,
            });
        }

        let parsed: OllamaGenerateResponse = response.json().await.map_err(|e| CallFailure {
            status: None,
            message: format!("Malformed local response: {e}"),
            timed_out: false,
            connection_refused: false,
        })?;
        Ok(parsed.response)
    }

    /// Probe the primary small model, then the fallback. Each attempt has its
    /// own short timeout so an unreachable server keeps router latency
    /// bounded.
    async fn probe(&self) -> LocalAdapterHealth {
        let mut errors = Vec::new();

        for model in [&self.primary_model, &self.fallback_model] {
            let started = Instant::now();
            match self
                .call(model, PROBE_PROMPT, Some(PROBE_NUM_PREDICT), PROBE_TIMEOUT)
                .await
            {
                Ok(_) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    debug!(model, latency_ms, "Local health probe succeeded");
                    return LocalAdapterHealth {
                        available: true,
                        model_used: Some(model.clone()),
                        latency_ms,
                        errors,
                        note: None,
                    };
                }
                Err(f) => {
                    errors.push(format!("{model}: {}", f.message));
                    if f.connection_refused {
                        // Server itself is down; the second model would fail
                        // the same way.
                        return LocalAdapterHealth::unavailable(
                            errors,
                            Some("local inference server unreachable".to_string()),
                        );
                    }
                }
            }
        }

        LocalAdapterHealth::unavailable(errors, Some("no local model responded".to_string()))
    }

    fn generation_model(&self) -> String {
        self.cached_health()
            .and_then(|h| h.model_used)
            .unwrap_or_else(|| self.primary_model.clone())
    }
}

/// A generation failure is fatal when it implies the service or model is
/// broken rather than slow. Fatal failures force a fresh probe before the
/// adapter is trusted again.
fn is_fatal(failure: &CallFailure) -> bool {
    if failure.timed_out {
        return false;
    }
    if failure.connection_refused {
        return true;
    }
    let lower = failure.message.to_lowercase();
    lower.contains("out of memory")
        || lower.contains("oom")
        || lower.contains("not found")
        || failure.status == Some(404)
}

#[async_trait]
impl LocalBackend for OllamaAdapter {
    async fn check_health(&self) -> LocalAdapterHealth {
        if let Some(health) = self.cached_health() {
            return health;
        }
        let health = self.probe().await;
        self.store_health(health.clone());
        health
    }

    async fn generate(&self, prompt: &str) -> GenerateResult {
        let mut model = self.generation_model();
        let started = Instant::now();

        for attempt in 0..2 {
            match self.call(&model, prompt, None, GENERATE_TIMEOUT).await {
                Ok(text) => {
                    return GenerateResult {
                        success: true,
                        provider: LOCAL_PROVIDER.to_string(),
                        model,
                        text,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        error: None,
                        is_timeout: false,
                    };
                }
                Err(f) => {
                    let fatal = is_fatal(&f);
                    if fatal {
                        self.invalidate_health();
                    }
                    // Second tier: a missing primary model falls back once.
                    let model_missing = f.status == Some(404)
                        || f.message.to_lowercase().contains("not found");
                    if attempt == 0 && model_missing && model != self.fallback_model {
                        warn!(
                            model,
                            fallback = %self.fallback_model,
                            "Local model missing, retrying with fallback"
                        );
                        model = self.fallback_model.clone();
                        continue;
                    }
                    if f.timed_out {
                        debug!(model, "Local generation timed out; health untouched");
                    }
                    return GenerateResult {
                        success: false,
                        provider: LOCAL_PROVIDER.to_string(),
                        model,
                        text: String::new(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        error: Some(f.message),
                        is_timeout: f.timed_out,
                    };
                }
            }
        }
        unreachable!("local generation loop always returns within two attempts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused_adapter() -> OllamaAdapter {
        // Nothing listens on port 1 — connects are refused immediately.
        OllamaAdapter::new(
            "http://127.0.0.1:1",
            "llama3.2:3b".to_string(),
            "llama3.2:1b".to_string(),
        )
    }

    fn healthy_snapshot() -> LocalAdapterHealth {
        LocalAdapterHealth {
            available: true,
            model_used: Some("llama3.2:3b".to_string()),
            latency_ms: 120,
            errors: vec![],
            note: None,
        }
    }

    fn failure(timed_out: bool, connection_refused: bool, message: &str) -> CallFailure {
        CallFailure {
            status: None,
            message: message.to_string(),
            timed_out,
            connection_refused,
        }
    }

    #[test]
    fn test_timeout_is_not_fatal() {
        assert!(!is_fatal(&failure(true, false, "operation timed out")));
    }

    #[test]
    fn test_connection_refused_is_fatal() {
        assert!(is_fatal(&failure(false, true, "tcp connect error")));
    }

    #[test]
    fn test_oom_body_is_fatal() {
        assert!(is_fatal(&failure(false, false, "model runner: out of memory")));
    }

    #[test]
    fn test_model_not_found_is_fatal() {
        assert!(is_fatal(&failure(false, false, "model 'x' not found")));
    }

    #[test]
    fn test_generic_http_error_is_not_fatal() {
        assert!(!is_fatal(&failure(false, false, "internal server error")));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_unavailable() {
        let adapter = refused_adapter();
        let health = adapter.check_health().await;
        assert!(!health.available);
        assert!(health.note.is_some());
        assert!(!health.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cached_health_served_without_reprobe() {
        let adapter = refused_adapter();
        adapter.seed_health(healthy_snapshot());
        // If this re-probed it would come back unavailable (port 1).
        let health = adapter.check_health().await;
        assert!(health.available);
        assert_eq!(health.model_used.as_deref(), Some("llama3.2:3b"));
    }

    #[tokio::test]
    async fn test_fatal_generation_error_invalidates_cached_health() {
        let adapter = refused_adapter();
        adapter.seed_health(healthy_snapshot());

        // Connection refused during generation is fatal.
        let result = adapter.generate("prompt").await;
        assert!(!result.success);

        // The next health check re-probes and finds the server down.
        let health = adapter.check_health().await;
        assert!(!health.available);
    }

    #[tokio::test]
    async fn test_generation_uses_cached_model() {
        let adapter = refused_adapter();
        let mut snapshot = healthy_snapshot();
        snapshot.model_used = Some("llama3.2:1b".to_string());
        adapter.seed_health(snapshot);
        assert_eq!(adapter.generation_model(), "llama3.2:1b");
    }

    #[test]
    fn test_stale_cache_ignored() {
        let adapter = refused_adapter();
        adapter.store_health(healthy_snapshot());
        {
            let mut cache = adapter.cache.lock().unwrap();
            if let Some(c) = cache.as_mut() {
                c.taken_at = Instant::now() - Duration::from_secs(31);
            }
        }
        assert!(adapter.cached_health().is_none());
    }
}
