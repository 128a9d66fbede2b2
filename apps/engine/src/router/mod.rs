//! Provider Router — the single point of entry for all LLM generation.
//!
//! ARCHITECTURAL RULE: no other module may call a model backend directly.
//! All generation goes through `ProviderRouter::generate`, which walks a
//! fixed priority order — aggregator primary model, aggregator secondary
//! model, the same pair on a fallback credential, the direct vendor API,
//! then the local adapter — tracking health and daily quota per credential
//! across calls for the process lifetime.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

pub mod classify;
pub mod gemini;
pub mod openrouter;
pub mod quota;
pub mod state;

use crate::errors::RouterError;
use crate::ollama::{LocalBackend, LOCAL_PROVIDER};
use self::classify::{classify, FailureKind};
use self::gemini::VendorApi;
use self::openrouter::AggregatorApi;
use self::quota::{ProviderStats, QuotaStore};
use self::state::{ProviderHealth, RouterState, GEMINI, OPENROUTER_FALLBACK, OPENROUTER_PRIMARY};

/// Uniform shape returned by every backend attempt. The router treats all
/// backends through this one record.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub success: bool,
    pub provider: String,
    pub model: String,
    pub text: String,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub is_timeout: bool,
}

/// Generation facade the pipeline depends on, so tests can script responses
/// without standing up backends.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        temperature: Option<f32>,
    ) -> Result<GenerateResult, RouterError>;
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub primary_model: String,
    pub secondary_model: String,
    pub primary_key: String,
    pub fallback_key: Option<String>,
    pub max_calls_per_day: u32,
}

pub struct ProviderRouter {
    aggregator: Arc<dyn AggregatorApi>,
    vendor: Option<Arc<dyn VendorApi>>,
    local: Option<Arc<dyn LocalBackend>>,
    quota: Arc<dyn QuotaStore>,
    state: RouterState,
    cfg: RouterConfig,
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

impl ProviderRouter {
    pub fn new(
        cfg: RouterConfig,
        aggregator: Arc<dyn AggregatorApi>,
        vendor: Option<Arc<dyn VendorApi>>,
        local: Option<Arc<dyn LocalBackend>>,
        quota: Arc<dyn QuotaStore>,
    ) -> Self {
        let state = RouterState::new(
            &[OPENROUTER_PRIMARY, OPENROUTER_FALLBACK, GEMINI],
            cfg.max_calls_per_day,
            &today(),
        );
        ProviderRouter {
            aggregator,
            vendor,
            local,
            quota,
            state,
            cfg,
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    /// Reconcile in-memory counters against the external store. Called at
    /// construction time and opportunistically at the top of each call;
    /// the store is eventually consistent, so divergence is tolerated.
    pub async fn reconcile(&self) {
        let day = today();
        self.state.roll_day(&day);
        for name in [OPENROUTER_PRIMARY, OPENROUTER_FALLBACK, GEMINI] {
            if let Some(stats) = self.quota.get_provider_stats(name).await {
                self.state
                    .import_counter(name, stats.calls_today, &stats.last_reset, &day);
            }
        }
    }

    async fn persist(&self, name: &str) {
        if let Some(p) = self.state.snapshot(name) {
            let status = match p.health {
                ProviderHealth::Healthy => "healthy",
                ProviderHealth::RateLimited => "rate_limited",
                ProviderHealth::Unavailable => "unavailable",
                ProviderHealth::DisabledBilling => "disabled_billing",
            };
            self.quota
                .update_provider_stats(
                    name,
                    &ProviderStats {
                        status: status.to_string(),
                        calls_today: p.calls_today,
                        last_reset: p.day.clone(),
                    },
                )
                .await;
        }
    }

    /// Try both aggregator models on one credential. A billing failure stops
    /// the model loop — it condemns the credential, not the model.
    async fn try_aggregator_credential(
        &self,
        name: &str,
        api_key: &str,
        prompt: &str,
        temperature: Option<f32>,
        last_error: &mut String,
    ) -> Option<GenerateResult> {
        if !self.state.is_allowed(name) {
            debug!(credential = name, "Skipping gated aggregator credential");
            return None;
        }

        for model in [&self.cfg.primary_model, &self.cfg.secondary_model] {
            let started = Instant::now();
            match self
                .aggregator
                .complete(api_key, model, prompt, temperature)
                .await
            {
                Ok(text) => {
                    self.state.record_success(name);
                    self.persist(name).await;
                    return Some(GenerateResult {
                        success: true,
                        provider: name.to_string(),
                        model: model.clone(),
                        text,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        error: None,
                        is_timeout: false,
                    });
                }
                Err(f) => {
                    let kind = classify(&f);
                    self.state.record_failure(name, kind, &f.message);
                    *last_error = format!("{name}/{model}: {}", f.message);
                    warn!(
                        credential = name,
                        model,
                        kind = ?kind,
                        "Aggregator attempt failed"
                    );
                    if kind == FailureKind::Billing {
                        self.persist(name).await;
                        break;
                    }
                }
            }
        }
        None
    }

    async fn try_vendor(
        &self,
        prompt: &str,
        temperature: Option<f32>,
        last_error: &mut String,
    ) -> Option<GenerateResult> {
        let vendor = self.vendor.as_ref()?;
        if !self.state.is_allowed(GEMINI) {
            debug!("Skipping gated vendor credential");
            return None;
        }

        let started = Instant::now();
        match vendor.complete(prompt, temperature).await {
            Ok(text) => {
                self.state.record_success(GEMINI);
                self.persist(GEMINI).await;
                Some(GenerateResult {
                    success: true,
                    provider: GEMINI.to_string(),
                    model: vendor.model().to_string(),
                    text,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    error: None,
                    is_timeout: false,
                })
            }
            Err(f) => {
                let kind = classify(&f);
                self.state.record_failure(GEMINI, kind, &f.message);
                *last_error = format!("{GEMINI}: {}", f.message);
                warn!(kind = ?kind, "Vendor attempt failed");
                if kind == FailureKind::Billing {
                    self.persist(GEMINI).await;
                }
                None
            }
        }
    }

    async fn try_local(&self, prompt: &str, last_error: &mut String) -> Option<GenerateResult> {
        let local = self.local.as_ref()?;

        // A stale cache triggers a fresh probe inside the adapter.
        let health = local.check_health().await;
        if !health.available {
            *last_error = format!(
                "{LOCAL_PROVIDER}: {}",
                health
                    .note
                    .unwrap_or_else(|| "local adapter unavailable".to_string())
            );
            return None;
        }

        let result = local.generate(prompt).await;
        if result.success {
            self.state.record_success(LOCAL_PROVIDER);
            Some(result)
        } else {
            *last_error = format!(
                "{LOCAL_PROVIDER}: {}",
                result.error.as_deref().unwrap_or("generation failed")
            );
            None
        }
    }
}

#[async_trait]
impl Generator for ProviderRouter {
    /// Walk the candidate list in priority order. Never errors for an
    /// ordinary backend failure — only when every candidate is exhausted.
    async fn generate(
        &self,
        prompt: &str,
        temperature: Option<f32>,
    ) -> Result<GenerateResult, RouterError> {
        if self.vendor.is_none() && self.local.is_none() && self.cfg.primary_key.is_empty() {
            return Err(RouterError::NoBackends);
        }

        self.reconcile().await;

        let mut last_error = String::from("no backend attempted");

        if !self.cfg.primary_key.is_empty() {
            if let Some(result) = self
                .try_aggregator_credential(
                    OPENROUTER_PRIMARY,
                    &self.cfg.primary_key,
                    prompt,
                    temperature,
                    &mut last_error,
                )
                .await
            {
                return Ok(result);
            }
        }

        if let Some(fallback_key) = self.cfg.fallback_key.as_deref() {
            if let Some(result) = self
                .try_aggregator_credential(
                    OPENROUTER_FALLBACK,
                    fallback_key,
                    prompt,
                    temperature,
                    &mut last_error,
                )
                .await
            {
                return Ok(result);
            }
        }

        if let Some(result) = self.try_vendor(prompt, temperature, &mut last_error).await {
            return Ok(result);
        }

        if let Some(result) = self.try_local(prompt, &mut last_error).await {
            return Ok(result);
        }

        info!(last_error, "All providers exhausted");
        Err(RouterError::Exhausted { last_error })
    }
}
