//! Per-credential health and quota tracking.
//!
//! `RouterState` is an explicitly-owned value injected into the router at
//! construction. Production holds one instance for the process lifetime;
//! tests construct a fresh one per case. All mutation goes through its own
//! synchronized methods — locks are never held across an await point.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use super::classify::FailureKind;

/// Hosted-credential identifiers used as `ProviderState` keys.
pub const OPENROUTER_PRIMARY: &str = "openrouter:primary";
pub const OPENROUTER_FALLBACK: &str = "openrouter:fallback";
pub const GEMINI: &str = "gemini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    Healthy,
    RateLimited,
    Unavailable,
    DisabledBilling,
}

/// Tracked state for one hosted credential.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderState {
    pub name: String,
    pub health: ProviderHealth,
    pub last_error: Option<String>,
    pub calls_today: u32,
    pub max_calls_per_day: u32,
    /// Calendar day (`YYYY-MM-DD`) the counter belongs to.
    pub day: String,
}

impl ProviderState {
    fn new(name: &str, max_calls_per_day: u32, day: &str) -> Self {
        ProviderState {
            name: name.to_string(),
            health: ProviderHealth::Healthy,
            last_error: None,
            calls_today: 0,
            max_calls_per_day,
            day: day.to_string(),
        }
    }
}

pub struct RouterState {
    providers: Mutex<HashMap<String, ProviderState>>,
    last_successful: Mutex<Option<String>>,
}

impl RouterState {
    pub fn new(names: &[&str], max_calls_per_day: u32, today: &str) -> Self {
        let providers = names
            .iter()
            .map(|n| (n.to_string(), ProviderState::new(n, max_calls_per_day, today)))
            .collect();
        RouterState {
            providers: Mutex::new(providers),
            last_successful: Mutex::new(None),
        }
    }

    /// Gate check for the candidate walk. Only permanent billing disablement
    /// and quota exhaustion skip a credential — `RateLimited` is allowed to
    /// retry on the next call.
    pub fn is_allowed(&self, name: &str) -> bool {
        let providers = self.providers.lock().unwrap();
        match providers.get(name) {
            Some(p) => {
                p.health != ProviderHealth::DisabledBilling && p.calls_today < p.max_calls_per_day
            }
            None => false,
        }
    }

    /// Record a successful call: bump the day counter and stamp the winner.
    /// Success does not clear `RateLimited` — that heals only via the day
    /// roll or an external reset.
    pub fn record_success(&self, name: &str) {
        let mut providers = self.providers.lock().unwrap();
        if let Some(p) = providers.get_mut(name) {
            p.calls_today += 1;
            p.last_error = None;
        }
        drop(providers);
        *self.last_successful.lock().unwrap() = Some(name.to_string());
    }

    pub fn record_failure(&self, name: &str, kind: FailureKind, message: &str) {
        let mut providers = self.providers.lock().unwrap();
        if let Some(p) = providers.get_mut(name) {
            p.last_error = Some(message.to_string());
            match kind {
                FailureKind::Billing => p.health = ProviderHealth::DisabledBilling,
                FailureKind::RateLimit => p.health = ProviderHealth::RateLimited,
                FailureKind::Transport => p.health = ProviderHealth::Unavailable,
                // Model-not-found, timeouts, and generic HTTP errors say
                // nothing about the credential itself.
                FailureKind::ModelNotFound | FailureKind::Timeout | FailureKind::Http => {}
            }
        }
    }

    /// Roll counters forward when the calendar day changes. Rate limiting
    /// clears with the new day; billing disablement survives until process
    /// restart or explicit reset.
    pub fn roll_day(&self, today: &str) {
        let mut providers = self.providers.lock().unwrap();
        for p in providers.values_mut() {
            if p.day != today {
                p.day = today.to_string();
                p.calls_today = 0;
                if p.health == ProviderHealth::RateLimited
                    || p.health == ProviderHealth::Unavailable
                {
                    p.health = ProviderHealth::Healthy;
                }
            }
        }
    }

    /// Import a persisted day counter, if it belongs to today. Health is
    /// process-scoped and never imported — a restart is an explicit reset.
    pub fn import_counter(&self, name: &str, calls_today: u32, last_reset: &str, today: &str) {
        if last_reset != today {
            return;
        }
        let mut providers = self.providers.lock().unwrap();
        if let Some(p) = providers.get_mut(name) {
            if p.day == today && calls_today > p.calls_today {
                p.calls_today = calls_today;
            }
        }
    }

    pub fn snapshot(&self, name: &str) -> Option<ProviderState> {
        self.providers.lock().unwrap().get(name).cloned()
    }

    pub fn last_successful_provider(&self) -> Option<String> {
        self.last_successful.lock().unwrap().clone()
    }
}
