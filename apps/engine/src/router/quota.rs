//! Quota persistence collaborator.
//!
//! Day counters survive process restarts by living in an external key-value
//! store. The store is eventually consistent shared state: the router
//! reconciles against it at construction and opportunistically on each call,
//! and a store outage degrades to in-memory counting with a warning.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

/// Persisted per-provider counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStats {
    pub status: String,
    pub calls_today: u32,
    /// Calendar day (`YYYY-MM-DD`) the counter was last reset.
    pub last_reset: String,
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get_provider_stats(&self, name: &str) -> Option<ProviderStats>;
    async fn update_provider_stats(&self, name: &str, stats: &ProviderStats);
}

fn stats_key(name: &str) -> String {
    format!("provider_stats:{name}")
}

/// Redis-backed store. All failures are swallowed with a warning — quota
/// persistence is best-effort and must never block generation.
pub struct RedisQuotaStore {
    client: redis::Client,
}

impl RedisQuotaStore {
    pub fn new(client: redis::Client) -> Self {
        RedisQuotaStore { client }
    }

    async fn read(&self, name: &str) -> redis::RedisResult<Option<ProviderStats>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(stats_key(name)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProviderStats {
            status: fields.get("status").cloned().unwrap_or_default(),
            calls_today: fields
                .get("calls_today")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            last_reset: fields.get("last_reset").cloned().unwrap_or_default(),
        }))
    }

    async fn write(&self, name: &str, stats: &ProviderStats) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.hset_multiple(
            stats_key(name),
            &[
                ("status", stats.status.clone()),
                ("calls_today", stats.calls_today.to_string()),
                ("last_reset", stats.last_reset.clone()),
            ],
        )
        .await
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn get_provider_stats(&self, name: &str) -> Option<ProviderStats> {
        match self.read(name).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Quota store read failed for {name}: {e}");
                None
            }
        }
    }

    async fn update_provider_stats(&self, name: &str, stats: &ProviderStats) {
        if let Err(e) = self.write(name, stats).await {
            warn!("Quota store write failed for {name}: {e}");
        }
    }
}

/// In-memory store for tests and Redis-less deployments.
#[derive(Default)]
pub struct MemoryQuotaStore {
    entries: Mutex<HashMap<String, ProviderStats>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, stats: ProviderStats) {
        self.entries.lock().unwrap().insert(name.to_string(), stats);
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get_provider_stats(&self, name: &str) -> Option<ProviderStats> {
        self.entries.lock().unwrap().get(name).cloned()
    }

    async fn update_provider_stats(&self, name: &str, stats: &ProviderStats) {
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), stats.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryQuotaStore::new();
        assert!(store.get_provider_stats("openrouter:primary").await.is_none());

        let stats = ProviderStats {
            status: "healthy".to_string(),
            calls_today: 7,
            last_reset: "2025-03-01".to_string(),
        };
        store.update_provider_stats("openrouter:primary", &stats).await;

        let read = store.get_provider_stats("openrouter:primary").await.unwrap();
        assert_eq!(read, stats);
    }

    #[test]
    fn test_stats_key_shape() {
        assert_eq!(stats_key("gemini"), "provider_stats:gemini");
    }
}
