use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only the primary aggregator credential is required — the vendor key,
/// fallback key, and Redis are all optional degradations.
#[derive(Debug, Clone)]
pub struct Config {
    pub openrouter_api_key: String,
    pub openrouter_fallback_key: Option<String>,
    pub openrouter_primary_model: String,
    pub openrouter_secondary_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ollama_base_url: String,
    pub ollama_primary_model: String,
    pub ollama_fallback_model: String,
    pub redis_url: Option<String>,
    pub max_calls_per_day: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openrouter_api_key: require_env("OPENROUTER_API_KEY")?,
            openrouter_fallback_key: std::env::var("OPENROUTER_API_KEY_FALLBACK").ok(),
            openrouter_primary_model: std::env::var("OPENROUTER_PRIMARY_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            openrouter_secondary_model: std::env::var("OPENROUTER_SECONDARY_MODEL")
                .unwrap_or_else(|_| "meta-llama/llama-3.1-8b-instruct".to_string()),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_primary_model: std::env::var("OLLAMA_PRIMARY_MODEL")
                .unwrap_or_else(|_| "llama3.2:3b".to_string()),
            ollama_fallback_model: std::env::var("OLLAMA_FALLBACK_MODEL")
                .unwrap_or_else(|_| "llama3.2:1b".to_string()),
            redis_url: std::env::var("REDIS_URL").ok(),
            max_calls_per_day: std::env::var("MAX_CALLS_PER_DAY")
                .unwrap_or_else(|_| "200".to_string())
                .parse::<u32>()
                .context("MAX_CALLS_PER_DAY must be a positive integer")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
