use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use engine::config::Config;
use engine::extract::DocumentInput;
use engine::ollama::{LocalBackend, OllamaAdapter};
use engine::pipeline::Pipeline;
use engine::router::gemini::{GeminiClient, VendorApi};
use engine::router::openrouter::OpenRouterClient;
use engine::router::quota::{MemoryQuotaStore, QuotaStore, RedisQuotaStore};
use engine::router::{ProviderRouter, RouterConfig};
use engine::strict::DocumentKind;

const HOSTED_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting engine v{}", env!("CARGO_PKG_VERSION"));

    let (kind, path) = parse_args()?;

    // Quota persistence: Redis when configured, in-memory otherwise
    let quota: Arc<dyn QuotaStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.clone())?;
            info!("Redis quota store initialized");
            Arc::new(RedisQuotaStore::new(client))
        }
        None => {
            info!("REDIS_URL not set; quota counters are process-local");
            Arc::new(MemoryQuotaStore::new())
        }
    };

    let vendor: Option<Arc<dyn VendorApi>> = config.gemini_api_key.clone().map(|key| {
        Arc::new(GeminiClient::new(
            key,
            config.gemini_model.clone(),
            HOSTED_TIMEOUT,
        )) as Arc<dyn VendorApi>
    });

    let local: Arc<dyn LocalBackend> = Arc::new(OllamaAdapter::new(
        &config.ollama_base_url,
        config.ollama_primary_model.clone(),
        config.ollama_fallback_model.clone(),
    ));

    let router = Arc::new(ProviderRouter::new(
        RouterConfig {
            primary_model: config.openrouter_primary_model.clone(),
            secondary_model: config.openrouter_secondary_model.clone(),
            primary_key: config.openrouter_api_key.clone(),
            fallback_key: config.openrouter_fallback_key.clone(),
            max_calls_per_day: config.max_calls_per_day,
        },
        Arc::new(OpenRouterClient::new(HOSTED_TIMEOUT)),
        vendor,
        Some(local),
        quota,
    ));
    router.reconcile().await;

    let pipeline = Pipeline::new(router);

    let input = read_document(&path)?;
    info!(?kind, path, "Parsing document");
    let verdict = pipeline.parse(input, kind).await;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    if !verdict.success {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_args() -> Result<(DocumentKind, String)> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [kind, path] = args.as_slice() else {
        bail!("usage: engine <resume|job|profile> <path>");
    };
    let kind = kind
        .parse::<DocumentKind>()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok((kind, path.clone()))
}

fn read_document(path: &str) -> Result<DocumentInput> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read '{path}'"))?;
    Ok(DocumentInput::Bytes(bytes))
}
