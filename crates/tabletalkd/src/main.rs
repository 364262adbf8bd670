//! tabletalkd — conversational dataset dashboard daemon.

use std::sync::Arc;

use anyhow::{Context, Result};

use tabletalk_core::config::TabletalkConfig;
use tabletalk_services::{prompt, DatasetStore, OpenAiClient, WorkerPool};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TabletalkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TabletalkConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TabletalkConfig::default()
    });

    // Dataset
    let csv_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.dataset.csv_path.clone());
    let db_path = if config.dataset.db_path.as_os_str().is_empty() {
        csv_path.with_extension("db")
    } else {
        config.dataset.db_path.clone()
    };
    tracing::info!(csv = %csv_path.display(), db = %db_path.display(), "loading dataset");

    let store = DatasetStore::new(&db_path, config.dataset.table_name.clone());
    store
        .load_csv(&csv_path)
        .with_context(|| format!("failed to load dataset from {}", csv_path.display()))?;
    let schema = store.schema().context("failed to read dataset schema")?;

    // Completion client
    let api_key = std::env::var(&config.model.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!(
            env = %config.model.api_key_env,
            "API key env var is empty — completion calls will be rejected upstream"
        );
    }
    let client = OpenAiClient::new(
        config.model.api_base.clone(),
        api_key,
        config.model.request_timeout_secs,
    )
    .context("failed to build completion client")?;

    // Worker pool
    let pool = WorkerPool::start(config.pool.workers, store.clone(), Arc::new(client));

    // API
    let state = tabletalk_api::ApiState::new(
        pool,
        prompt::system_prompt(&config.dataset.table_name, &schema),
        prompt::greeting(&config.dataset.table_name),
        config.model.id.clone(),
        config.dataset.table_name.clone(),
        config.pool.workers,
    );

    tracing::info!(model = %config.model.id, workers = config.pool.workers, "tabletalkd ready");
    tabletalk_api::serve(state, config.api.port).await
}
