//! focus-feeds service entrypoint.
//! Loads configuration, selects the AI provider, and serves the feeds API.

use focus_feeds::cache::CachePolicy;
use focus_feeds::config::AppConfig;
use focus_feeds::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs. `FEEDS_LOG` takes precedence over `RUST_LOG`.
fn init_tracing() {
    let filter = std::env::var("FEEDS_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("focus_feeds=info,ingest=info,ai=info,aggregate=info,cache=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let app = AppConfig::load().map_err(shuttle_runtime::Error::Custom)?;
    let metrics = Metrics::init(CachePolicy::from(&app)).map_err(shuttle_runtime::Error::Custom)?;
    let state = focus_feeds::bootstrap(&app)
        .await
        .map_err(shuttle_runtime::Error::Custom)?;

    tracing::info!(
        provider = state.providers.active_name(),
        cache_hours = app.cache_hours,
        daily_quota = app.daily_quota,
        "focus-feeds ready"
    );

    let router = focus_feeds::router(state, Some(&metrics));
    Ok(router.into())
}
