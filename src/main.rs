//! Editais monitor service: binary entrypoint.
//! Boots the Axum HTTP server with the monitor, the JSON API and /metrics.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use editais_monitor::config::{resolve_path, MonitorConfig};
use editais_monitor::metrics::Metrics;
use editais_monitor::rules::start_hot_reload_thread;
use editais_monitor::{api, build_monitor, init_tracing, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables MONITOR_CONFIG_PATH and the API key variables from .env
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = MonitorConfig::load_default().context("loading monitor config")?;
    let monitor = build_monitor(&cfg).context("building source adapters")?;

    // Dev-only: swap the [rules] section when the config file changes
    if let Some(path) = resolve_path()? {
        start_hot_reload_thread(monitor.rules().clone(), path);
    }

    // Page mount: first fetch runs in the background, the API answers "loading" meanwhile
    monitor.spawn_refresh();

    let mut router = api::router(AppState::new(monitor));
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    tracing::info!(
        sources = cfg.sources.len(),
        max_items = cfg.pipeline.max_items,
        "editais monitor started"
    );

    Ok(router.into())
}
