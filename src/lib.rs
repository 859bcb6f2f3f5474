// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod fallback;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod rules;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::MonitorConfig;
pub use crate::error::SourceUnavailable;
pub use crate::fallback::FallbackProvider;
pub use crate::model::{Category, ClassifiedItem, RawFeedItem};
pub use crate::pipeline::{FeedStatus, ItemOrigin, Monitor, RefreshOutcome, Snapshot};
pub use crate::rules::{RuleEngine, RuleSet, RulesHandle};

use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::ingest::types::SourceAdapter;

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Tracing for the binaries: `RUST_LOG` (default `editais_monitor=info,warn`),
/// compact output, or one JSON object per line with `LOG_FORMAT=json`.
/// A no-op if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("editais_monitor=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Wire a [`Monitor`] from configuration using the configured sources.
pub fn build_monitor(cfg: &MonitorConfig) -> anyhow::Result<Monitor> {
    let adapter: Arc<dyn SourceAdapter> = Arc::from(ingest::build_adapter(&cfg.sources)?);
    Ok(monitor_with_adapter(cfg, adapter))
}

/// Same as [`build_monitor`] with an explicit adapter (fixtures, tests).
pub fn monitor_with_adapter(cfg: &MonitorConfig, adapter: Arc<dyn SourceAdapter>) -> Monitor {
    Monitor::new(
        adapter,
        RulesHandle::new(RuleEngine::new(&cfg.rules)),
        cfg.pipeline.clone(),
        FallbackProvider::from_items(cfg.fallback.clone()),
    )
}
