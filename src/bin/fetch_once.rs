//! Runs one fetch cycle and prints the resulting snapshot as JSON.
//!
//! Usage:
//!   fetch_once                               # configured sources
//!   fetch_once --fixture <kind> <path>       # replay a stored payload
//!
//! `kind` is one of rss2json, google_news, custom_search.

use std::sync::Arc;

use anyhow::{bail, Context};

use editais_monitor::config::MonitorConfig;
use editais_monitor::ingest::fixture_adapter;
use editais_monitor::{build_monitor, init_tracing, monitor_with_adapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = MonitorConfig::load_default().context("loading monitor config")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let monitor = match args.as_slice() {
        [] => build_monitor(&cfg)?,
        [flag, kind, path] if flag == "--fixture" => {
            let payload = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixture {path}"))?;
            monitor_with_adapter(&cfg, Arc::from(fixture_adapter(kind, &payload)?))
        }
        _ => bail!("usage: fetch_once [--fixture <kind> <path>]"),
    };

    let outcome = monitor.refresh().await;
    let json = serde_json::to_string_pretty(outcome.snapshot().as_ref())
        .context("serializing snapshot")?;
    println!("{json}");
    Ok(())
}
