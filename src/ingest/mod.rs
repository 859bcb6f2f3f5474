// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::error::SourceUnavailable;
use crate::ingest::config::SourceConfig;
use crate::ingest::providers::{
    custom_search::CustomSearchProvider, google_news::GoogleNewsProvider,
    rss2json::Rss2JsonProvider,
};
use crate::ingest::types::{DynSource, SourceAdapter};
use crate::model::RawFeedItem;

const USER_AGENT: &str = concat!("editais-monitor/", env!("CARGO_PKG_VERSION"));
const MAX_TEXT_CHARS: usize = 1500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Well-formed items parsed from sources.");
        describe_counter!(
            "ingest_malformed_total",
            "Items skipped for a missing title or invalid link."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Source fetch/parse failures."
        );
        describe_histogram!("ingest_fetch_ms", "Source fetch + parse time in milliseconds.");
        describe_counter!("pipeline_kept_total", "Items accepted by the rules.");
        describe_counter!(
            "pipeline_filtered_total",
            "Items rejected by the rules, by reason."
        );
        describe_counter!("pipeline_cycles_total", "Fetch cycles, by final status.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last finished a cycle."
        );
    });
}

/// Plain text: strip tags, decode entities, normalize curly quotes, collapse
/// whitespace. No length cap; display bounds are applied by the pipeline.
pub fn normalize_text(s: &str) -> String {
    // 1) Strip HTML tags on the raw markup, so escaped `&lt;`/`&gt;` stay text
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags =
        RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let stripped = re_tags.replace_all(s, " ");

    // 2) HTML entity decode
    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (Unicode \s also covers the NBSP from &nbsp;)
    collapse_whitespace(&out)
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

/// Bound display text to `MAX_TEXT_CHARS` characters.
pub(crate) fn cap_text(s: String) -> String {
    if s.chars().count() > MAX_TEXT_CHARS {
        s.chars().take(MAX_TEXT_CHARS).collect()
    } else {
        s
    }
}

/// Parse the timestamp formats seen across sources: RFC 3339 (Programmable Search
/// metatags), RFC 2822 (RSS `pubDate`) and `YYYY-MM-DD HH:MM:SS` in UTC (rss2json).
/// Unknown formats yield `None`; the timestamp is display-only.
pub fn parse_published(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

/// Build items from loosely-typed parts, skipping malformed ones.
pub(crate) fn collect_items<'a, I>(source: &str, parts: I) -> Vec<RawFeedItem>
where
    I: IntoIterator<
        Item = (
            Option<&'a str>,
            Option<&'a str>,
            Option<&'a str>,
            Option<&'a str>,
        ),
    >,
{
    let mut out = Vec::new();
    let mut malformed = 0u64;
    for (title, description, link, published) in parts {
        let published_at = published.and_then(parse_published);
        match RawFeedItem::from_parts(title, description, link, published_at) {
            Some(item) => out.push(item),
            None => {
                malformed += 1;
                tracing::debug!(target: "ingest", source, title = ?title, link = ?link, "skipping malformed item");
            }
        }
    }
    counter!("ingest_events_total").increment(out.len() as u64);
    if malformed > 0 {
        counter!("ingest_malformed_total").increment(malformed);
    }
    out
}

/// reqwest client shared by the HTTP backends.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceUnavailable> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .map_err(SourceUnavailable::from)
}

/// One GET, body as text. Non-2xx is an error; no retries.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: url::Url,
) -> Result<String, SourceUnavailable> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceUnavailable::Status(status.as_u16()));
    }
    Ok(resp.text().await?)
}

/// Record fetch latency, and count + log a failure. Returns the result unchanged.
pub(crate) fn observe_fetch<T>(
    source: &str,
    started: Instant,
    res: Result<T, SourceUnavailable>,
) -> Result<T, SourceUnavailable> {
    let ms = started.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_fetch_ms").record(ms);
    if let Err(e) = &res {
        counter!("ingest_provider_errors_total").increment(1);
        tracing::warn!(target: "ingest", error = %e, source, "source unavailable");
    }
    res
}

/// Fetches several sources one after another and concatenates their items in
/// configuration order. Fails only when every source failed.
pub struct MultiSource {
    sources: Vec<DynSource>,
}

impl MultiSource {
    pub fn new(sources: Vec<DynSource>) -> Self {
        Self { sources }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MultiSource {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let mut all = Vec::new();
        let mut failures = 0usize;
        for s in &self.sources {
            match s.fetch().await {
                Ok(mut v) => all.append(&mut v),
                Err(e) => {
                    failures += 1;
                    tracing::debug!(target: "ingest", error = %e, source = s.name(), "continuing with the remaining sources");
                }
            }
        }
        if !self.sources.is_empty() && failures == self.sources.len() {
            return Err(SourceUnavailable::AllSourcesFailed(failures));
        }
        Ok(all)
    }

    fn name(&self) -> &str {
        "multi"
    }
}

/// Build the adapter selected by configuration: one source as-is, several merged.
pub fn build_adapter(sources: &[SourceConfig]) -> anyhow::Result<DynSource> {
    let mut built: Vec<DynSource> = Vec::with_capacity(sources.len());
    for cfg in sources {
        built.push(build_one(cfg)?);
    }
    match built.len() {
        0 => anyhow::bail!("no sources configured"),
        1 => Ok(built.remove(0)),
        _ => Ok(Box::new(MultiSource::new(built))),
    }
}

fn build_one(cfg: &SourceConfig) -> anyhow::Result<DynSource> {
    let adapter: DynSource = match cfg {
        SourceConfig::Rss2json(c) => Box::new(Rss2JsonProvider::from_config(c)?),
        SourceConfig::GoogleNews(c) => Box::new(GoogleNewsProvider::from_config(c)?),
        SourceConfig::CustomSearch(c) => Box::new(CustomSearchProvider::from_config(c)?),
    };
    Ok(adapter)
}

/// Adapter that replays a stored payload instead of calling the network.
/// `kind` uses the same names as `[[sources]] kind`.
pub fn fixture_adapter(kind: &str, payload: &str) -> anyhow::Result<DynSource> {
    let adapter: DynSource = match kind {
        "rss2json" => Box::new(Rss2JsonProvider::from_fixture(payload)),
        "google_news" => Box::new(GoogleNewsProvider::from_fixture(payload)),
        "custom_search" => Box::new(CustomSearchProvider::from_fixture(payload)),
        other => anyhow::bail!("unknown source kind '{other}'"),
    };
    Ok(adapter)
}
