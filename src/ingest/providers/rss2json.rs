// src/ingest/providers/rss2json.rs
//! Google News RSS search through the rss2json JSON wrapper.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use url::Url;

use crate::error::SourceUnavailable;
use crate::ingest::config::{resolve_secret, Rss2JsonConfig, ENV_RSS2JSON_API_KEY};
use crate::ingest::types::SourceAdapter;
use crate::ingest::{collect_items, get_text, http_client, observe_fetch};
use crate::model::RawFeedItem;

const NAME: &str = "rss2json";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

pub struct Rss2JsonProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: Url, client: reqwest::Client },
}

impl Rss2JsonProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_config(cfg: &Rss2JsonConfig) -> anyhow::Result<Self> {
        let url = request_url(cfg)?;
        let client = http_client(std::time::Duration::from_secs(cfg.timeout_secs.max(1)))
            .context("building rss2json http client")?;
        Ok(Self {
            mode: Mode::Http { url, client },
        })
    }

    /// Parse an rss2json response body.
    pub fn parse_payload(s: &str) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let env: Envelope = serde_json::from_str(s).map_err(SourceUnavailable::payload)?;
        if !env.status.eq_ignore_ascii_case("ok") {
            return Err(SourceUnavailable::Upstream(
                env.message.unwrap_or_else(|| format!("status={}", env.status)),
            ));
        }
        Ok(collect_items(
            NAME,
            env.items.iter().map(|it| {
                (
                    it.title.as_deref(),
                    it.description.as_deref(),
                    it.link.as_deref(),
                    it.pub_date.as_deref(),
                )
            }),
        ))
    }
}

/// `https://api.rss2json.com/v1/api.json?rss_url=<google news url>[&api_key=..&count=..]`
pub fn request_url(cfg: &Rss2JsonConfig) -> anyhow::Result<Url> {
    let rss_url = cfg
        .search
        .rss_url()
        .with_context(|| format!("invalid news endpoint {}", cfg.search.news_endpoint))?;
    let mut params = vec![("rss_url".to_string(), rss_url.to_string())];
    if let Some(key) = resolve_secret(cfg.api_key.as_deref(), ENV_RSS2JSON_API_KEY) {
        params.push(("api_key".to_string(), key));
        params.push(("count".to_string(), cfg.result_hint.max(1).to_string()));
    }
    Url::parse_with_params(&cfg.endpoint, &params)
        .with_context(|| format!("invalid rss2json endpoint {}", cfg.endpoint))
}

#[async_trait]
impl SourceAdapter for Rss2JsonProvider {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let t0 = Instant::now();
        let res = match &self.mode {
            Mode::Fixture(s) => Self::parse_payload(s),
            Mode::Http { url, client } => match get_text(client, url.clone()).await {
                Ok(body) => Self::parse_payload(&body),
                Err(e) => Err(e),
            },
        };
        observe_fetch(NAME, t0, res)
    }

    fn name(&self) -> &str {
        NAME
    }
}
