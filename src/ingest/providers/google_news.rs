// src/ingest/providers/google_news.rs
use anyhow::Context;
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Instant;
use url::Url;

use crate::error::SourceUnavailable;
use crate::ingest::config::GoogleNewsConfig;
use crate::ingest::types::SourceAdapter;
use crate::ingest::{collect_items, get_text, http_client, observe_fetch};
use crate::model::RawFeedItem;

const NAME: &str = "google_news";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Google News RSS search fetched and parsed as feed XML.
pub struct GoogleNewsProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: Url, client: reqwest::Client },
}

impl GoogleNewsProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_config(cfg: &GoogleNewsConfig) -> anyhow::Result<Self> {
        let url = cfg
            .search
            .rss_url()
            .with_context(|| format!("invalid news endpoint {}", cfg.search.news_endpoint))?;
        let client = http_client(std::time::Duration::from_secs(cfg.timeout_secs.max(1)))
            .context("building google news http client")?;
        Ok(Self {
            mode: Mode::Http { url, client },
        })
    }

    /// Parse an RSS 2.0 document. A channel without `<item>` is zero results.
    pub fn parse_feed(s: &str) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).map_err(SourceUnavailable::payload)?;
        Ok(collect_items(
            NAME,
            rss.channel.item.iter().map(|it| {
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

#[async_trait]
impl SourceAdapter for GoogleNewsProvider {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let t0 = Instant::now();
        let res = match &self.mode {
            Mode::Fixture(s) => Self::parse_feed(s),
            Mode::Http { url, client } => match get_text(client, url.clone()).await {
                Ok(body) => Self::parse_feed(&body),
                Err(e) => Err(e),
            },
        };
        observe_fetch(NAME, t0, res)
    }

    fn name(&self) -> &str {
        NAME
    }
}

// XML only knows five named entities; feeds still ship HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
