// src/ingest/providers/custom_search.rs
//! Google Programmable Search (Custom Search JSON API).

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use url::Url;

use crate::error::SourceUnavailable;
use crate::ingest::config::{resolve_secret, CustomSearchConfig, ENV_GOOGLE_CSE_API_KEY};
use crate::ingest::types::SourceAdapter;
use crate::ingest::{collect_items, get_text, http_client, observe_fetch};
use crate::model::RawFeedItem;

const NAME: &str = "custom_search";
/// The API rejects `num` above 10.
const MAX_NUM: u32 = 10;

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    #[serde(default)]
    pagemap: Option<PageMap>,
}

#[derive(Debug, Deserialize)]
struct PageMap {
    #[serde(default)]
    metatags: Vec<HashMap<String, serde_json::Value>>,
}

impl Item {
    fn published(&self) -> Option<&str> {
        let tags = self.pagemap.as_ref()?.metatags.first()?;
        ["article:published_time", "og:updated_time", "date"]
            .iter()
            .find_map(|k| tags.get(*k).and_then(|v| v.as_str()))
    }
}

pub struct CustomSearchProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: Url, client: reqwest::Client },
    /// No API key resolved: every fetch reports missing credentials.
    Unconfigured,
}

impl CustomSearchProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_config(cfg: &CustomSearchConfig) -> anyhow::Result<Self> {
        let cx = cfg
            .cx
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("custom_search source needs `cx` (search engine id)")?;

        let Some(key) = resolve_secret(cfg.api_key.as_deref(), ENV_GOOGLE_CSE_API_KEY) else {
            tracing::warn!(target: "ingest", source = NAME, "no API key configured; source will report unavailable");
            return Ok(Self {
                mode: Mode::Unconfigured,
            });
        };

        let mut params = vec![
            ("key", key),
            ("cx", cx.to_string()),
            ("q", cfg.query.trim().to_string()),
            ("dateRestrict", format!("d{}", cfg.window_days.max(1))),
            ("num", cfg.result_hint.clamp(1, MAX_NUM).to_string()),
        ];
        if let Some(lr) = cfg.lr.as_deref().filter(|s| !s.is_empty()) {
            params.push(("lr", lr.to_string()));
        }
        let url = Url::parse_with_params(&cfg.endpoint, &params)
            .with_context(|| format!("invalid custom search endpoint {}", cfg.endpoint))?;
        let client = http_client(std::time::Duration::from_secs(cfg.timeout_secs.max(1)))
            .context("building custom search http client")?;
        Ok(Self {
            mode: Mode::Http { url, client },
        })
    }

    /// Parse a Custom Search JSON response. No `items` field means zero results.
    pub fn parse_payload(s: &str) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let resp: Response = serde_json::from_str(s).map_err(SourceUnavailable::payload)?;
        if let Some(err) = resp.error {
            return Err(SourceUnavailable::Upstream(format!(
                "{} {}",
                err.code.map(|c| c.to_string()).unwrap_or_default(),
                err.message.unwrap_or_default()
            )
            .trim()
            .to_string()));
        }
        Ok(collect_items(
            NAME,
            resp.items.iter().map(|it| {
                (
                    it.title.as_deref(),
                    it.snippet.as_deref(),
                    it.link.as_deref(),
                    it.published(),
                )
            }),
        ))
    }
}

#[async_trait]
impl SourceAdapter for CustomSearchProvider {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>, SourceUnavailable> {
        let t0 = Instant::now();
        let res = match &self.mode {
            Mode::Fixture(s) => Self::parse_payload(s),
            Mode::Http { url, client } => match get_text(client, url.clone()).await {
                Ok(body) => Self::parse_payload(&body),
                Err(e) => Err(e),
            },
            Mode::Unconfigured => Err(SourceUnavailable::MissingCredentials(NAME)),
        };
        observe_fetch(NAME, t0, res)
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CustomSearchConfig {
        CustomSearchConfig {
            query: "edital cultura".into(),
            window_days: 30,
            result_hint: 50,
            endpoint: "https://www.googleapis.com/customsearch/v1".into(),
            api_key: Some("k".into()),
            cx: Some("engine".into()),
            lr: Some("lang_pt".into()),
            timeout_secs: 10,
        }
    }

    #[test]
    fn missing_cx_is_a_config_error() {
        let mut c = cfg();
        c.cx = Some("  ".into());
        assert!(CustomSearchProvider::from_config(&c).is_err());
    }

    #[tokio::test]
    async fn missing_key_reports_unavailable() {
        let mut c = cfg();
        c.api_key = None;
        let p = CustomSearchProvider::from_config(&c).unwrap();
        assert!(matches!(
            p.fetch().await,
            Err(SourceUnavailable::MissingCredentials("custom_search"))
        ));
    }

    #[test]
    fn no_items_field_is_zero_results() {
        let body = r#"{"kind":"customsearch#search","searchInformation":{"totalResults":"0"}}"#;
        assert!(CustomSearchProvider::parse_payload(body).unwrap().is_empty());
    }

    #[test]
    fn error_object_is_upstream() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded"}}"#;
        match CustomSearchProvider::parse_payload(body) {
            Err(SourceUnavailable::Upstream(m)) => assert_eq!(m, "429 Quota exceeded"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn published_time_comes_from_metatags() {
        let body = r#"{"items":[{"title":"Edital de Música","link":"https://www.ba.gov.br/m",
            "snippet":"Inscrições abertas","pagemap":{"metatags":[{"article:published_time":"2024-11-20T10:00:00-03:00"}]}}]}"#;
        let items = CustomSearchProvider::parse_payload(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description.as_deref(), Some("Inscrições abertas"));
        assert!(items[0].published_at.is_some());
    }
}
