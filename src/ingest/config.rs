// src/ingest/config.rs
//! Source selection and per-backend settings (the `[[sources]]` entries).

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_QUERY: &str =
    r#"site:ba.gov.br (edital OR "inscrições abertas" OR seleção OR convocatória)"#;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_RESULT_HINT: u32 = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const ENV_RSS2JSON_API_KEY: &str = "RSS2JSON_API_KEY";
pub const ENV_GOOGLE_CSE_API_KEY: &str = "GOOGLE_CSE_API_KEY";

fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}
fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}
fn default_result_hint() -> u32 {
    DEFAULT_RESULT_HINT
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_hl() -> String {
    "pt-BR".to_string()
}
fn default_gl() -> String {
    "BR".to_string()
}
fn default_ceid() -> String {
    "BR:pt-419".to_string()
}
fn default_rss2json_endpoint() -> String {
    "https://api.rss2json.com/v1/api.json".to_string()
}
fn default_news_endpoint() -> String {
    "https://news.google.com/rss/search".to_string()
}
fn default_cse_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}
fn default_lr() -> Option<String> {
    Some("lang_pt".to_string())
}

/// Google News search parameters shared by the RSS-based backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSearch {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_hl")]
    pub hl: String,
    #[serde(default = "default_gl")]
    pub gl: String,
    #[serde(default = "default_ceid")]
    pub ceid: String,
    #[serde(default = "default_news_endpoint")]
    pub news_endpoint: String,
}

impl Default for NewsSearch {
    fn default() -> Self {
        Self {
            query: default_query(),
            window_days: default_window_days(),
            hl: default_hl(),
            gl: default_gl(),
            ceid: default_ceid(),
            news_endpoint: default_news_endpoint(),
        }
    }
}

impl NewsSearch {
    /// Query with the Google News recency operator appended (`when:30d`).
    pub fn query_with_window(&self) -> String {
        format!("{} when:{}d", self.query.trim(), self.window_days.max(1))
    }

    /// Full Google News RSS search URL.
    pub fn rss_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.news_endpoint,
            &[
                ("q", self.query_with_window()),
                ("hl", self.hl.clone()),
                ("gl", self.gl.clone()),
                ("ceid", self.ceid.clone()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rss2JsonConfig {
    #[serde(flatten)]
    pub search: NewsSearch,
    #[serde(default = "default_rss2json_endpoint")]
    pub endpoint: String,
    /// rss2json key; `"ENV"` reads `RSS2JSON_API_KEY`. The free tier works without one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Passed as `count` (only honored by rss2json with an API key).
    #[serde(default = "default_result_hint")]
    pub result_hint: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleNewsConfig {
    #[serde(flatten)]
    pub search: NewsSearch,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSearchConfig {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_result_hint")]
    pub result_hint: u32,
    #[serde(default = "default_cse_endpoint")]
    pub endpoint: String,
    /// API key; `"ENV"` reads `GOOGLE_CSE_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Programmable Search engine id.
    #[serde(default)]
    pub cx: Option<String>,
    #[serde(default = "default_lr")]
    pub lr: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One configured source; `kind` selects the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Rss2json(Rss2JsonConfig),
    GoogleNews(GoogleNewsConfig),
    CustomSearch(CustomSearchConfig),
}

impl Default for SourceConfig {
    /// The original monitor's source: Google News search through rss2json.
    fn default() -> Self {
        SourceConfig::Rss2json(Rss2JsonConfig {
            search: NewsSearch::default(),
            endpoint: default_rss2json_endpoint(),
            api_key: None,
            result_hint: default_result_hint(),
            timeout_secs: default_timeout_secs(),
        })
    }
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Rss2json(_) => "rss2json",
            SourceConfig::GoogleNews(_) => "google_news",
            SourceConfig::CustomSearch(_) => "custom_search",
        }
    }

    pub fn window_days(&self) -> u32 {
        match self {
            SourceConfig::Rss2json(c) => c.search.window_days,
            SourceConfig::GoogleNews(c) => c.search.window_days,
            SourceConfig::CustomSearch(c) => c.window_days,
        }
    }

    pub fn set_window_days(&mut self, days: u32) {
        match self {
            SourceConfig::Rss2json(c) => c.search.window_days = days,
            SourceConfig::GoogleNews(c) => c.search.window_days = days,
            SourceConfig::CustomSearch(c) => c.window_days = days,
        }
    }
}

/// Resolve an `"ENV"` placeholder (case-insensitive) against `env_var`.
/// Blank keys resolve to `None`.
pub fn resolve_secret(raw: Option<&str>, env_var: &str) -> Option<String> {
    let raw = raw?.trim();
    if raw.eq_ignore_ascii_case("env") {
        return std::env::var(env_var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
