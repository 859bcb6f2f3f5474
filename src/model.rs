// src/model.rs
//! Core data model: raw items as received from a source and classified items as served.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of display categories assigned by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[serde(alias = "CULTURA", alias = "culture", alias = "cultura")]
    Culture,
    #[serde(
        alias = "EDUCAÇÃO",
        alias = "EDUCACAO",
        alias = "education",
        alias = "educação",
        alias = "educacao"
    )]
    Education,
    #[serde(alias = "GERAL", alias = "general", alias = "geral")]
    General,
}

impl Category {
    /// Label shown on the site cards.
    pub fn label_pt(self) -> &'static str {
        match self {
            Category::Culture => "CULTURA",
            Category::Education => "EDUCAÇÃO",
            Category::General => "GERAL",
        }
    }
}

/// One item as received from a source, after normalization.
///
/// Only adapters build these, through [`RawFeedItem::from_parts`], so the title is
/// never empty and the link is always an absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeedItem {
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl RawFeedItem {
    /// Validate and build an item. Returns `None` for a missing/blank title or a link
    /// that is not an absolute http(s) URL; callers skip those items.
    pub fn from_parts(
        title: Option<&str>,
        description: Option<&str>,
        link: Option<&str>,
        published_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let title = crate::ingest::normalize_text(title?);
        if title.is_empty() {
            return None;
        }
        let link = link?.trim();
        if !is_absolute_http_url(link) {
            return None;
        }
        let description = description
            .map(crate::ingest::normalize_text)
            .filter(|d| !d.is_empty());

        Some(Self {
            title,
            description,
            link: link.to_string(),
            published_at,
        })
    }
}

pub(crate) fn is_absolute_http_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Display-ready item produced by the pipeline (or by the fallback provider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub title: String,
    pub category: Category,
    pub link: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl ClassifiedItem {
    /// `dd/mm/yyyy`, the way the site prints dates.
    pub fn published_label(&self) -> Option<String> {
        self.published_at
            .map(|dt| dt.format("%d/%m/%Y").to_string())
    }
}
