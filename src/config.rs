// src/config.rs
//! The monitor's configuration document: pipeline limits, keyword rules, sources
//! and an optional fallback list. TOML or JSON.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::config::SourceConfig;
use crate::model::{is_absolute_http_url, ClassifiedItem};
use crate::pipeline::PipelineSettings;
use crate::rules::RuleSet;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const ENV_MAX_ITEMS: &str = "MONITOR_MAX_ITEMS";
pub const ENV_WINDOW_DAYS: &str = "MONITOR_WINDOW_DAYS";

pub const DEFAULT_TOML_PATH: &str = "config/monitor.toml";
pub const DEFAULT_JSON_PATH: &str = "config/monitor.json";

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig::default()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Overrides the built-in fallback notices when non-empty.
    #[serde(default)]
    pub fallback: Vec<ClassifiedItem>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            rules: RuleSet::default(),
            sources: default_sources(),
            fallback: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load from an explicit path; the extension hints the format.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = Self::parse(&content, ext.as_str())
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH (must exist)
    /// 2) config/monitor.toml
    /// 3) config/monitor.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        match resolve_path()? {
            Some(p) => Self::load_from(&p),
            None => {
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        if hint_ext == "json" {
            return serde_json::from_str(s).map_err(|e| anyhow!("invalid JSON config: {e}"));
        }
        if hint_ext == "toml" {
            return toml::from_str(s).map_err(|e| anyhow!("invalid TOML config: {e}"));
        }
        // Unknown extension: sniff
        if s.trim_start().starts_with('{') {
            serde_json::from_str(s).map_err(|e| anyhow!("invalid JSON config: {e}"))
        } else {
            toml::from_str(s).map_err(|e| anyhow!("invalid TOML config: {e}"))
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(n) = parse_env_number(ENV_MAX_ITEMS) {
            match usize::try_from(n) {
                Ok(n) => self.pipeline.max_items = n,
                Err(_) => tracing::warn!(var = ENV_MAX_ITEMS, value = n, "out of range; ignoring"),
            }
        }
        if let Some(d) = parse_env_number(ENV_WINDOW_DAYS) {
            match u32::try_from(d) {
                Ok(d) => {
                    for s in &mut self.sources {
                        s.set_window_days(d);
                    }
                }
                Err(_) => tracing::warn!(var = ENV_WINDOW_DAYS, value = d, "out of range; ignoring"),
            }
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.pipeline.max_items == 0 {
            tracing::warn!("pipeline.max_items = 0 is not allowed; using the default");
            self.pipeline.max_items = PipelineSettings::default().max_items;
        }
        if self.pipeline.snippet_max_chars < 4 {
            bail!(
                "pipeline.snippet_max_chars must be at least 4 (got {})",
                self.pipeline.snippet_max_chars
            );
        }
        if self.sources.is_empty() {
            bail!("at least one [[sources]] entry is required");
        }
        for s in &self.sources {
            if s.window_days() == 0 {
                bail!("{} source: window_days must be at least 1", s.kind());
            }
        }
        for f in &self.fallback {
            if f.title.trim().is_empty() {
                bail!("fallback entry with an empty title");
            }
            if !is_absolute_http_url(&f.link) {
                bail!("fallback entry '{}' has an invalid link {}", f.title, f.link);
            }
        }
        Ok(())
    }
}

/// Path `load_default` would read, if any. Used to wire the rules hot reload.
pub fn resolve_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_env_number(var: &str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring non-numeric override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use std::env;

    const TOML_DOC: &str = r#"
[pipeline]
max_items = 4

[rules]
allow = ["educa", "teatro"]
block = ["hospital", " pm "]
default_category = "EDUCAÇÃO"

[[rules.categories]]
category = "CULTURA"
terms = ["teatro"]

[[sources]]
kind = "google_news"
query = "edital"

[[fallback]]
title = "Edital X"
category = "GENERAL"
link = "https://example.org/x"
"#;

    #[test]
    fn toml_document_parses_with_defaults() {
        let cfg = MonitorConfig::parse(TOML_DOC, "toml").unwrap();
        assert_eq!(cfg.pipeline.max_items, 4);
        assert_eq!(cfg.pipeline.snippet_max_chars, 100);
        assert_eq!(cfg.rules.block, vec!["hospital".to_string(), " pm ".to_string()]);
        assert_eq!(cfg.rules.categories[0].category, Category::Culture);
        assert_eq!(cfg.rules.default_category, Category::Education);
        assert_eq!(cfg.sources[0].kind(), "google_news");
        assert_eq!(cfg.fallback[0].category, Category::General);
    }

    #[test]
    fn json_document_parses() {
        let json = r#"{"rules":{"allow":["arte"]},"sources":[{"kind":"rss2json"}]}"#;
        let cfg = MonitorConfig::parse(json, "").unwrap();
        assert_eq!(cfg.rules.allow, vec!["arte".to_string()]);
        assert!(cfg.rules.block.is_empty());
        assert_eq!(cfg.pipeline.max_items, 6);
    }

    #[test]
    fn empty_document_is_the_builtin_monitor() {
        let cfg = MonitorConfig::parse("", "toml").unwrap();
        assert_eq!(cfg, MonitorConfig::default());
        assert!(cfg.rules.allow.contains(&"educa".to_string()));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = MonitorConfig::default();
        cfg.sources.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = MonitorConfig::default();
        cfg.pipeline.max_items = 0;
        cfg.validate().unwrap();
        assert_eq!(cfg.pipeline.max_items, 6);

        let mut cfg = MonitorConfig::parse(TOML_DOC, "toml").unwrap();
        cfg.fallback[0].link = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so the repo's own config/ does not interfere
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_MAX_ITEMS);

        // Nothing on disk -> built-in defaults
        let cfg = MonitorConfig::load_default().unwrap();
        assert_eq!(cfg.pipeline.max_items, 6);

        // config/monitor.toml is picked up
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join(DEFAULT_TOML_PATH), TOML_DOC).unwrap();
        assert_eq!(MonitorConfig::load_default().unwrap().pipeline.max_items, 4);

        // Env path wins, numeric override applies on top
        let p_json = tmp.path().join("other.json");
        fs::write(&p_json, r#"{"pipeline":{"max_items":2}}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_json.display().to_string());
        env::set_var(ENV_MAX_ITEMS, "3");
        assert_eq!(MonitorConfig::load_default().unwrap().pipeline.max_items, 3);

        // Env path that does not exist is an error
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(MonitorConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_MAX_ITEMS);
        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn oversized_window_override_is_ignored() {
        let mut cfg = MonitorConfig::default();
        let before: Vec<u32> = cfg.sources.iter().map(|s| s.window_days()).collect();

        // u32::MAX + 2 would wrap to 1 with a plain cast
        env::set_var(ENV_WINDOW_DAYS, "4294967297");
        cfg.apply_env_overrides();
        env::remove_var(ENV_WINDOW_DAYS);

        let after: Vec<u32> = cfg.sources.iter().map(|s| s.window_days()).collect();
        assert_eq!(after, before);
        assert!(after.iter().all(|d| *d > 1));
    }
}
