// src/rules.rs
//! Keyword rule engine: blocklist first, then allowlist (default-deny), then an
//! ordered category pass over the same text. Pure; the only state is the term lists.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::model::Category;

pub const ENV_RULES_DEV_LOG: &str = "RULES_DEV_LOG";
pub const ENV_RULES_HOT_RELOAD: &str = "RULES_HOT_RELOAD";

// Dev gate: flag=1 AND dev env (debug build or SHUTTLE_ENV in {local,development,dev})
fn dev_flag_enabled(var: &str) -> bool {
    let on = std::env::var(var).ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/* ----------------------------
Config schema
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    pub terms: Vec<String>,
}

/// Keyword lists as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
    /// Checked in order; first rule with a matching term wins.
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    #[serde(default = "default_category")]
    pub default_category: Category,
}

fn default_category() -> Category {
    Category::Education
}

impl Default for RuleSet {
    /// Rules of the Bahia culture/education monitor.
    fn default() -> Self {
        let list = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            allow: list(&[
                "cultura",
                "arte",
                "educa",
                "escol",
                "professor",
                "pedagog",
                "paulo gustavo",
                "aldir blanc",
                "audiovisual",
                "leitura",
                "patrimônio",
                "museu",
                "teatro",
                "dança",
                "música",
                "ensino",
            ]),
            block: list(&[
                "polícia",
                "militar",
                " pm ",
                "bombeiro",
                "segurança pública",
                "detran",
                "cpa",
                "armas",
                "viatura",
                "presídio",
                "penal",
                "embasa",
                "coelba",
                "asfalto",
                "pavimentação",
                "drenagem",
                "obra",
                "engenharia",
                "saúde",
                "hospital",
                "médico",
                "enfermagem",
            ]),
            categories: vec![CategoryRule {
                category: Category::Culture,
                terms: list(&["cultura", "arte", "paulo gustavo", "aldir blanc"]),
            }],
            default_category: Category::Education,
        }
    }
}

/* ----------------------------
Verdict
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A blocklist term matched; carries the (lower-cased) term.
    Blocked { term: String },
    /// No allowlist term matched.
    NoAllowMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Rejected(Rejection),
    Accepted(Category),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Verdict::Accepted(c) => Some(*c),
            Verdict::Rejected(_) => None,
        }
    }

    pub(crate) fn reason_label(&self) -> &'static str {
        match self {
            Verdict::Accepted(_) => "accepted",
            Verdict::Rejected(Rejection::Blocked { .. }) => "blocked",
            Verdict::Rejected(Rejection::NoAllowMatch) => "no_allow_match",
        }
    }
}

/// Build the text the rules run against: `title + " " + description`, lower-cased,
/// whitespace collapsed. Inputs are the plain text held by [`RawFeedItem`]; markup is
/// not stripped again and nothing is truncated. A missing description counts as empty.
///
/// [`RawFeedItem`]: crate::model::RawFeedItem
pub fn normalize_match_text(title: &str, description: Option<&str>) -> String {
    let joined = format!("{} {}", title, description.unwrap_or_default());
    crate::ingest::collapse_whitespace(&joined).to_lowercase()
}

/* ----------------------------
Engine
---------------------------- */

#[derive(Debug, Clone)]
struct CompiledCategory {
    category: Category,
    terms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    allow: Vec<String>,
    block: Vec<String>,
    categories: Vec<CompiledCategory>,
    default_category: Category,
}

/// Lower-case, drop blank entries, dedup. Terms are not trimmed: a padded term such
/// as `" pm "` only matches the standalone word.
fn compile_terms(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        if it.trim().is_empty() {
            continue;
        }
        let t = it.to_lowercase();
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn first_match<'a>(text: &str, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .find(|t| text.contains(t.as_str()))
        .map(|t| t.as_str())
}

impl RuleEngine {
    pub fn new(rules: &RuleSet) -> Self {
        let categories = rules
            .categories
            .iter()
            .map(|c| CompiledCategory {
                category: c.category,
                terms: compile_terms(&c.terms),
            })
            .collect();
        Self {
            allow: compile_terms(&rules.allow),
            block: compile_terms(&rules.block),
            categories,
            default_category: rules.default_category,
        }
    }

    /// Evaluate already-normalized text (see [`normalize_match_text`]).
    pub fn evaluate(&self, text: &str) -> Verdict {
        // 1) Blocklist wins over everything
        if let Some(term) = first_match(text, &self.block) {
            return Verdict::Rejected(Rejection::Blocked {
                term: term.to_string(),
            });
        }

        // 2) Default-deny: at least one allowlist term (empty allowlist accepts nothing)
        if first_match(text, &self.allow).is_none() {
            return Verdict::Rejected(Rejection::NoAllowMatch);
        }

        // 3) Category pass over the same text
        let category = self
            .categories
            .iter()
            .find(|c| first_match(text, &c.terms).is_some())
            .map(|c| c.category)
            .unwrap_or(self.default_category);
        Verdict::Accepted(category)
    }

    /// Convenience: normalize and evaluate a title/description pair.
    pub fn evaluate_item(&self, title: &str, description: Option<&str>) -> Verdict {
        let text = normalize_match_text(title, description);
        let verdict = self.evaluate(&text);
        if dev_flag_enabled(ENV_RULES_DEV_LOG) {
            debug!(
                target: "rules",
                verdict = verdict.reason_label(),
                category = ?verdict.category(),
                title = %title,
                "rule verdict"
            );
        }
        verdict
    }

    pub fn allow_terms(&self) -> &[String] {
        &self.allow
    }

    pub fn block_terms(&self) -> &[String] {
        &self.block
    }
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared handle; the pipeline takes one engine snapshot per cycle.
#[derive(Clone)]
pub struct RulesHandle {
    inner: Arc<RwLock<Arc<RuleEngine>>>,
}

impl RulesHandle {
    pub fn new(engine: RuleEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(engine))),
        }
    }

    pub fn current(&self) -> Arc<RuleEngine> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, engine: RuleEngine) {
        match self.inner.write() {
            Ok(mut g) => *g = Arc::new(engine),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(engine),
        }
    }
}

/// Poll `path` every 2s and swap in the `[rules]` section when the file changes.
/// Dev-only: requires `RULES_HOT_RELOAD=1`. A file that fails to parse keeps the
/// current rules.
pub fn start_hot_reload_thread(handle: RulesHandle, path: PathBuf) {
    if !dev_flag_enabled(ENV_RULES_HOT_RELOAD) {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => false,
                    Some(prev) => mtime > prev,
                };
                last_mtime = Some(mtime);
                if changed {
                    match crate::config::MonitorConfig::load_from(&path) {
                        Ok(cfg) => {
                            handle.replace(RuleEngine::new(&cfg.rules));
                            tracing::info!(target: "rules", path = %path.display(), "rules reloaded");
                        }
                        Err(e) => {
                            warn!(target: "rules", error = ?e, "rules reload failed; keeping previous rules");
                        }
                    }
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic() -> RuleSet {
        RuleSet {
            allow: vec!["educa".into(), "teatro".into(), "arte".into()],
            block: vec!["hospital".into(), " pm ".into()],
            categories: vec![CategoryRule {
                category: Category::Culture,
                terms: vec!["teatro".into(), "arte".into()],
            }],
            default_category: Category::Education,
        }
    }

    #[test]
    fn block_takes_precedence_over_allow() {
        let e = RuleEngine::new(&synthetic());
        let v = e.evaluate_item("Edital de educação", Some("Contratação para o Hospital Geral"));
        assert_eq!(
            v,
            Verdict::Rejected(Rejection::Blocked {
                term: "hospital".into()
            })
        );
        assert_eq!(v.category(), None);
    }

    #[test]
    fn default_deny_without_allow_match() {
        let e = RuleEngine::new(&synthetic());
        let v = e.evaluate_item("Licitação de mobiliário", None);
        assert_eq!(v, Verdict::Rejected(Rejection::NoAllowMatch));
    }

    #[test]
    fn empty_allowlist_fails_closed() {
        let mut rs = synthetic();
        rs.allow.clear();
        let e = RuleEngine::new(&rs);
        assert!(!e.evaluate_item("Edital de teatro e educação", None).is_accepted());
    }

    #[test]
    fn category_pass_first_match_then_default() {
        let e = RuleEngine::new(&synthetic());
        assert_eq!(
            e.evaluate_item("Festival de Teatro", None).category(),
            Some(Category::Culture)
        );
        assert_eq!(
            e.evaluate_item("Programa de Educação Integral", None).category(),
            Some(Category::Education)
        );
    }

    #[test]
    fn padded_terms_keep_their_spaces() {
        let e = RuleEngine::new(&synthetic());
        // "pm" inside a word must not block
        assert!(e.evaluate_item("Arte e empmreendedorismo", None).is_accepted());
        assert!(!e.evaluate_item("Arte na escola com apoio da PM local", None).is_accepted());
    }

    #[test]
    fn matching_is_case_insensitive_and_unicode_aware() {
        let e = RuleEngine::new(&RuleSet::default());
        let v = e.evaluate_item("SELEÇÃO PARA PROFESSORES DE MÚSICA", None);
        assert!(v.is_accepted(), "{v:?}");
        let v = e.evaluate_item("Concurso da POLÍCIA Militar", Some("arte"));
        assert!(!v.is_accepted());
    }

    #[test]
    fn evaluate_is_deterministic() {
        let e = RuleEngine::new(&RuleSet::default());
        let text = normalize_match_text("Edital Aldir Blanc", Some("cultura popular"));
        assert_eq!(e.evaluate(&text), e.evaluate(&text));
    }

    #[test]
    fn blank_terms_are_dropped_and_duplicates_merged() {
        let rs = RuleSet {
            allow: vec!["Educa".into(), "educa".into(), "   ".into(), "".into()],
            ..synthetic()
        };
        let e = RuleEngine::new(&rs);
        assert_eq!(e.allow_terms(), &["educa".to_string()]);
        assert_eq!(e.block_terms(), &["hospital".to_string(), " pm ".to_string()]);
    }

    #[test]
    fn handle_swaps_engine() {
        let h = RulesHandle::new(RuleEngine::new(&synthetic()));
        assert!(h.current().evaluate_item("Teatro", None).is_accepted());
        let mut rs = synthetic();
        rs.block.push("teatro".into());
        h.replace(RuleEngine::new(&rs));
        assert!(!h.current().evaluate_item("Teatro", None).is_accepted());
    }
}
