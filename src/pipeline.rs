// src/pipeline.rs
//! Classification pipeline: fetch → rules → shape → cap, the four-state fetch cycle,
//! and the [`Monitor`] handle that owns the current state.
//!
//! Concurrency policy: one cycle at a time. A refresh requested while a cycle is in
//! flight is ignored and reports [`RefreshOutcome::AlreadyRunning`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::fallback::FallbackProvider;
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::SourceAdapter;
use crate::model::{ClassifiedItem, RawFeedItem};
use crate::rules::{RuleEngine, RulesHandle, Verdict};

pub const TITLE_SEPARATOR: &str = " - ";
pub const ELLIPSIS: &str = "...";

fn default_max_items() -> usize {
    6
}
fn default_snippet_max_chars() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Upper bound on live items per cycle.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Snippet length including the ellipsis marker.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            snippet_max_chars: default_snippet_max_chars(),
        }
    }
}

/* ----------------------------
Shaping
---------------------------- */

/// Cut a publisher suffix: `"Edital XYZ - Diário Oficial"` → `"Edital XYZ"`.
pub fn clean_title(title: &str) -> String {
    let t = title.trim();
    match t.split(TITLE_SEPARATOR).next().map(str::trim) {
        Some(head) if !head.is_empty() => head.to_string(),
        _ => t.to_string(),
    }
}

/// Bound `s` to `max_chars` characters, ellipsis included.
pub fn truncate_snippet(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.chars().count());
    let head: String = s.chars().take(keep).collect();
    format!("{}{}", head.trim_end(), ELLIPSIS)
}

fn shape(raw: &RawFeedItem, verdict: &Verdict, settings: &PipelineSettings) -> Option<ClassifiedItem> {
    let category = verdict.category()?;
    Some(ClassifiedItem {
        title: crate::ingest::cap_text(clean_title(&raw.title)),
        category,
        link: raw.link.clone(),
        published_at: raw.published_at,
        snippet: raw
            .description
            .as_deref()
            .map(|d| truncate_snippet(d, settings.snippet_max_chars))
            .filter(|s| !s.is_empty()),
    })
}

/// Pure pass over one fetch: keep accepted items in source order, stop at the cap.
pub fn classify(
    raw: &[RawFeedItem],
    engine: &RuleEngine,
    settings: &PipelineSettings,
) -> Vec<ClassifiedItem> {
    let mut out = Vec::with_capacity(raw.len().min(settings.max_items));
    let (mut blocked, mut no_match) = (0u64, 0u64);

    for item in raw {
        if out.len() >= settings.max_items {
            break;
        }
        let verdict = engine.evaluate_item(&item.title, item.description.as_deref());
        match shape(item, &verdict, settings) {
            Some(c) => out.push(c),
            None => match verdict.reason_label() {
                "blocked" => blocked += 1,
                _ => no_match += 1,
            },
        }
    }

    counter!("pipeline_kept_total").increment(out.len() as u64);
    counter!("pipeline_filtered_total", "reason" => "blocked").increment(blocked);
    counter!("pipeline_filtered_total", "reason" => "no_allow_match").increment(no_match);
    out
}

/* ----------------------------
Snapshot + state machine
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Idle,
    Loading,
    Success,
    Empty,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrigin {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The source answered with nothing usable.
    NoResults,
    /// The source had items but the rules rejected all of them.
    NoRelevantItems,
}

impl EmptyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EmptyReason::NoResults => "no_results",
            EmptyReason::NoRelevantItems => "no_relevant_items",
        }
    }
}

/// What the collaborator sees. Built only through the constructors below, which keep
/// status, origin and items consistent:
/// - `Success`: live items, at least one and at most `max_items`;
/// - `Empty` / `Failed`: the fallback list;
/// - `Loading`: whatever was shown before the fetch started;
/// - `Idle`: nothing fetched yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub status: FeedStatus,
    pub origin: Option<ItemOrigin>,
    pub items: Vec<ClassifiedItem>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Empty reason or failure kind; never raw error text.
    pub detail: Option<String>,
}

impl Snapshot {
    pub fn idle() -> Self {
        Self {
            status: FeedStatus::Idle,
            origin: None,
            items: Vec::new(),
            fetched_at: None,
            detail: None,
        }
    }

    fn success(items: Vec<ClassifiedItem>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            status: FeedStatus::Success,
            origin: Some(ItemOrigin::Live),
            items,
            fetched_at: Some(fetched_at),
            detail: None,
        }
    }

    fn empty(fallback: &FallbackProvider, reason: EmptyReason, fetched_at: DateTime<Utc>) -> Self {
        Self {
            status: FeedStatus::Empty,
            origin: Some(ItemOrigin::Fallback),
            items: fallback.items(),
            fetched_at: Some(fetched_at),
            detail: Some(reason.as_str().to_string()),
        }
    }

    fn failed(fallback: &FallbackProvider, kind: &str, fetched_at: DateTime<Utc>) -> Self {
        Self {
            status: FeedStatus::Failed,
            origin: Some(ItemOrigin::Fallback),
            items: fallback.items(),
            fetched_at: Some(fetched_at),
            detail: Some(kind.to_string()),
        }
    }

    /// Same items and origin, busy status.
    fn loading(&self) -> Self {
        Self {
            status: FeedStatus::Loading,
            ..self.clone()
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Some(ItemOrigin::Fallback)
    }
}

/// One full cycle. Never fails: source errors and empty results become fallback
/// snapshots.
pub async fn run_cycle(
    adapter: &dyn SourceAdapter,
    engine: &RuleEngine,
    settings: &PipelineSettings,
    fallback: &FallbackProvider,
) -> Snapshot {
    ensure_metrics_described();

    let fetched = adapter.fetch().await;
    let fetched_at = Utc::now();

    let snapshot = match fetched {
        Err(e) => Snapshot::failed(fallback, e.kind(), fetched_at),
        Ok(raw) if raw.is_empty() => Snapshot::empty(fallback, EmptyReason::NoResults, fetched_at),
        Ok(raw) => {
            let items = classify(&raw, engine, settings);
            debug!(target: "pipeline", raw = raw.len(), kept = items.len(), "classified");
            if items.is_empty() {
                Snapshot::empty(fallback, EmptyReason::NoRelevantItems, fetched_at)
            } else {
                Snapshot::success(items, fetched_at)
            }
        }
    };

    let status = status_label(snapshot.status);
    counter!("pipeline_cycles_total", "status" => status).increment(1);
    gauge!("pipeline_last_run_ts").set(fetched_at.timestamp() as f64);
    info!(
        target: "pipeline",
        source = adapter.name(),
        status,
        items = snapshot.items.len(),
        detail = ?snapshot.detail,
        "fetch cycle finished"
    );

    snapshot
}

fn status_label(s: FeedStatus) -> &'static str {
    match s {
        FeedStatus::Idle => "idle",
        FeedStatus::Loading => "loading",
        FeedStatus::Success => "success",
        FeedStatus::Empty => "empty",
        FeedStatus::Failed => "failed",
    }
}

/* ----------------------------
Monitor handle
---------------------------- */

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(Arc<Snapshot>),
    /// A cycle was already in flight; nothing was started.
    AlreadyRunning(Arc<Snapshot>),
}

impl RefreshOutcome {
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            RefreshOutcome::Completed(s) | RefreshOutcome::AlreadyRunning(s) => s,
        }
    }
}

struct Inner {
    adapter: Arc<dyn SourceAdapter>,
    rules: RulesHandle,
    settings: PipelineSettings,
    fallback: FallbackProvider,
    state: RwLock<Arc<Snapshot>>,
    in_flight: AtomicBool,
}

/// Everything a cycle needs, detached from the monitor so a background cycle
/// does not keep it alive.
struct CycleJob {
    adapter: Arc<dyn SourceAdapter>,
    engine: Arc<RuleEngine>,
    settings: PipelineSettings,
    fallback: FallbackProvider,
}

impl CycleJob {
    async fn run(self) -> Snapshot {
        run_cycle(self.adapter.as_ref(), &self.engine, &self.settings, &self.fallback).await
    }
}

/// Releases the in-flight flag. If the cycle never committed (future dropped),
/// the snapshot shown before the fetch is put back.
struct CycleGuard {
    inner: Weak<Inner>,
    previous: Arc<Snapshot>,
    committed: bool,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if !self.committed {
            inner.swap(self.previous.clone());
        }
        inner.in_flight.store(false, Ordering::Release);
    }
}

impl Inner {
    fn current(&self) -> Arc<Snapshot> {
        match self.state.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn swap(&self, next: Arc<Snapshot>) {
        match self.state.write() {
            Ok(mut g) => *g = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Enter LOADING, or hand back the current snapshot if a cycle is already in flight.
    fn begin(self: &Arc<Self>) -> Result<(CycleJob, CycleGuard), Arc<Snapshot>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(self.current());
        }
        let previous = self.current();
        self.swap(Arc::new(previous.loading()));
        let guard = CycleGuard {
            inner: Arc::downgrade(self),
            previous,
            committed: false,
        };

        let job = CycleJob {
            adapter: self.adapter.clone(),
            engine: self.rules.current(),
            settings: self.settings.clone(),
            fallback: self.fallback.clone(),
        };
        Ok((job, guard))
    }

    fn commit(&self, snapshot: Arc<Snapshot>, guard: &mut CycleGuard) {
        self.swap(snapshot);
        guard.committed = true;
    }
}

/// Cloneable handle over the pipeline and its current snapshot.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        rules: RulesHandle,
        settings: PipelineSettings,
        fallback: FallbackProvider,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter,
                rules,
                settings,
                fallback,
                state: RwLock::new(Arc::new(Snapshot::idle())),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.current()
    }

    pub fn rules(&self) -> &RulesHandle {
        &self.inner.rules
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle now, unless one is already in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (job, mut guard) = match self.inner.begin() {
            Ok(x) => x,
            Err(current) => {
                debug!(target: "pipeline", "refresh ignored: cycle already in flight");
                return RefreshOutcome::AlreadyRunning(current);
            }
        };
        let snapshot = Arc::new(job.run().await);
        self.inner.commit(snapshot.clone(), &mut guard);
        RefreshOutcome::Completed(snapshot)
    }

    /// Run one cycle in the background. The task only holds a weak reference: if
    /// every `Monitor` handle is dropped before the fetch returns, the result is
    /// discarded.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let started = match weak.upgrade() {
                Some(inner) => inner.begin(),
                None => return,
            };
            let (job, mut guard) = match started {
                Ok(x) => x,
                Err(_) => {
                    debug!(target: "pipeline", "background refresh ignored: cycle already in flight");
                    return;
                }
            };
            let snapshot = job.run().await;
            match weak.upgrade() {
                Some(inner) => inner.commit(Arc::new(snapshot), &mut guard),
                None => debug!(target: "pipeline", "monitor dropped during fetch; discarding result"),
            }
        })
    }

    /// Back to IDLE. Refused (returns false) while a cycle is in flight.
    pub fn reset(&self) -> bool {
        let inner = &self.inner;
        if inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        inner.swap(Arc::new(Snapshot::idle()));
        inner.in_flight.store(false, Ordering::Release);
        true
    }
}
