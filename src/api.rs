use chrono::{DateTime, Utc};
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::model::{Category, ClassifiedItem};
use crate::pipeline::{FeedStatus, ItemOrigin, Monitor, RefreshOutcome, Snapshot};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Monitor,
}

impl AppState {
    pub fn new(monitor: Monitor) -> Self {
        Self { monitor }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/editais", get(get_editais))
        .route("/editais/refresh", post(refresh_editais))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct ItemOut {
    title: String,
    category: Category,
    category_label: &'static str,
    link: String,
    published_at: Option<DateTime<Utc>>,
    published_label: Option<String>,
    snippet: Option<String>,
}

impl From<&ClassifiedItem> for ItemOut {
    fn from(it: &ClassifiedItem) -> Self {
        Self {
            title: it.title.clone(),
            category: it.category,
            category_label: it.category.label_pt(),
            link: it.link.clone(),
            published_at: it.published_at,
            published_label: it.published_label(),
            snippet: it.snippet.clone(),
        }
    }
}

#[derive(serde::Serialize)]
struct SnapshotOut {
    status: FeedStatus,
    origin: Option<ItemOrigin>,
    fetching: bool,
    items: Vec<ItemOut>,
    fetched_at: Option<DateTime<Utc>>,
    detail: Option<String>,
}

impl SnapshotOut {
    fn new(s: &Snapshot, fetching: bool) -> Self {
        Self {
            status: s.status,
            origin: s.origin,
            fetching,
            items: s.items.iter().map(ItemOut::from).collect(),
            fetched_at: s.fetched_at,
            detail: s.detail.clone(),
        }
    }
}

async fn get_editais(State(state): State<AppState>) -> Json<SnapshotOut> {
    let snap = state.monitor.snapshot();
    Json(SnapshotOut::new(&snap, state.monitor.is_fetching()))
}

async fn refresh_editais(State(state): State<AppState>) -> (StatusCode, Json<SnapshotOut>) {
    match state.monitor.refresh().await {
        RefreshOutcome::Completed(snap) => (StatusCode::OK, Json(SnapshotOut::new(&snap, false))),
        RefreshOutcome::AlreadyRunning(snap) => {
            (StatusCode::ACCEPTED, Json(SnapshotOut::new(&snap, true)))
        }
    }
}
