// src/ingest/types.rs
use crate::error::SourceUnavailable;
use crate::model::RawFeedItem;

/// One external source. `Ok(vec![])` means "reachable but nothing usable";
/// transport/status/parse problems are `Err(SourceUnavailable)`.
///
/// Implementations perform at most one request per call and never retry.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>, SourceUnavailable>;
    fn name(&self) -> &str;
}

pub type DynSource = Box<dyn SourceAdapter>;
