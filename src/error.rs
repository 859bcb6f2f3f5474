// src/error.rs
//! Source failure taxonomy.
//!
//! Every variant means the same thing to the pipeline: the source is unavailable for
//! this cycle and the fallback list is served. The variants only exist for logs and the
//! short `detail` string shown to the collaborator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceUnavailable {
    /// Connect/timeout/body-read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Source answered with a non-2xx status.
    #[error("source returned HTTP {0}")]
    Status(u16),

    /// Payload could not be parsed as the expected feed/JSON shape.
    #[error("unparsable payload: {0}")]
    Payload(String),

    /// Source answered, but with its own error envelope (e.g. rss2json `status != "ok"`).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Adapter is configured without the credentials its endpoint requires.
    #[error("missing credentials for {0}")]
    MissingCredentials(&'static str),

    /// Every source of a multi-source adapter failed.
    #[error("all {0} sources failed")]
    AllSourcesFailed(usize),
}

impl SourceUnavailable {
    pub fn payload(msg: impl std::fmt::Display) -> Self {
        Self::Payload(msg.to_string())
    }

    /// Short, user-safe label for the snapshot `detail` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status(_) => "http_status",
            Self::Payload(_) => "payload",
            Self::Upstream(_) => "upstream",
            Self::MissingCredentials(_) => "credentials",
            Self::AllSourcesFailed(_) => "all_sources_failed",
        }
    }
}
