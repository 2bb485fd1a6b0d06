use thiserror::Error;

use crate::types::RunStatus;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("no documents selected")]
    NoDocuments,
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} failed: {status} {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("{method} {url} decode failed: {message}")]
    Decode {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{0} is not set up")]
    NotReady(&'static str),
    #[error("run failed with status: {status}{}", suffix(.detail))]
    RunFailed {
        status: RunStatus,
        detail: Option<String>,
    },
    #[error("indexing failed with status: {0}")]
    IndexingFailed(String),
    #[error("gave up waiting after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("assistant reply contained no text")]
    EmptyReply,
}

fn suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, RagError>;
