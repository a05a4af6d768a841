use std::path::PathBuf;

/// Core error type for the broadcast relay.
///
/// Delivery failures are not errors: the transport reports them as
/// [`crate::messaging::types::Outcome`] values so the dispatch loop never unwinds on a
/// single bad recipient. Only configuration problems are fatal, and only at
/// startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("recipient store unavailable: {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn store_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
