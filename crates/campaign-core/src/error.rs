use thiserror::Error;

use crate::storage::StoreError;

/// Failures that can end a turn.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Upstream completion failed: {0}")]
    Upstream(String),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed marker: {0}")]
    MalformedMarker(String),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Cancelled")]
    Cancelled,
}

impl TurnError {
    /// A single bad marker is dropped; everything else aborts the turn.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TurnError::MalformedMarker(_))
    }

    /// Whether the client should still be told about this failure.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, TurnError::ClientDisconnected | TurnError::Cancelled)
    }
}

impl From<StoreError> for TurnError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => TurnError::StoreUnavailable(msg),
        }
    }
}
