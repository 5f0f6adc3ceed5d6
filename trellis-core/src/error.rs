//! Error types.

use thiserror::Error;

use crate::boundary::BoundaryId;

/// Errors surfaced by the host API and completion handles.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host is running a phase; the call came from inside it.
    #[error("host is busy running a refresh phase")]
    Busy,

    /// The host was destroyed before the awaited phase ran.
    #[error("refresh cancelled")]
    Cancelled,

    #[error("unknown boundary {0:?}")]
    UnknownBoundary(BoundaryId),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Invalid host settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),
}
