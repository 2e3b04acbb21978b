//! Recorder error taxonomy.

use crate::recorder::RecorderState;
use crate::source::SourceError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a [`QuantitySampleRecorder`](crate::QuantitySampleRecorder).
///
/// Every variant except `InvalidState` is terminal for the recorder instance;
/// retrying means constructing a new recorder.
#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    /// The output directory is missing, not a directory, or not writable.
    #[error("output directory {} is not usable: {reason}", path.display())]
    OutputDirectory { path: PathBuf, reason: String },

    /// The quantity type, unit, step or a delivered sample violates the
    /// recorder's configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The data source refused or failed to open the subscription.
    #[error("subscription failed: {0}")]
    Subscription(#[from] SourceError),

    /// The data file could not be opened, written or closed.
    #[error("failed to persist samples to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The operation is not allowed in the recorder's current state.
    #[error("recorder is {actual}, expected {expected}")]
    InvalidState {
        expected: RecorderState,
        actual: RecorderState,
    },
}

impl RecorderError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecorderError::Persistence {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Whether this error ends the recorder's life.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecorderError::InvalidState { .. })
    }
}
