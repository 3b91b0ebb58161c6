use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;

/// Every recoverable failure the monitor reports to its caller.
///
/// Rate gaps during playback and no-op controls (play without a signal,
/// stop while idle) are deliberately absent: they surface as `Option`/`bool`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// Malformed or missing waveform.
    #[error("invalid waveform: {0}")]
    Input(String),
    /// Cutoff, order or sampling rate rejected by the filter design.
    #[error("filter configuration rejected: {0}")]
    FilterConfig(String),
    /// The loader could not produce a waveform from the file.
    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Derived data no longer agrees with the waveform it came from.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
    #[error("no signal loaded")]
    NoSignal,
    #[error("monitor worker has shut down")]
    Disconnected,
}

impl MonitorError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MonitorError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
