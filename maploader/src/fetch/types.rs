//! Fetch step, task state, and error types.

use std::fmt;

use thiserror::Error;

/// The three sequential fetch steps. Each later step needs an id produced
/// while handling the previous step's payload, so they never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStep {
    Project,
    BasemapLayers,
    Features,
}

impl FetchStep {
    pub const ALL: [FetchStep; 3] = [
        FetchStep::Project,
        FetchStep::BasemapLayers,
        FetchStep::Features,
    ];

    /// Human-readable description used in status and error messages.
    pub fn description(&self) -> &'static str {
        match self {
            FetchStep::Project => "project metadata",
            FetchStep::BasemapLayers => "map data (basemap/tile layers)",
            FetchStep::Features => "map data (features)",
        }
    }
}

impl fmt::Display for FetchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchStep::Project => "project",
            FetchStep::BasemapLayers => "basemap_layers",
            FetchStep::Features => "features",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of one load task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Done,
    Failed,
}

/// Terminal fetch failures. All of these end the load attempt; there are no
/// retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport or URL failure.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-200 status.
    #[error("server responded with status {0}")]
    Protocol(u16),

    /// Payload was not valid JSON (or not the expected shape).
    #[error("invalid JSON payload: {0}")]
    Decode(String),

    /// Parsed payload was empty or falsy.
    #[error("server returned an empty result")]
    EmptyPayload,
}
