//! Accumulation of step payloads across background-thread callbacks.

use serde_json::Value;

use super::types::FetchStep;

/// Raw payloads of the three steps, handed over once complete.
#[derive(Debug, Clone)]
pub struct StepResults {
    pub project: Value,
    pub basemap_layers: Value,
    pub features: Value,
}

/// Collects step payloads as they arrive on the UI thread. Materialization
/// starts only when all three steps are present; `take` then hands them
/// over and clears the store in one move.
#[derive(Debug, Default)]
pub struct StepResultStore {
    project: Option<Value>,
    basemap_layers: Option<Value>,
    features: Option<Value>,
}

impl StepResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one step's payload, replacing any earlier payload for the
    /// same step.
    pub fn insert(&mut self, step: FetchStep, payload: Value) {
        match step {
            FetchStep::Project => self.project = Some(payload),
            FetchStep::BasemapLayers => self.basemap_layers = Some(payload),
            FetchStep::Features => self.features = Some(payload),
        }
    }

    /// True once every step has reported.
    pub fn is_complete(&self) -> bool {
        self.project.is_some() && self.basemap_layers.is_some() && self.features.is_some()
    }

    /// Hand over all three payloads and clear the store. Returns `None`
    /// while any step is still missing (the store is left untouched).
    pub fn take(&mut self) -> Option<StepResults> {
        if !self.is_complete() {
            return None;
        }
        let (Some(project), Some(basemap_layers), Some(features)) = (
            self.project.take(),
            self.basemap_layers.take(),
            self.features.take(),
        ) else {
            return None;
        };
        Some(StepResults {
            project,
            basemap_layers,
            features,
        })
    }

    /// Drop any partial results, e.g. when a new load supersedes this one.
    pub fn clear(&mut self) {
        self.project = None;
        self.basemap_layers = None;
        self.features = None;
    }
}
