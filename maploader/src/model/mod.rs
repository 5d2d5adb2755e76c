//! Wire types for the three backend payloads.
//!
//! Mirrors what the project endpoints actually return: a list of project
//! records, a list of basemap/tile-server descriptors, and a feature
//! collection whose features carry typed assets.

mod basemap;
mod feature;
mod project;

pub use basemap::{BasemapLayerDescriptor, UiOptions};
pub use feature::{display_name, Asset, AssetGroups, Feature, FeatureCollection};
pub use project::ProjectDescriptor;
