//! Materializing fetched payloads into the host's layer tree.
//!
//! # Architecture
//!
//! - [`store`]: the [`LayerStore`] trait abstracting the host map
//!   application, plus the in-memory reference implementation.
//! - [`group`]: main project group lifecycle (create, tag, replace).
//! - [`materializer`]: basemap and feature layer construction under the
//!   main group, with batching and per-item failure isolation.
//! - [`style`]: declarative per-asset-type symbology.

pub mod group;
pub mod materializer;
pub mod store;
pub mod style;

pub use group::{
    create_main_group, remove_previous_group, MainGroup, INTERNAL_GROUP_ID_PROPERTY,
    PROJECT_UUID_PROPERTY,
};
pub use materializer::{
    add_basemap_layers, add_feature_layers, resolve_tile_url, MaterializeReport,
    LAYER_REGISTRATION_BATCH, POINT_FEATURE_BATCH,
};
pub use store::{
    GroupId, InMemoryLayerStore, LayerEntry, LayerError, LayerId, LayerKind, LayerNode,
    LayerStore, RasterLayerDef, VectorFeature, VectorLayer, VectorLayerDef,
};
pub use style::{style_for_asset_type, LayerStyle, StreetviewVariant};
