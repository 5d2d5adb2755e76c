//! Basemap/tile-server descriptors.

use serde::Deserialize;
use serde_json::Value;

/// One tile-server entry from the basemap payload. Consumed once during
/// materialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BasemapLayerDescriptor {
    pub name: String,

    /// Tile service URL, possibly carrying a `{s}` subdomain placeholder
    /// and possibly not yet in `{z}/{x}/{y}` templated form.
    pub url: String,

    /// Declared service type, e.g. `tms` or `arcgis`.
    #[serde(rename = "type")]
    pub layer_type: String,

    #[serde(default, rename = "uiOptions")]
    pub ui_options: UiOptions,

    /// Opaque per-service tile options; carried through untouched.
    #[serde(default, rename = "tileOptions")]
    pub tile_options: Option<Value>,
}

/// Presentation options attached to a basemap entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UiOptions {
    /// Stacking position; lower means lower in the stack. Absent = 0.
    #[serde(default, rename = "zIndex")]
    pub z_index: i64,

    /// Layer opacity in [0, 1]. Absent = fully opaque.
    #[serde(default = "opaque")]
    pub opacity: f64,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            z_index: 0,
            opacity: 1.0,
        }
    }
}

fn opaque() -> f64 {
    1.0
}
