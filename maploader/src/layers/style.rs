//! Per-asset-type layer styling.
//!
//! Styles are declarative descriptions handed to the host alongside the
//! layer; rendering is the host's job.

/// Streetview line emphasis states the host may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreetviewVariant {
    Default,
    Select,
    Hover,
}

/// Declarative style attached to a vector layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerStyle {
    /// Point cloud footprint polygons: outline only, transparent fill.
    PointCloud {
        outline_color: &'static str,
        outline_width: f64,
    },
    /// Camera glyph for image point layers.
    CameraMarker { size: f64 },
    /// Streetview track lines, with per-variant width and opacity.
    StreetviewLine {
        color: &'static str,
        width: f64,
        opacity: f64,
    },
}

const POINT_CLOUD_OUTLINE: &str = "#3388ff";
const STREETVIEW_COLOR: &str = "#22C7FF";

impl LayerStyle {
    pub fn streetview(variant: StreetviewVariant) -> Self {
        let (width, opacity) = match variant {
            StreetviewVariant::Default => (2.5, 0.6),
            StreetviewVariant::Select => (3.0, 1.0),
            StreetviewVariant::Hover => (3.0, 0.8),
        };
        LayerStyle::StreetviewLine {
            color: STREETVIEW_COLOR,
            width,
            opacity,
        }
    }
}

/// Style for a layer holding assets of the given type. `None` means the
/// host's default symbology.
pub fn style_for_asset_type(asset_type: &str) -> Option<LayerStyle> {
    match asset_type {
        "point_cloud" => Some(LayerStyle::PointCloud {
            outline_color: POINT_CLOUD_OUTLINE,
            outline_width: 0.66,
        }),
        "image" => Some(LayerStyle::CameraMarker { size: 6.0 }),
        "streetview" => Some(LayerStyle::streetview(StreetviewVariant::Default)),
        _ => None,
    }
}
