//! Extents, coordinate reference systems, and extent aggregation.
//!
//! [`aggregate_extent`] walks a layer group tree and unions the extents of
//! every vector layer beneath it, reprojecting into the view's CRS where a
//! layer's native CRS differs. Raster/basemap layers never contribute: their
//! extents are typically global and would defeat zoom-to-data.
//!
//! The built-in [`WebMercatorReprojector`] covers the EPSG:4326 ⇄ EPSG:3857
//! pair; hosts with a full CRS engine inject their own [`Reprojector`].

use std::f64::consts::PI;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::layers::store::{GroupId, LayerKind, LayerNode, LayerStore};

/// Web Mercator latitude clamp, beyond which the projection diverges.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Earth radius used by the spherical Web Mercator projection, in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// An axis-aligned bounding box in some coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create an extent from explicit bounds.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An empty extent; unioning anything into it yields that thing.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// True when the extent contains no area and no point. A degenerate
    /// single-point extent (zero width and height) is *not* empty.
    pub fn is_empty(&self) -> bool {
        !(self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite())
            || self.min_x > self.max_x
            || self.min_y > self.max_y
    }

    /// Grow the extent to include the given position.
    pub fn expand_to(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Union with another extent in place.
    pub fn combine(&mut self, other: &Extent) {
        if other.is_empty() {
            return;
        }
        self.expand_to(other.min_x, other.min_y);
        self.expand_to(other.max_x, other.max_y);
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }
}

/// A coordinate reference system identifier, e.g. `EPSG:4326`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs(String);

impl Crs {
    pub fn new(authority_id: impl Into<String>) -> Self {
        Self(authority_id.into())
    }

    pub fn epsg(code: u32) -> Self {
        Self(format!("EPSG:{}", code))
    }

    /// WGS 84 geographic coordinates, the CRS all feature layers use.
    pub fn wgs84() -> Self {
        Self::epsg(4326)
    }

    /// Spherical Web Mercator, the usual map-canvas CRS.
    pub fn web_mercator() -> Self {
        Self::epsg(3857)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while reprojecting an extent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// No transform is available between the two systems.
    #[error("unsupported CRS pair: {from} -> {to}")]
    Unsupported { from: String, to: String },

    /// A coordinate falls outside the projection's valid domain.
    #[error("coordinate out of projection domain: {0}")]
    OutOfDomain(f64),
}

/// Transforms extents between coordinate reference systems.
///
/// Injected into [`aggregate_extent`] so the crate stays host-agnostic:
/// a host backed by a real CRS engine supplies its own implementation.
pub trait Reprojector {
    fn transform_extent(
        &self,
        extent: &Extent,
        from: &Crs,
        to: &Crs,
    ) -> Result<Extent, ProjectionError>;
}

/// Built-in reprojector covering EPSG:4326 ⇄ EPSG:3857 (plus identity).
#[derive(Debug, Default, Clone, Copy)]
pub struct WebMercatorReprojector;

impl WebMercatorReprojector {
    fn wgs84_to_mercator(x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if y.abs() > MAX_MERCATOR_LAT {
            return Err(ProjectionError::OutOfDomain(y));
        }
        let mx = EARTH_RADIUS_M * x.to_radians();
        let lat_rad = y.to_radians();
        let my = EARTH_RADIUS_M * (PI / 4.0 + lat_rad / 2.0).tan().ln();
        Ok((mx, my))
    }

    fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS_M).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}

impl Reprojector for WebMercatorReprojector {
    fn transform_extent(
        &self,
        extent: &Extent,
        from: &Crs,
        to: &Crs,
    ) -> Result<Extent, ProjectionError> {
        if from == to {
            return Ok(*extent);
        }

        let (wgs84, mercator) = (Crs::wgs84(), Crs::web_mercator());
        if *from == wgs84 && *to == mercator {
            let (min_x, min_y) = Self::wgs84_to_mercator(extent.min_x, extent.min_y)?;
            let (max_x, max_y) = Self::wgs84_to_mercator(extent.max_x, extent.max_y)?;
            Ok(Extent::new(min_x, min_y, max_x, max_y))
        } else if *from == mercator && *to == wgs84 {
            let (min_x, min_y) = Self::mercator_to_wgs84(extent.min_x, extent.min_y);
            let (max_x, max_y) = Self::mercator_to_wgs84(extent.max_x, extent.max_y);
            Ok(Extent::new(min_x, min_y, max_x, max_y))
        } else {
            Err(ProjectionError::Unsupported {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

/// Union the extents of all vector layers beneath `root`, reprojected into
/// `target_crs`.
///
/// Recurses through nested subgroups. Raster layers are skipped outright; a
/// vector layer whose extent is missing/empty contributes nothing; a layer
/// whose extent fails to reproject is logged and skipped. Returns `None`
/// when no layer contributed, in which case the caller leaves the view
/// untouched.
pub fn aggregate_extent<S: LayerStore + ?Sized>(
    store: &S,
    root: GroupId,
    target_crs: &Crs,
    reprojector: &dyn Reprojector,
) -> Option<Extent> {
    let mut total = Extent::empty();
    aggregate_group(store, root, target_crs, reprojector, &mut total);
    if total.is_empty() {
        None
    } else {
        Some(total)
    }
}

fn aggregate_group<S: LayerStore + ?Sized>(
    store: &S,
    group: GroupId,
    target_crs: &Crs,
    reprojector: &dyn Reprojector,
    total: &mut Extent,
) {
    for node in store.children(group) {
        match node {
            LayerNode::Group(child) => {
                aggregate_group(store, child, target_crs, reprojector, total)
            }
            LayerNode::Layer(layer) => {
                if store.layer_kind(layer) != Some(LayerKind::Vector) {
                    continue;
                }
                let Some(extent) = store.layer_extent(layer) else {
                    continue;
                };
                if extent.is_empty() {
                    continue;
                }
                let crs = store.layer_crs(layer).unwrap_or_else(Crs::wgs84);
                match reprojector.transform_extent(&extent, &crs, target_crs) {
                    Ok(projected) => {
                        debug!(layer = ?layer, "merged layer extent");
                        total.combine(&projected);
                    }
                    Err(e) => {
                        warn!(layer = ?layer, error = %e, "skipping layer extent: reprojection failed");
                    }
                }
            }
        }
    }
}
