//! Turning fetched payloads into layers under the main group.
//!
//! Two distinct shapes come out of one feature collection:
//!
//! - image/video/streetview assets are points, and many of them. They all go
//!   into one shared multipoint layer per asset type, appended in batches of
//!   [`POINT_FEATURE_BATCH`].
//! - everything else (point clouds, questionnaires, plain vectors) gets one
//!   layer per feature, collected under a per-type subgroup and registered
//!   with the host in batches of [`LAYER_REGISTRATION_BATCH`] with refresh
//!   notifications suppressed.
//!
//! A bad geometry or a layer the host refuses never aborts the load. The
//! offending item is logged and skipped, and everything else still lands.
//!
//! Layers and subgroups are always inserted at index 0, so within a group
//! the last item processed ends up on top.

use serde_json::Value;
use tracing::warn;

use super::store::{
    GroupId, LayerStore, RasterLayerDef, VectorFeature, VectorLayer, VectorLayerDef,
};
use super::style::style_for_asset_type;
use crate::extent::Crs;
use crate::geometry::geometry_from_geojson;
use crate::model::{display_name, Asset, AssetGroups, BasemapLayerDescriptor, Feature, FeatureCollection};
use crate::pacer::{Progress, UiPacer};

/// Features appended per provider round trip on shared point layers.
pub const POINT_FEATURE_BATCH: usize = 200;

/// Layers registered per host round trip on the per-feature path.
pub const LAYER_REGISTRATION_BATCH: usize = 50;

pub const BASEMAP_MIN_ZOOM: u8 = 0;
pub const BASEMAP_MAX_ZOOM: u8 = 22;

/// Asset types sharing one point layer per type.
const SHARED_POINT_TYPES: [&str; 3] = ["image", "video", "streetview"];

const FEATURE_FIELDS: [&str; 2] = ["asset_type", "display_path"];

/// Counts from one materialization pass, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeReport {
    pub basemaps_added: usize,
    pub basemaps_skipped: usize,
    pub features_processed: usize,
    pub items_skipped: usize,
}

/// Resolve a basemap descriptor's URL into an XYZ tile template, or `None`
/// when the layer type is unsupported.
///
/// The `{s}` subdomain placeholder is pinned to `a`; URLs not already in
/// XYZ template form get the ArcGIS-style `/tile/{z}/{y}/{x}` suffix.
pub fn resolve_tile_url(url: &str, layer_type: &str) -> Option<String> {
    let url = url.replace("{s}", "a");
    let supported = layer_type == "tms" || (layer_type == "arcgis" && url.contains("/tiles/"));
    if !supported {
        return None;
    }
    if url.ends_with("/tile/{z}/{y}/{x}") || url.contains("{z}/{x}/{y}") {
        Some(url)
    } else {
        Some(format!("{}/tile/{{z}}/{{y}}/{{x}}", url.trim_end_matches('/')))
    }
}

/// Register the basemap layers under `main_group`, lowest `zIndex` first.
///
/// Front-insertion makes the stacking order come out right: the highest
/// `zIndex` is processed last and lands on top. Unsupported layer types and
/// layers the host rejects are logged and skipped.
pub fn add_basemap_layers(
    store: &mut dyn LayerStore,
    main_group: GroupId,
    layers: &[BasemapLayerDescriptor],
    pacer: &mut UiPacer,
    report: &mut MaterializeReport,
) {
    let mut sorted: Vec<&BasemapLayerDescriptor> = layers.iter().collect();
    sorted.sort_by_key(|l| l.ui_options.z_index);
    let total = sorted.len();

    pacer.update("Adding basemap layers", Progress::Busy, true);

    for (i, descriptor) in sorted.iter().enumerate() {
        let Some(url_template) = resolve_tile_url(&descriptor.url, &descriptor.layer_type) else {
            warn!(
                name = %descriptor.name,
                layer_type = %descriptor.layer_type,
                "skipping unsupported basemap layer type"
            );
            report.basemaps_skipped += 1;
            continue;
        };

        let def = RasterLayerDef {
            name: descriptor.name.clone(),
            url_template,
            min_zoom: BASEMAP_MIN_ZOOM,
            max_zoom: BASEMAP_MAX_ZOOM,
            opacity: descriptor.ui_options.opacity,
        };
        let layer = match store.register_raster_layer(&def) {
            Ok(layer) => layer,
            Err(e) => {
                warn!(name = %descriptor.name, error = %e, "failed to load basemap layer");
                report.basemaps_skipped += 1;
                continue;
            }
        };
        if let Err(e) = store.insert_layer(main_group, 0, layer) {
            warn!(name = %descriptor.name, error = %e, "failed to insert basemap layer");
            report.basemaps_skipped += 1;
            continue;
        }

        report.basemaps_added += 1;
        let pct = (i * 100 / total.max(1)) as u8;
        pacer.update("Adding basemap layers", Progress::Percent(pct), false);
    }
}

/// Materialize the feature collection under `main_group`, grouped by each
/// feature's first asset's type. Fires `on_complete` exactly once at the
/// end, whatever happened along the way.
pub fn add_feature_layers(
    store: &mut dyn LayerStore,
    main_group: GroupId,
    collection: &FeatureCollection,
    pacer: &mut UiPacer,
    report: &mut MaterializeReport,
    mut on_complete: Option<&mut dyn FnMut()>,
) {
    pacer.update("Preparing feature layers", Progress::Busy, true);

    let groups = AssetGroups::build(collection);
    let total_items = groups.total();

    for (asset_type, items) in groups.iter() {
        if items.is_empty() {
            continue;
        }
        pacer.update(&format!("Processing {}", asset_type), Progress::Busy, true);

        if SHARED_POINT_TYPES.contains(&asset_type) {
            add_shared_point_layer(store, main_group, asset_type, items, pacer, report);
        } else {
            add_per_feature_layers(
                store, main_group, asset_type, items, total_items, pacer, report,
            );
        }
    }

    if let Some(callback) = on_complete.take() {
        callback();
    }
}

/// One multipoint layer holding every item of a point-style asset type.
fn add_shared_point_layer(
    store: &mut dyn LayerStore,
    main_group: GroupId,
    asset_type: &str,
    items: &[(Feature, Asset)],
    pacer: &mut UiPacer,
    report: &mut MaterializeReport,
) {
    let layer = VectorLayer {
        def: VectorLayerDef {
            name: display_name(asset_type),
            crs: Crs::wgs84(),
            fields: FEATURE_FIELDS.iter().map(|f| f.to_string()).collect(),
        },
        features: Vec::new(),
        style: style_for_asset_type(asset_type),
        properties: asset_properties(&items[0].1),
    };
    let layer_id = match store.register_vector_layers(vec![layer]) {
        Ok(ids) => ids[0],
        Err(e) => {
            warn!(asset_type = %asset_type, error = %e, "failed to create shared point layer");
            report.items_skipped += items.len();
            return;
        }
    };

    let total = items.len();
    let mut done = 0;
    for chunk in items.chunks(POINT_FEATURE_BATCH) {
        let mut batch = Vec::with_capacity(chunk.len());
        for (feature, asset) in chunk {
            match point_feature(feature, asset) {
                Some(f) => batch.push(f),
                None => report.items_skipped += 1,
            }
        }
        if !batch.is_empty() {
            if let Err(e) = store.append_features(layer_id, batch) {
                warn!(asset_type = %asset_type, error = %e, "failed to append feature batch");
            }
        }

        done = (done + chunk.len()).min(total);
        let pct = (done * 100 / total.max(1)) as u8;
        pacer.update(
            &format!("Processing {} features... ({}/{})", asset_type, done, total),
            Progress::Percent(pct),
            false,
        );
    }

    if let Err(e) = store.insert_layer(main_group, 0, layer_id) {
        warn!(asset_type = %asset_type, error = %e, "failed to insert shared point layer");
        return;
    }
    report.features_processed += total;
    pacer.update(
        &format!("Completed {} layer insertion", asset_type),
        Progress::Percent(100),
        true,
    );
}

/// One layer per feature, registered in batches under a per-type subgroup
/// with host notifications suppressed for the duration.
fn add_per_feature_layers(
    store: &mut dyn LayerStore,
    main_group: GroupId,
    asset_type: &str,
    items: &[(Feature, Asset)],
    total_items: usize,
    pacer: &mut UiPacer,
    report: &mut MaterializeReport,
) {
    let subgroup = store.create_group(&display_name(asset_type));
    if let Err(e) = store.insert_group(main_group, 0, subgroup) {
        warn!(asset_type = %asset_type, error = %e, "failed to insert subgroup");
        report.items_skipped += items.len();
        return;
    }

    store.set_notifications_enabled(false);

    let total = items.len();
    let mut batch: Vec<VectorLayer> = Vec::new();
    for (i, (feature, asset)) in items.iter().enumerate() {
        match per_feature_layer(feature, asset, asset_type) {
            Some(layer) => batch.push(layer),
            None => report.items_skipped += 1,
        }

        if batch.len() >= LAYER_REGISTRATION_BATCH || i + 1 == total {
            flush_layer_batch(store, subgroup, &mut batch, asset_type);
        }

        report.features_processed += 1;
        let pct = (report.features_processed * 100 / total_items.max(1)).min(100) as u8;
        pacer.update(
            &format!("Processing {}... ({}/{})", asset_type, i + 1, total),
            Progress::Percent(pct),
            false,
        );
    }

    store.set_notifications_enabled(true);
    pacer.update(
        &format!("Completed {} layers", asset_type),
        Progress::Percent(100),
        true,
    );
}

fn flush_layer_batch(
    store: &mut dyn LayerStore,
    subgroup: GroupId,
    batch: &mut Vec<VectorLayer>,
    asset_type: &str,
) {
    if batch.is_empty() {
        return;
    }
    match store.register_vector_layers(std::mem::take(batch)) {
        Ok(ids) => {
            for id in ids {
                if let Err(e) = store.insert_layer(subgroup, 0, id) {
                    warn!(asset_type = %asset_type, error = %e, "failed to insert feature layer");
                }
            }
        }
        Err(e) => {
            warn!(asset_type = %asset_type, error = %e, "failed to register feature layer batch");
        }
    }
}

fn point_feature(feature: &Feature, asset: &Asset) -> Option<VectorFeature> {
    let geometry = match geometry_from_geojson(&feature.geometry) {
        Ok(g) => g,
        Err(e) => {
            warn!(asset_type = %asset.asset_type, error = %e, "skipping bad geometry");
            return None;
        }
    };
    Some(VectorFeature {
        geometry: geometry.into_multi(),
        attributes: feature_attributes(asset),
    })
}

fn per_feature_layer(feature: &Feature, asset: &Asset, asset_type: &str) -> Option<VectorLayer> {
    let geometry = match geometry_from_geojson(&feature.geometry) {
        Ok(g) => g,
        Err(e) => {
            warn!(asset_type = %asset_type, error = %e, "skipping bad geometry");
            return None;
        }
    };
    let name = if asset.display_path.is_empty() {
        format!("Unnamed {}", asset_type)
    } else {
        asset.display_path.clone()
    };
    Some(VectorLayer {
        def: VectorLayerDef {
            name,
            crs: Crs::wgs84(),
            fields: FEATURE_FIELDS.iter().map(|f| f.to_string()).collect(),
        },
        features: vec![VectorFeature {
            geometry,
            attributes: feature_attributes(asset),
        }],
        style: style_for_asset_type(asset_type),
        properties: asset_properties(asset),
    })
}

fn feature_attributes(asset: &Asset) -> Vec<String> {
    vec![asset.asset_type.clone(), asset.display_path.clone()]
}

/// Every asset field becomes an `asset_`-prefixed custom property.
fn asset_properties(asset: &Asset) -> Vec<(String, String)> {
    let mut properties = vec![
        ("asset_asset_type".to_string(), asset.asset_type.clone()),
        ("asset_display_path".to_string(), asset.display_path.clone()),
    ];
    for (key, value) in &asset.extra {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        properties.push((format!("asset_{}", key), rendered));
    }
    properties
}
