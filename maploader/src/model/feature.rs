//! Features, assets, and asset-type grouping.

use serde::Deserialize;
use serde_json::{Map, Value};

/// The features payload: a GeoJSON-shaped feature collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// A geographic record with one geometry and zero or more attached assets.
///
/// The geometry stays raw JSON here: a bad geometry must only cost its own
/// feature, so conversion happens per feature during materialization.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Value,

    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A typed attachment determining how its feature renders.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub asset_type: String,

    #[serde(default)]
    pub display_path: String,

    /// Any remaining asset metadata; copied onto the created layer as
    /// `asset_<key>` custom properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Features grouped by their primary asset type, in first-seen order.
///
/// Classification uses `assets[0].asset_type` only, regardless of any other
/// assets on the feature; this mirrors the backend's own behavior and is a
/// documented limitation, not a bug to fix. Features without assets are
/// excluded entirely.
#[derive(Debug, Default)]
pub struct AssetGroups {
    groups: Vec<(String, Vec<(Feature, Asset)>)>,
    total: usize,
}

impl AssetGroups {
    /// Group a feature collection by primary asset type.
    pub fn build(collection: &FeatureCollection) -> Self {
        let mut groups: Vec<(String, Vec<(Feature, Asset)>)> = Vec::new();
        let mut total = 0;

        for feature in &collection.features {
            let Some(primary) = feature.assets.first() else {
                continue;
            };
            let asset_type = primary.asset_type.clone();
            let slot = match groups.iter().position(|(t, _)| *t == asset_type) {
                Some(i) => i,
                None => {
                    groups.push((asset_type, Vec::new()));
                    groups.len() - 1
                }
            };
            groups[slot].1.push((feature.clone(), primary.clone()));
            total += 1;
        }

        Self { groups, total }
    }

    /// Total number of grouped features (assetless features excluded).
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate groups in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(Feature, Asset)])> {
        self.groups
            .iter()
            .map(|(t, items)| (t.as_str(), items.as_slice()))
    }
}

/// Human-readable, pluralized display name for an asset type.
///
/// Unknown types fall back to underscore-to-space Title Case.
pub fn display_name(asset_type: &str) -> String {
    match asset_type {
        "point_cloud" => "Point Clouds".to_string(),
        "image" => "Images".to_string(),
        "streetview" => "StreetView".to_string(),
        "video" => "Videos".to_string(),
        "questionnaire" => "Questionnaires".to_string(),
        "no_asset_vector" => "Vector Features".to_string(),
        other => title_case(other),
    }
}

fn title_case(raw: &str) -> String {
    raw.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.as_str().chars().flat_map(char::to_lowercase)).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
