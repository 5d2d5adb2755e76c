//! Host-agnostic layer tree access.
//!
//! The crate never talks to a concrete map canvas. Everything it does to the
//! host -- creating groups, registering layers, tagging groups with custom
//! properties -- goes through the [`LayerStore`] trait, keyed by opaque
//! [`GroupId`]/[`LayerId`] handles. A host embedding the crate implements the
//! trait over its real layer tree; tests use [`InMemoryLayerStore`].

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::style::LayerStyle;
use crate::extent::{Crs, Extent};
use crate::geometry::Geometry;

/// Opaque handle to a layer group in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

/// Opaque handle to a registered layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Raster,
    Vector,
}

/// One child slot in a group: either a nested group or a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerNode {
    Group(GroupId),
    Layer(LayerId),
}

/// A tiled basemap layer to be registered with the host.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayerDef {
    pub name: String,
    /// XYZ URL template with `{z}`/`{x}`/`{y}` placeholders.
    pub url_template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub opacity: f64,
}

/// Schema of a vector layer: name, native CRS, and attribute field names.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayerDef {
    pub name: String,
    pub crs: Crs,
    pub fields: Vec<String>,
}

/// One feature row: a geometry plus attribute values matching the layer's
/// field order.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub geometry: Geometry,
    pub attributes: Vec<String>,
}

/// A fully described vector layer ready for registration.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    pub def: VectorLayerDef,
    pub features: Vec<VectorFeature>,
    pub style: Option<LayerStyle>,
    /// Custom key/value metadata attached to the layer.
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("invalid layer definition for '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("unknown layer handle")]
    UnknownLayer,

    #[error("unknown group handle")]
    UnknownGroup,
}

/// The host map application's layer tree, reduced to what project loading
/// needs.
///
/// Index `0` in the insert operations is the top of the group; callers that
/// front-insert therefore end up with the last-inserted child first.
pub trait LayerStore {
    fn root(&self) -> GroupId;

    /// Create a detached group; attach it with [`LayerStore::insert_group`].
    fn create_group(&mut self, name: &str) -> GroupId;

    fn insert_group(
        &mut self,
        parent: GroupId,
        index: usize,
        group: GroupId,
    ) -> Result<(), LayerError>;

    fn insert_layer(
        &mut self,
        parent: GroupId,
        index: usize,
        layer: LayerId,
    ) -> Result<(), LayerError>;

    fn register_raster_layer(&mut self, def: &RasterLayerDef) -> Result<LayerId, LayerError>;

    /// Register a batch of vector layers in one host round trip. Handles are
    /// returned in input order.
    fn register_vector_layers(
        &mut self,
        layers: Vec<VectorLayer>,
    ) -> Result<Vec<LayerId>, LayerError>;

    /// Append features to an already registered vector layer.
    fn append_features(
        &mut self,
        layer: LayerId,
        features: Vec<VectorFeature>,
    ) -> Result<(), LayerError>;

    fn set_group_property(
        &mut self,
        group: GroupId,
        key: &str,
        value: &str,
    ) -> Result<(), LayerError>;

    fn group_property(&self, group: GroupId, key: &str) -> Option<String>;

    /// Find a group anywhere in the tree carrying the given custom property.
    fn find_group_by_property(&self, key: &str, value: &str) -> Option<GroupId>;

    /// Remove a group and everything beneath it.
    fn remove_group(&mut self, group: GroupId) -> Result<(), LayerError>;

    /// Suppress (or re-enable) host refresh notifications during bulk edits.
    fn set_notifications_enabled(&mut self, enabled: bool);

    fn children(&self, group: GroupId) -> Vec<LayerNode>;

    fn group_name(&self, group: GroupId) -> Option<String>;

    fn layer_kind(&self, layer: LayerId) -> Option<LayerKind>;

    /// Bounding box of the layer's content in its native CRS. `None` for
    /// raster layers, whose extents are effectively global.
    fn layer_extent(&self, layer: LayerId) -> Option<Extent>;

    fn layer_crs(&self, layer: LayerId) -> Option<Crs>;

    fn layer_name(&self, layer: LayerId) -> Option<String>;
}

/// Registered layer contents, exposed so tests can inspect what landed.
#[derive(Debug, Clone)]
pub enum LayerEntry {
    Raster(RasterLayerDef),
    Vector(VectorLayer),
}

#[derive(Debug)]
struct GroupEntry {
    name: String,
    children: Vec<LayerNode>,
    properties: Vec<(String, String)>,
}

/// Reference [`LayerStore`] backed by hash maps. Used by every test in the
/// crate; also a template for host implementations.
#[derive(Debug)]
pub struct InMemoryLayerStore {
    next_id: u64,
    root: GroupId,
    groups: HashMap<GroupId, GroupEntry>,
    layers: HashMap<LayerId, LayerEntry>,
    notifications_enabled: bool,
    notification_toggles: Vec<bool>,
    rejected_names: Vec<String>,
}

impl InMemoryLayerStore {
    pub fn new() -> Self {
        let root = GroupId(0);
        let mut groups = HashMap::new();
        groups.insert(
            root,
            GroupEntry {
                name: String::new(),
                children: Vec::new(),
                properties: Vec::new(),
            },
        );
        Self {
            next_id: 1,
            root,
            groups,
            layers: HashMap::new(),
            notifications_enabled: true,
            notification_toggles: Vec::new(),
            rejected_names: Vec::new(),
        }
    }

    /// Make any registration whose layer name matches fail, to exercise
    /// callers' failure isolation.
    pub fn reject_layers_named(&mut self, name: &str) {
        self.rejected_names.push(name.to_string());
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerEntry> {
        self.layers.get(&id)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// History of `set_notifications_enabled` calls, oldest first.
    pub fn notification_toggles(&self) -> &[bool] {
        &self.notification_toggles
    }

    /// Count every layer reachable beneath a group, recursively.
    pub fn layer_count(&self, group: GroupId) -> usize {
        self.children(group)
            .iter()
            .map(|node| match node {
                LayerNode::Group(g) => self.layer_count(*g),
                LayerNode::Layer(_) => 1,
            })
            .sum()
    }

    fn next_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        id
    }

    fn next_layer_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn check_accepted(&self, name: &str) -> Result<(), LayerError> {
        if self.rejected_names.iter().any(|n| n == name) {
            return Err(LayerError::InvalidDefinition {
                name: name.to_string(),
                reason: "rejected by host".to_string(),
            });
        }
        Ok(())
    }

    fn detach_from_parent(&mut self, node: LayerNode) {
        for entry in self.groups.values_mut() {
            entry.children.retain(|c| *c != node);
        }
    }
}

impl Default for InMemoryLayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore for InMemoryLayerStore {
    fn root(&self) -> GroupId {
        self.root
    }

    fn create_group(&mut self, name: &str) -> GroupId {
        let id = self.next_group_id();
        self.groups.insert(
            id,
            GroupEntry {
                name: name.to_string(),
                children: Vec::new(),
                properties: Vec::new(),
            },
        );
        id
    }

    fn insert_group(
        &mut self,
        parent: GroupId,
        index: usize,
        group: GroupId,
    ) -> Result<(), LayerError> {
        if !self.groups.contains_key(&group) {
            return Err(LayerError::UnknownGroup);
        }
        let entry = self.groups.get_mut(&parent).ok_or(LayerError::UnknownGroup)?;
        let index = index.min(entry.children.len());
        entry.children.insert(index, LayerNode::Group(group));
        Ok(())
    }

    fn insert_layer(
        &mut self,
        parent: GroupId,
        index: usize,
        layer: LayerId,
    ) -> Result<(), LayerError> {
        if !self.layers.contains_key(&layer) {
            return Err(LayerError::UnknownLayer);
        }
        let entry = self.groups.get_mut(&parent).ok_or(LayerError::UnknownGroup)?;
        let index = index.min(entry.children.len());
        entry.children.insert(index, LayerNode::Layer(layer));
        Ok(())
    }

    fn register_raster_layer(&mut self, def: &RasterLayerDef) -> Result<LayerId, LayerError> {
        self.check_accepted(&def.name)?;
        if !def.url_template.contains("{z}") {
            return Err(LayerError::InvalidDefinition {
                name: def.name.clone(),
                reason: "url template has no {z} placeholder".to_string(),
            });
        }
        let id = self.next_layer_id();
        debug!(name = %def.name, "registered raster layer");
        self.layers.insert(id, LayerEntry::Raster(def.clone()));
        Ok(id)
    }

    fn register_vector_layers(
        &mut self,
        layers: Vec<VectorLayer>,
    ) -> Result<Vec<LayerId>, LayerError> {
        for layer in &layers {
            self.check_accepted(&layer.def.name)?;
        }
        let mut ids = Vec::with_capacity(layers.len());
        for layer in layers {
            let id = self.next_layer_id();
            self.layers.insert(id, LayerEntry::Vector(layer));
            ids.push(id);
        }
        Ok(ids)
    }

    fn append_features(
        &mut self,
        layer: LayerId,
        features: Vec<VectorFeature>,
    ) -> Result<(), LayerError> {
        match self.layers.get_mut(&layer) {
            Some(LayerEntry::Vector(v)) => {
                v.features.extend(features);
                Ok(())
            }
            _ => Err(LayerError::UnknownLayer),
        }
    }

    fn set_group_property(
        &mut self,
        group: GroupId,
        key: &str,
        value: &str,
    ) -> Result<(), LayerError> {
        let entry = self.groups.get_mut(&group).ok_or(LayerError::UnknownGroup)?;
        entry.properties.retain(|(k, _)| k != key);
        entry.properties.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn group_property(&self, group: GroupId, key: &str) -> Option<String> {
        self.groups.get(&group)?.properties.iter().find_map(|(k, v)| {
            if k == key {
                Some(v.clone())
            } else {
                None
            }
        })
    }

    fn find_group_by_property(&self, key: &str, value: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|(_, entry)| {
                entry
                    .properties
                    .iter()
                    .any(|(k, v)| k == key && v == value)
            })
            .map(|(id, _)| *id)
    }

    fn remove_group(&mut self, group: GroupId) -> Result<(), LayerError> {
        if group == self.root {
            return Err(LayerError::UnknownGroup);
        }
        let entry = self.groups.remove(&group).ok_or(LayerError::UnknownGroup)?;
        self.detach_from_parent(LayerNode::Group(group));
        for child in entry.children {
            match child {
                LayerNode::Group(g) => {
                    let _ = self.remove_group(g);
                }
                LayerNode::Layer(l) => {
                    self.layers.remove(&l);
                }
            }
        }
        Ok(())
    }

    fn set_notifications_enabled(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
        self.notification_toggles.push(enabled);
    }

    fn children(&self, group: GroupId) -> Vec<LayerNode> {
        self.groups
            .get(&group)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    fn group_name(&self, group: GroupId) -> Option<String> {
        self.groups.get(&group).map(|e| e.name.clone())
    }

    fn layer_kind(&self, layer: LayerId) -> Option<LayerKind> {
        match self.layers.get(&layer)? {
            LayerEntry::Raster(_) => Some(LayerKind::Raster),
            LayerEntry::Vector(_) => Some(LayerKind::Vector),
        }
    }

    fn layer_extent(&self, layer: LayerId) -> Option<Extent> {
        match self.layers.get(&layer)? {
            LayerEntry::Raster(_) => None,
            LayerEntry::Vector(v) => {
                let mut extent = Extent::empty();
                for feature in &v.features {
                    if let Some(bbox) = feature.geometry.bounding_box() {
                        extent.combine(&bbox);
                    }
                }
                Some(extent)
            }
        }
    }

    fn layer_crs(&self, layer: LayerId) -> Option<Crs> {
        match self.layers.get(&layer)? {
            LayerEntry::Raster(_) => None,
            LayerEntry::Vector(v) => Some(v.def.crs.clone()),
        }
    }

    fn layer_name(&self, layer: LayerId) -> Option<String> {
        match self.layers.get(&layer)? {
            LayerEntry::Raster(r) => Some(r.name.clone()),
            LayerEntry::Vector(v) => Some(v.def.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_layer(name: &str, positions: &[(f64, f64)]) -> VectorLayer {
        VectorLayer {
            def: VectorLayerDef {
                name: name.to_string(),
                crs: Crs::wgs84(),
                fields: vec!["kind".to_string()],
            },
            features: positions
                .iter()
                .map(|&p| VectorFeature {
                    geometry: Geometry::Point(p),
                    attributes: vec!["point".to_string()],
                })
                .collect(),
            style: None,
            properties: vec![],
        }
    }

    #[test]
    fn test_front_insert_reverses_order() {
        let mut store = InMemoryLayerStore::new();
        let root = store.root();
        let ids = store
            .register_vector_layers(vec![point_layer("a", &[]), point_layer("b", &[])])
            .unwrap();
        store.insert_layer(root, 0, ids[0]).unwrap();
        store.insert_layer(root, 0, ids[1]).unwrap();

        assert_eq!(
            store.children(root),
            vec![LayerNode::Layer(ids[1]), LayerNode::Layer(ids[0])]
        );
    }

    #[test]
    fn test_remove_group_removes_subtree() {
        let mut store = InMemoryLayerStore::new();
        let root = store.root();
        let group = store.create_group("g");
        store.insert_group(root, 0, group).unwrap();
        let sub = store.create_group("sub");
        store.insert_group(group, 0, sub).unwrap();
        let ids = store
            .register_vector_layers(vec![point_layer("a", &[(1.0, 1.0)])])
            .unwrap();
        store.insert_layer(sub, 0, ids[0]).unwrap();

        store.remove_group(group).unwrap();

        assert!(store.children(root).is_empty());
        assert!(store.layer(ids[0]).is_none());
        assert!(store.group_name(sub).is_none());
    }

    #[test]
    fn test_group_property_lookup() {
        let mut store = InMemoryLayerStore::new();
        let root = store.root();
        let group = store.create_group("g");
        store.insert_group(root, 0, group).unwrap();
        store.set_group_property(group, "project_uuid", "abc").unwrap();

        assert_eq!(
            store.group_property(group, "project_uuid"),
            Some("abc".to_string())
        );
        assert_eq!(store.find_group_by_property("project_uuid", "abc"), Some(group));
        assert_eq!(store.find_group_by_property("project_uuid", "other"), None);
    }

    #[test]
    fn test_set_group_property_overwrites() {
        let mut store = InMemoryLayerStore::new();
        let group = store.create_group("g");
        store.set_group_property(group, "k", "v1").unwrap();
        store.set_group_property(group, "k", "v2").unwrap();
        assert_eq!(store.group_property(group, "k"), Some("v2".to_string()));
    }

    #[test]
    fn test_vector_extent_is_union_of_features() {
        let mut store = InMemoryLayerStore::new();
        let ids = store
            .register_vector_layers(vec![point_layer("a", &[(1.0, 2.0), (-3.0, 5.0)])])
            .unwrap();
        let extent = store.layer_extent(ids[0]).unwrap();
        assert_eq!(extent, Extent::new(-3.0, 2.0, 1.0, 5.0));
    }

    #[test]
    fn test_append_features_extends_extent() {
        let mut store = InMemoryLayerStore::new();
        let ids = store
            .register_vector_layers(vec![point_layer("a", &[(0.0, 0.0)])])
            .unwrap();
        store
            .append_features(
                ids[0],
                vec![VectorFeature {
                    geometry: Geometry::Point((10.0, 10.0)),
                    attributes: vec!["point".to_string()],
                }],
            )
            .unwrap();
        assert_eq!(
            store.layer_extent(ids[0]).unwrap(),
            Extent::new(0.0, 0.0, 10.0, 10.0)
        );
    }

    #[test]
    fn test_rejected_name_fails_registration() {
        let mut store = InMemoryLayerStore::new();
        store.reject_layers_named("bad");
        let err = store
            .register_vector_layers(vec![point_layer("bad", &[])])
            .unwrap_err();
        assert!(matches!(err, LayerError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_raster_template_requires_zoom_placeholder() {
        let mut store = InMemoryLayerStore::new();
        let err = store
            .register_raster_layer(&RasterLayerDef {
                name: "base".to_string(),
                url_template: "http://x/tiles".to_string(),
                min_zoom: 0,
                max_zoom: 22,
                opacity: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, LayerError::InvalidDefinition { .. }));
    }
}
