//! Main project group lifecycle.
//!
//! Each loaded project lives under one top-level group. The group carries
//! two custom properties: the remote project uuid, and a freshly minted
//! internal id that uniquely identifies this particular load. Reloading the
//! same project removes the old group by internal id before creating the new
//! one, so two loads of one project never collide.

use tracing::{info, warn};
use uuid::Uuid;

use super::store::{GroupId, LayerError, LayerStore};

/// Custom property holding the remote project uuid.
pub const PROJECT_UUID_PROPERTY: &str = "maploader_project_uuid";

/// Custom property holding the per-load internal group id.
pub const INTERNAL_GROUP_ID_PROPERTY: &str = "maploader_internal_group_id";

/// A freshly created top-level project group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainGroup {
    pub id: GroupId,
    /// Internal id minted for this load; persist it to remove the group on
    /// the next load.
    pub internal_id: String,
}

/// Create the project's main group at the top of the layer tree, named
/// `"{name} ({first 8 chars of uuid})"`.
pub fn create_main_group(
    store: &mut dyn LayerStore,
    project_name: &str,
    project_uuid: &str,
) -> Result<MainGroup, LayerError> {
    let internal_id = Uuid::new_v4().to_string();
    let short_uuid: String = project_uuid.chars().take(8).collect();
    let name = format!("{} ({})", project_name, short_uuid);

    let root = store.root();
    let group = store.create_group(&name);
    store.set_group_property(group, PROJECT_UUID_PROPERTY, project_uuid)?;
    store.set_group_property(group, INTERNAL_GROUP_ID_PROPERTY, &internal_id)?;
    store.insert_group(root, 0, group)?;

    info!(group = %name, internal_id = %internal_id, "created main group");
    Ok(MainGroup {
        id: group,
        internal_id,
    })
}

/// Remove the group created by a previous load, identified by its internal
/// id. Returns whether a group was removed.
pub fn remove_previous_group(store: &mut dyn LayerStore, internal_id: &str) -> bool {
    let Some(group) = store.find_group_by_property(INTERNAL_GROUP_ID_PROPERTY, internal_id) else {
        warn!(internal_id = %internal_id, "no group found for internal id");
        return false;
    };
    info!(internal_id = %internal_id, "removing previous project group");
    store.remove_group(group).is_ok()
}
