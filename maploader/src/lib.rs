//! MapLoader - Remote geospatial project loading for host map applications
//!
//! This library fetches a remote project by uuid in three sequential steps
//! (project metadata, basemap/tile definitions, feature collection) and
//! materializes the results into a host map application's layer tree:
//! grouped, batched, styled per asset type, with per-item failure isolation
//! and a cooperative UI pacer to keep the host responsive.
//!
//! The host is abstracted behind the [`layers::LayerStore`] trait; nothing
//! in the crate depends on a particular map application.

pub mod extent;
pub mod fetch;
pub mod geometry;
pub mod layers;
pub mod model;
pub mod pacer;
pub mod session;

pub use extent::{aggregate_extent, Crs, Extent, Reprojector, WebMercatorReprojector};
pub use fetch::{ChannelEvents, FetchError, FetchEvent, FetchEvents, FetchStep, ReqwestClient, TaskState};
pub use layers::{InMemoryLayerStore, LayerStore};
pub use pacer::{Progress, UiPacer};
pub use session::{generate_guest_uuid, LoadOutcome, LoadSession, MaterializeError, SessionConfig};
