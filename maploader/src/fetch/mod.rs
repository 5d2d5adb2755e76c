//! Remote project retrieval.
//!
//! # Architecture
//!
//! The module splits into four pieces:
//!
//! - [`http`]: a thin [`HttpClient`] trait over blocking HTTP, with a
//!   production implementation backed by `reqwest` and a scripted mock for
//!   tests.
//! - [`task`]: the [`FetchTask`] state machine running the three sequential
//!   backend calls (project, basemaps, features) on a worker thread.
//! - [`events`]: the [`FetchEvents`] sink a task reports into, decoupling
//!   the worker thread from whatever UI is listening.
//! - [`store`]: the [`StepResultStore`] accumulator that holds step payloads
//!   until all three have arrived and materialization can start.

pub mod events;
pub mod http;
pub mod store;
pub mod task;
pub mod types;

pub use events::{ChannelEvents, FetchEvent, FetchEvents, NullEvents};
pub use http::{HttpClient, HttpResponse, ReqwestClient, DEFAULT_HTTP_TIMEOUT};
pub use store::{StepResultStore, StepResults};
pub use task::{
    FetchHandle, FetchTask, RequestHeaders, APPLICATION_HEADER, ASSET_TYPE_FILTER,
    GUEST_UUID_HEADER, PUBLIC_VIEW_HEADER,
};
pub use types::{FetchError, FetchStep, TaskState};
