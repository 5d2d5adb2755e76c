//! The sequential three-step fetch task.
//!
//! One task loads one project: project metadata, then basemap/tile
//! definitions, then the feature collection. Each step needs an id produced
//! from its predecessor's payload, so the steps run strictly in order on a
//! single background thread, each call blocking until it returns or fails.
//!
//! The first failing step ends the run: its error is folded into one
//! consolidated message and the remaining steps are skipped. There are no
//! retries; the user re-triggers the load manually.
//!
//! Cancellation is cooperative and advisory: the flag is checked at step
//! boundaries only, so setting it mid-request does not abort in-flight I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::Value;
use tracing::{info, warn};

use super::events::FetchEvents;
use super::http::HttpClient;
use super::types::{FetchError, FetchStep, TaskState};

/// Header naming the calling application, for backend metrics.
pub const APPLICATION_HEADER: &str = "X-Geoapi-Application";

/// Header marking the request as a public view. Always `true`: only public
/// projects are supported.
pub const PUBLIC_VIEW_HEADER: &str = "X-Geoapi-IsPublicView";

/// Header carrying the persisted per-installation guest identifier.
pub const GUEST_UUID_HEADER: &str = "X-Guest-Uuid";

/// Asset types requested from the features endpoint.
pub const ASSET_TYPE_FILTER: &str =
    "image,video,point_cloud,streetview,questionnaire,no_asset_vector";

/// The fixed header set attached to every backend call.
#[derive(Debug, Clone)]
pub struct RequestHeaders {
    pub application: String,
    pub guest_uuid: String,
}

impl RequestHeaders {
    pub fn new(application: impl Into<String>, guest_uuid: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            guest_uuid: guest_uuid.into(),
        }
    }

    fn to_header_list(&self) -> Vec<(String, String)> {
        vec![
            (APPLICATION_HEADER.to_string(), self.application.clone()),
            (PUBLIC_VIEW_HEADER.to_string(), "true".to_string()),
            (GUEST_UUID_HEADER.to_string(), self.guest_uuid.clone()),
        ]
    }
}

/// Handle to a spawned fetch task.
pub struct FetchHandle {
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<bool>>,
}

impl FetchHandle {
    /// Request cooperative cancellation. Takes effect at the next step
    /// boundary; does not abort an in-flight request.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task thread and return whether the run succeeded.
    pub fn join(mut self) -> bool {
        self.join
            .take()
            .map_or(false, |j| j.join().unwrap_or(false))
    }
}

/// One cancelable load of one project. Superseded, never merged: starting a
/// new load must discard this task's callbacks (see the session layer).
pub struct FetchTask<C: HttpClient> {
    client: C,
    base_url: String,
    uuid: String,
    headers: RequestHeaders,
    cancel: Arc<AtomicBool>,
}

impl<C: HttpClient> FetchTask<C> {
    pub fn new(
        client: C,
        base_url: impl Into<String>,
        uuid: impl Into<String>,
        headers: RequestHeaders,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            uuid: uuid.into(),
            headers,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The task's cancellation flag, shared with whoever may cancel it.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Execute all three steps on the current thread. Returns `true` on a
    /// fully successful run.
    pub fn run(&self, events: &dyn FetchEvents) -> bool {
        info!(uuid = %self.uuid, "task to load map project started");

        if self.bail_if_cancelled(events) {
            return false;
        }
        let projects = match self.request_step(
            events,
            FetchStep::Project,
            &format!("/?uuid={}", self.uuid),
        ) {
            Ok(v) => v,
            Err(message) => return fail(events, &message),
        };
        let Some(project) = projects.as_array().and_then(|a| a.first()).cloned() else {
            let cause = FetchError::Decode("expected a non-empty project list".to_string());
            return fail(events, &step_failure(FetchStep::Project, &cause));
        };
        let project_id = match project_id(&project) {
            Ok(id) => id,
            Err(message) => return fail(events, &message),
        };
        events.step_result(FetchStep::Project, project);

        if self.bail_if_cancelled(events) {
            return false;
        }
        let basemap_layers = match self.request_step(
            events,
            FetchStep::BasemapLayers,
            &format!("/{}/tile-servers/", project_id),
        ) {
            Ok(v) => v,
            Err(message) => return fail(events, &message),
        };
        events.step_result(FetchStep::BasemapLayers, basemap_layers);

        if self.bail_if_cancelled(events) {
            return false;
        }
        let features = match self.request_step(
            events,
            FetchStep::Features,
            &format!("/{}/features/?assetType={}", project_id, ASSET_TYPE_FILTER),
        ) {
            Ok(v) => v,
            Err(message) => return fail(events, &message),
        };
        events.step_result(FetchStep::Features, features);

        info!(uuid = %self.uuid, "fetch task done");
        events.task_done(true, "Finished fetching data");
        true
    }

    fn request_step(
        &self,
        events: &dyn FetchEvents,
        step: FetchStep,
        endpoint: &str,
    ) -> Result<Value, String> {
        events.status_update(
            TaskState::Running,
            &format!("Fetching {}...", step.description()),
        );
        info!(step = %step, "fetching");

        let url = format!("{}{}", self.base_url, endpoint);
        self.fetch_json(&url)
            .map_err(|e| step_failure(step, &e))
    }

    fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self.client.get(url, &self.headers.to_header_list())?;
        if response.status != 200 {
            return Err(FetchError::Protocol(response.status));
        }
        let value: Value =
            serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode(e.to_string()))?;
        if is_falsy(&value) {
            return Err(FetchError::EmptyPayload);
        }
        Ok(value)
    }

    fn bail_if_cancelled(&self, events: &dyn FetchEvents) -> bool {
        if self.cancel.load(Ordering::SeqCst) {
            warn!(uuid = %self.uuid, "task was cancelled");
            events.task_done(false, "Task was cancelled");
            true
        } else {
            false
        }
    }
}

impl<C: HttpClient + 'static> FetchTask<C> {
    /// Run the task on a background thread. The three network calls block
    /// that thread; the UI thread only sees events.
    pub fn spawn(self, events: Arc<dyn FetchEvents>) -> FetchHandle {
        let cancel = Arc::clone(&self.cancel);
        let join = thread::spawn(move || self.run(events.as_ref()));
        FetchHandle {
            cancel,
            join: Some(join),
        }
    }
}

fn fail(events: &dyn FetchEvents, message: &str) -> bool {
    warn!("{}", message);
    events.task_done(false, message);
    false
}

fn step_failure(step: FetchStep, cause: &FetchError) -> String {
    format!("Fetching {} failed: {}", step.description(), cause)
}

fn project_id(project: &Value) -> Result<String, String> {
    match project.get("id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => {
            let cause = FetchError::Decode("project record has no usable id".to_string());
            Err(step_failure(FetchStep::Project, &cause))
        }
    }
}

/// Empty or falsy payloads are step failures, matching the backend contract:
/// a project with no basemaps or no feature payload is not loadable.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}
