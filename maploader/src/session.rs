//! Project load sessions.
//!
//! A [`LoadSession`] owns the lifecycle of loading one remote project at a
//! time: it spawns the background [`FetchTask`], collects the three step
//! payloads, and once all have arrived materializes them into the host's
//! layer tree. Starting a new load supersedes the previous one: the old
//! task is cancelled and its remaining events are dropped, never merged
//! into the new load's state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::fetch::{
    FetchError, FetchEvent, FetchEvents, FetchHandle, FetchStep, FetchTask, HttpClient,
    ReqwestClient, RequestHeaders, StepResultStore, TaskState, DEFAULT_HTTP_TIMEOUT,
};
use crate::layers::{
    add_basemap_layers, add_feature_layers, create_main_group, remove_previous_group, LayerError,
    LayerStore, MainGroup, MaterializeReport,
};
use crate::model::{BasemapLayerDescriptor, FeatureCollection, ProjectDescriptor};
use crate::pacer::UiPacer;

/// Mint a fresh guest identifier; the host persists it across runs.
pub fn generate_guest_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Host-provided session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    /// Application name sent in the `X-Geoapi-Application` header.
    pub application: String,
    pub guest_uuid: String,
    /// Internal id of the group created by the previous load, if any.
    pub last_internal_group_id: Option<String>,
    pub http_timeout: Duration,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            application: application.into(),
            guest_uuid: generate_guest_uuid(),
            last_internal_group_id: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_guest_uuid(mut self, guest_uuid: impl Into<String>) -> Self {
        self.guest_uuid = guest_uuid.into();
        self
    }

    pub fn with_last_internal_group_id(mut self, id: impl Into<String>) -> Self {
        self.last_internal_group_id = Some(id.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    fn headers(&self) -> RequestHeaders {
        RequestHeaders::new(self.application.clone(), self.guest_uuid.clone())
    }
}

/// Errors turning collected step payloads into layers.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("not all fetch steps have completed")]
    NotReady,

    #[error("could not parse {step} payload: {reason}")]
    Payload { step: FetchStep, reason: String },

    #[error(transparent)]
    Layer(#[from] LayerError),
}

/// What one successful materialization produced.
#[derive(Debug)]
pub struct LoadOutcome {
    pub project: ProjectDescriptor,
    pub main_group: MainGroup,
    pub report: MaterializeReport,
    /// Whether a group from a previous load was removed first.
    pub replaced_previous: bool,
}

/// Forwards events only while its generation is the current one, so a
/// superseded task's late events are dropped rather than corrupting the
/// next load.
struct GatedEvents {
    inner: Arc<dyn FetchEvents>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl GatedEvents {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

impl FetchEvents for GatedEvents {
    fn status_update(&self, state: TaskState, message: &str) {
        if self.is_current() {
            self.inner.status_update(state, message);
        }
    }

    fn step_result(&self, step: FetchStep, payload: Value) {
        if self.is_current() {
            self.inner.step_result(step, payload);
        }
    }

    fn task_done(&self, success: bool, message: &str) {
        if self.is_current() {
            self.inner.task_done(success, message);
        }
    }
}

/// One-at-a-time project loading against a single backend.
pub struct LoadSession {
    config: SessionConfig,
    results: StepResultStore,
    generation: Arc<AtomicU64>,
    active: Option<FetchHandle>,
    state: TaskState,
}

impl LoadSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            results: StepResultStore::new(),
            generation: Arc::new(AtomicU64::new(0)),
            active: None,
            state: TaskState::Idle,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Start fetching a project on a background thread, superseding any load
    /// still in flight.
    pub fn start<C: HttpClient + 'static>(
        &mut self,
        client: C,
        project_uuid: &str,
        events: Arc<dyn FetchEvents>,
    ) {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.results.clear();
        self.state = TaskState::Running;

        info!(uuid = %project_uuid, generation, "starting project load");
        let gated = Arc::new(GatedEvents {
            inner: events,
            current: Arc::clone(&self.generation),
            generation,
        });
        let task = FetchTask::new(client, &self.config.base_url, project_uuid, self.config.headers());
        self.active = Some(task.spawn(gated));
    }

    /// Start a load with the built-in HTTP client, using the configured
    /// timeout.
    pub fn start_default(
        &mut self,
        project_uuid: &str,
        events: Arc<dyn FetchEvents>,
    ) -> Result<(), FetchError> {
        let client = ReqwestClient::with_timeout(self.config.http_timeout)?;
        self.start(client, project_uuid, events);
        Ok(())
    }

    /// Ask the active load to stop at its next step boundary.
    pub fn cancel(&self) {
        if let Some(handle) = &self.active {
            handle.cancel();
        }
    }

    /// Block until the active task finishes; `None` when nothing is running.
    pub fn wait(&mut self) -> Option<bool> {
        self.active.take().map(FetchHandle::join)
    }

    /// Fold a drained event into session state. The host's event loop calls
    /// this for every event it pulls off the channel.
    pub fn on_event(&mut self, event: &FetchEvent) {
        match event {
            FetchEvent::StatusUpdate { state, .. } => self.state = *state,
            FetchEvent::StepResult { step, payload } => {
                self.results.insert(*step, payload.clone())
            }
            FetchEvent::TaskDone { success, .. } => {
                self.state = if *success {
                    TaskState::Done
                } else {
                    TaskState::Failed
                };
            }
        }
    }

    /// All three step payloads have arrived.
    pub fn ready(&self) -> bool {
        self.results.is_complete()
    }

    /// Consume the collected payloads and build the project's layers.
    ///
    /// Removes the previous load's group first (when one is recorded), then
    /// creates the main group, basemaps, and feature layers. The stored step
    /// results are cleared whether parsing succeeds or fails; a retry needs
    /// a fresh fetch.
    pub fn materialize(
        &mut self,
        store: &mut dyn LayerStore,
        pacer: &mut UiPacer,
        on_complete: Option<&mut dyn FnMut()>,
    ) -> Result<LoadOutcome, MaterializeError> {
        let results = self.results.take().ok_or(MaterializeError::NotReady)?;

        let project: ProjectDescriptor = parse_payload(FetchStep::Project, results.project)?;
        let basemaps: Vec<BasemapLayerDescriptor> =
            parse_payload(FetchStep::BasemapLayers, results.basemap_layers)?;
        let features: FeatureCollection = parse_payload(FetchStep::Features, results.features)?;

        let replaced_previous = match self.config.last_internal_group_id.take() {
            Some(previous) => remove_previous_group(store, &previous),
            None => false,
        };

        let main_group = create_main_group(store, &project.name, &project.uuid)?;
        self.config.last_internal_group_id = Some(main_group.internal_id.clone());

        let mut report = MaterializeReport::default();
        add_basemap_layers(store, main_group.id, &basemaps, pacer, &mut report);
        add_feature_layers(store, main_group.id, &features, pacer, &mut report, on_complete);

        info!(
            project = %project.name,
            basemaps = report.basemaps_added,
            features = report.features_processed,
            "materialized project"
        );
        Ok(LoadOutcome {
            project,
            main_group,
            report,
            replaced_previous,
        })
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    step: FetchStep,
    payload: Value,
) -> Result<T, MaterializeError> {
    serde_json::from_value(payload).map_err(|e| MaterializeError::Payload {
        step,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::events::tests::RecordingEvents;
    use crate::fetch::http::tests::MockHttpClient;
    use crate::fetch::NullEvents;
    use crate::layers::{InMemoryLayerStore, INTERNAL_GROUP_ID_PROPERTY};
    use serde_json::json;

    fn config() -> SessionConfig {
        SessionConfig::new("https://geo.example.org/projects", "TestHost")
            .with_guest_uuid("guest-1")
    }

    fn complete_session() -> LoadSession {
        let mut session = LoadSession::new(config());
        session.on_event(&FetchEvent::StepResult {
            step: FetchStep::Project,
            payload: json!({"id": 1, "uuid": "abcdef123456", "name": "Demo"}),
        });
        session.on_event(&FetchEvent::StepResult {
            step: FetchStep::BasemapLayers,
            payload: json!([{
                "name": "Base",
                "url": "https://tiles.example.org/{z}/{x}/{y}.png",
                "type": "tms",
                "uiOptions": {"zIndex": 0, "opacity": 0.8}
            }]),
        });
        session.on_event(&FetchEvent::StepResult {
            step: FetchStep::Features,
            payload: json!({"features": [{
                "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                "assets": [{"asset_type": "image", "display_path": "a.jpg"}]
            }]}),
        });
        session
    }

    #[test]
    fn test_ready_requires_all_three_steps() {
        let mut session = LoadSession::new(config());
        assert!(!session.ready());
        session.on_event(&FetchEvent::StepResult {
            step: FetchStep::Project,
            payload: json!([{"id": 1}]),
        });
        assert!(!session.ready());

        let session = complete_session();
        assert!(session.ready());
    }

    #[test]
    fn test_materialize_builds_group_and_layers() {
        let mut session = complete_session();
        let mut store = InMemoryLayerStore::new();

        let outcome = session
            .materialize(&mut store, &mut UiPacer::disabled(), None)
            .unwrap();

        assert_eq!(outcome.project.name, "Demo");
        assert!(!outcome.replaced_previous);
        assert_eq!(
            store.group_name(outcome.main_group.id),
            Some("Demo (abcdef12)".to_string())
        );
        assert_eq!(outcome.report.basemaps_added, 1);
        assert_eq!(outcome.report.features_processed, 1);
        assert_eq!(store.layer_count(outcome.main_group.id), 2);
        assert_eq!(
            session.config().last_internal_group_id,
            Some(outcome.main_group.internal_id)
        );
    }

    #[test]
    fn test_reload_replaces_previous_group() {
        let mut session = complete_session();
        let mut store = InMemoryLayerStore::new();
        let first = session
            .materialize(&mut store, &mut UiPacer::disabled(), None)
            .unwrap();

        let mut session = complete_session();
        session.config.last_internal_group_id = Some(first.main_group.internal_id.clone());
        let second = session
            .materialize(&mut store, &mut UiPacer::disabled(), None)
            .unwrap();

        assert!(second.replaced_previous);
        assert_eq!(store.children(store.root()).len(), 1);
        assert!(store
            .find_group_by_property(INTERNAL_GROUP_ID_PROPERTY, &first.main_group.internal_id)
            .is_none());
    }

    #[test]
    fn test_materialize_before_ready_fails() {
        let mut session = LoadSession::new(config());
        let mut store = InMemoryLayerStore::new();
        let err = session
            .materialize(&mut store, &mut UiPacer::disabled(), None)
            .unwrap_err();
        assert!(matches!(err, MaterializeError::NotReady));
    }

    #[test]
    fn test_materialize_consumes_results() {
        let mut session = complete_session();
        let mut store = InMemoryLayerStore::new();
        session
            .materialize(&mut store, &mut UiPacer::disabled(), None)
            .unwrap();
        assert!(!session.ready());
    }

    #[test]
    fn test_unparseable_project_payload() {
        let mut session = complete_session();
        session.on_event(&FetchEvent::StepResult {
            step: FetchStep::Project,
            payload: json!("just a string"),
        });
        let mut store = InMemoryLayerStore::new();
        let err = session
            .materialize(&mut store, &mut UiPacer::disabled(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            MaterializeError::Payload {
                step: FetchStep::Project,
                ..
            }
        ));
    }

    #[test]
    fn test_start_and_wait_runs_full_fetch() {
        let mock = MockHttpClient::new();
        mock.push_json(200, r#"[{"id": 9, "uuid": "u-9", "name": "Live"}]"#);
        mock.push_json(200, r#"[{"name": "B", "url": "http://x/{z}/{x}/{y}", "type": "tms"}]"#);
        mock.push_json(200, r#"{"features": []}"#);

        let mut session = LoadSession::new(config());
        let events = Arc::new(RecordingEvents::new());
        session.start(mock, "u-9", Arc::clone(&events) as Arc<dyn FetchEvents>);

        assert_eq!(session.wait(), Some(true));
        for (step, payload) in events.step_results() {
            session.on_event(&FetchEvent::StepResult { step, payload });
        }
        assert!(session.ready());
    }

    #[test]
    fn test_superseded_generation_events_are_dropped() {
        let generation = Arc::new(AtomicU64::new(1));
        let recording = Arc::new(RecordingEvents::new());
        let gated = GatedEvents {
            inner: Arc::clone(&recording) as Arc<dyn FetchEvents>,
            current: Arc::clone(&generation),
            generation: 1,
        };

        gated.task_done(true, "first");
        generation.store(2, Ordering::SeqCst);
        gated.task_done(true, "late");
        gated.step_result(FetchStep::Project, json!({}));

        assert_eq!(recording.done_events(), vec![(true, "first".to_string())]);
        assert!(recording.step_results().is_empty());
    }

    #[test]
    fn test_starting_new_load_cancels_previous() {
        // A client with no scripted responses makes every step fail fast, so
        // the superseded task ends quickly either way; what matters here is
        // that its events never reach the sink once the new load begins.
        let mut session = LoadSession::new(config());
        session.start(MockHttpClient::new(), "old", Arc::new(NullEvents));
        let first_generation = session.generation.load(Ordering::SeqCst);

        let mock = MockHttpClient::new();
        mock.push_json(200, r#"[{"id": 1}]"#);
        mock.push_json(200, r#"[{"name": "B", "url": "http://x/{z}/{x}/{y}", "type": "tms"}]"#);
        mock.push_json(200, r#"{"features": []}"#);
        session.start(mock, "new", Arc::new(NullEvents));

        assert_eq!(
            session.generation.load(Ordering::SeqCst),
            first_generation + 1
        );
        assert_eq!(session.wait(), Some(true));
    }
}
