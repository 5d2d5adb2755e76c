//! Event sink for fetch tasks.
//!
//! The task reports upward through an explicit [`FetchEvents`] trait object
//! rather than an ambient signal object, so hosts can wire it to widgets,
//! channels, or test recorders.

use std::sync::mpsc;

use serde_json::Value;

use super::types::{FetchStep, TaskState};

/// Receiver side of a fetch task's reporting.
///
/// Implementations must tolerate being called from the task's background
/// thread.
pub trait FetchEvents: Send + Sync {
    /// Coarse task state changes with a human-readable message.
    fn status_update(&self, state: TaskState, message: &str);

    /// One step finished; `payload` is its raw parsed JSON.
    fn step_result(&self, step: FetchStep, payload: Value);

    /// Terminal event, emitted exactly once per task run.
    fn task_done(&self, success: bool, message: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl FetchEvents for NullEvents {
    fn status_update(&self, _state: TaskState, _message: &str) {}
    fn step_result(&self, _step: FetchStep, _payload: Value) {}
    fn task_done(&self, _success: bool, _message: &str) {}
}

/// An owned fetch event, for channel-based delivery to the UI thread.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    StatusUpdate { state: TaskState, message: String },
    StepResult { step: FetchStep, payload: Value },
    TaskDone { success: bool, message: String },
}

/// Sink that forwards events over an mpsc channel, for hosts that drain
/// task events on their UI-owning thread.
pub struct ChannelEvents {
    tx: mpsc::Sender<FetchEvent>,
}

impl ChannelEvents {
    /// Create a sink and the receiver to drain it from.
    pub fn new() -> (Self, mpsc::Receiver<FetchEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl FetchEvents for ChannelEvents {
    fn status_update(&self, state: TaskState, message: &str) {
        let _ = self.tx.send(FetchEvent::StatusUpdate {
            state,
            message: message.to_string(),
        });
    }

    fn step_result(&self, step: FetchStep, payload: Value) {
        let _ = self.tx.send(FetchEvent::StepResult { step, payload });
    }

    fn task_done(&self, success: bool, message: &str) {
        let _ = self.tx.send(FetchEvent::TaskDone {
            success,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Recording sink for unit tests.
    #[derive(Debug, Default)]
    pub struct RecordingEvents {
        pub events: Mutex<Vec<FetchEvent>>,
    }

    impl RecordingEvents {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn step_results(&self) -> Vec<(FetchStep, Value)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    FetchEvent::StepResult { step, payload } => {
                        Some((*step, payload.clone()))
                    }
                    _ => None,
                })
                .collect()
        }

        pub fn done_events(&self) -> Vec<(bool, String)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    FetchEvent::TaskDone { success, message } => {
                        Some((*success, message.clone()))
                    }
                    _ => None,
                })
                .collect()
        }

        pub fn status_messages(&self) -> Vec<(TaskState, String)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    FetchEvent::StatusUpdate { state, message } => {
                        Some((*state, message.clone()))
                    }
                    _ => None,
                })
                .collect()
        }
    }

    impl FetchEvents for RecordingEvents {
        fn status_update(&self, state: TaskState, message: &str) {
            self.events.lock().unwrap().push(FetchEvent::StatusUpdate {
                state,
                message: message.to_string(),
            });
        }

        fn step_result(&self, step: FetchStep, payload: Value) {
            self.events
                .lock()
                .unwrap()
                .push(FetchEvent::StepResult { step, payload });
        }

        fn task_done(&self, success: bool, message: &str) {
            self.events.lock().unwrap().push(FetchEvent::TaskDone {
                success,
                message: message.to_string(),
            });
        }
    }

    #[test]
    fn test_channel_events_deliver_in_order() {
        let (sink, rx) = ChannelEvents::new();
        sink.status_update(TaskState::Running, "starting");
        sink.task_done(true, "done");

        match rx.recv().unwrap() {
            FetchEvent::StatusUpdate { state, .. } => assert_eq!(state, TaskState::Running),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().unwrap() {
            FetchEvent::TaskDone { success, .. } => assert!(success),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
