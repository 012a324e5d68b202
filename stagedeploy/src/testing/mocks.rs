//! Scripted probes and recording sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::adapters::AdapterResult;
use crate::core::{ResourceId, ResourceState};
use crate::events::EventSink;
use crate::provision::ResourceProbe;

/// A probe that replays a script of results. The last entry repeats.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<AdapterResult<ResourceState>>>,
    calls: Mutex<usize>,
}

impl ScriptedProbe {
    /// Replays `states` in order.
    #[must_use]
    pub fn new(states: Vec<ResourceState>) -> Self {
        Self::with_results(states.into_iter().map(Ok).collect())
    }

    /// Always returns `state`.
    #[must_use]
    pub fn repeating(state: ResourceState) -> Self {
        Self::new(vec![state])
    }

    /// Replays `results`, including probe errors.
    #[must_use]
    pub fn with_results(results: Vec<AdapterResult<ResourceState>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of probe calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ResourceProbe for ScriptedProbe {
    async fn probe(&self, _resource: &ResourceId) -> AdapterResult<ResourceState> {
        *self.calls.lock() += 1;
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Ok(ResourceState::Absent))
        } else {
            script.front().cloned().unwrap_or(Ok(ResourceState::Absent))
        }
    }
}

/// An event sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<(String, Option<serde_json::Value>)>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.lock().clone()
    }

    /// Returns the event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the payloads of events of `event_type`.
    #[must_use]
    pub fn events_of(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t == event_type)
            .map(|(_, data)| data.clone().unwrap_or_default())
            .collect()
    }

    /// Clears recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }
}
