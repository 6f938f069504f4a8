//! Event capture for integration tests
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::sync::{Arc, Mutex};
use strum::IntoEnumIterator;

use claimbus::{
    event::{EventBus, EventHandler},
    Event, EventKind,
};

/// Collects every event the bus delivers, in delivery order
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    /// Subscribe to every event kind on the bus
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        for kind in EventKind::iter() {
            bus.subscribe(kind, recorder.handler());
        }
        recorder
    }

    fn handler(&self) -> EventHandler {
        let events = self.events.clone();
        Arc::new(move |event: &Event| {
            events.lock().unwrap().push(event.clone());
            Ok(())
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.kind() == kind)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).len()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
