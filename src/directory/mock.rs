//! In-memory device directory for tests and demos.

use super::{DeviceDirectory, DeviceEvent, DirectoryWatch};
use crate::port::PortError;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::mpsc::Sender;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockDirectoryState {
    devices: BTreeSet<String>,
    sinks: Vec<(u64, Sender<DeviceEvent>)>,
    next_id: u64,
    list_fails: bool,
}

/// Directory whose device list is driven by the test.
///
/// `attach`/`detach` change the list and emit the matching event, like a
/// device being plugged in or pulled out. `emit` sends a raw event without
/// touching the list.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockDirectoryState>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `devices` present, without emitting events.
    pub fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let directory = Self::new();
        directory
            .state
            .lock()
            .devices
            .extend(devices.into_iter().map(Into::into));
        directory
    }

    pub fn attach(&self, id: &str) {
        self.state.lock().devices.insert(id.to_string());
        self.emit(DeviceEvent::Added(id.to_string()));
    }

    pub fn detach(&self, id: &str) {
        self.state.lock().devices.remove(id);
        self.emit(DeviceEvent::Removed(id.to_string()));
    }

    /// Deliver `event` to every live watch.
    pub fn emit(&self, event: DeviceEvent) {
        let mut state = self.state.lock();
        state.sinks.retain(|(_, sink)| sink.send(event.clone()).is_ok());
    }

    /// Make `list_devices` fail until reset.
    pub fn set_list_fails(&self, fails: bool) {
        self.state.lock().list_fails = fails;
    }

    /// Number of watches still subscribed.
    pub fn watcher_count(&self) -> usize {
        self.state.lock().sinks.len()
    }
}

impl DeviceDirectory for MockDirectory {
    fn list_devices(&self) -> Result<BTreeSet<String>, PortError> {
        let state = self.state.lock();
        if state.list_fails {
            return Err(PortError::config("device enumeration unavailable"));
        }
        Ok(state.devices.clone())
    }

    fn watch(&self, sink: Sender<DeviceEvent>) -> Result<DirectoryWatch, PortError> {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.sinks.push((id, sink));
            id
        };

        let state = Arc::clone(&self.state);
        Ok(DirectoryWatch::new(move || {
            state.lock().sinks.retain(|(sink_id, _)| *sink_id != id);
        }))
    }
}
