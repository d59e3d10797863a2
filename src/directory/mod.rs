//! Device directory seam.
//!
//! A `DeviceDirectory` answers "which serial devices are present right now"
//! and pushes add/remove notifications into a channel for as long as the
//! returned `DirectoryWatch` is alive.

pub mod mock;
pub mod serial;

use crate::port::PortError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::mpsc::Sender;

pub use mock::MockDirectory;
pub use serial::{SerialDirectory, DEFAULT_POLL_INTERVAL};

/// A presence change reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "device", rename_all = "snake_case")]
pub enum DeviceEvent {
    Added(String),
    Removed(String),
}

impl DeviceEvent {
    /// The device identifier carried by the event.
    pub fn device(&self) -> &str {
        match self {
            Self::Added(id) | Self::Removed(id) => id,
        }
    }
}

/// Enumerates present devices and reports hot-plug changes.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceDirectory: Send + Sync {
    /// Identifiers (device paths) of every device currently present.
    fn list_devices(&self) -> Result<BTreeSet<String>, PortError>;

    /// Start sending events into `sink`. Delivery stops when the returned
    /// watch is dropped.
    fn watch(&self, sink: Sender<DeviceEvent>) -> Result<DirectoryWatch, PortError>;
}

/// Keeps an event subscription alive; dropping it cancels the subscription
/// and releases the directory's clone of the sink.
pub struct DirectoryWatch {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl DirectoryWatch {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A watch with nothing to cancel.
    pub fn inert() -> Self {
        Self { cancel: None }
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWatch")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Events that turn `before` into `after`; removals come first.
pub fn diff_snapshots(before: &BTreeSet<String>, after: &BTreeSet<String>) -> Vec<DeviceEvent> {
    before
        .difference(after)
        .cloned()
        .map(DeviceEvent::Removed)
        .chain(after.difference(before).cloned().map(DeviceEvent::Added))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_reports_removals_before_additions() {
        let before = set(&["/dev/ttyACM0", "/dev/ttyUSB0"]);
        let after = set(&["/dev/ttyUSB0", "/dev/ttyUSB1"]);

        assert_eq!(
            diff_snapshots(&before, &after),
            vec![
                DeviceEvent::Removed("/dev/ttyACM0".into()),
                DeviceEvent::Added("/dev/ttyUSB1".into()),
            ]
        );
    }

    #[test]
    fn test_diff_of_equal_snapshots_is_empty() {
        let snapshot = set(&["COM3"]);
        assert!(diff_snapshots(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn test_watch_cancels_on_drop() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let watch = DirectoryWatch::new(move || flag.store(true, Ordering::SeqCst));

        assert!(!cancelled.load(Ordering::SeqCst));
        drop(watch);
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_event_serializes_with_device() {
        let json = serde_json::to_value(DeviceEvent::Removed("COM4".into())).unwrap();
        assert_eq!(json, serde_json::json!({"event": "removed", "device": "COM4"}));
    }
}
