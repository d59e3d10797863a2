//! Hot-plug coordinator.
//!
//! Consumes directory events on its own thread and reconciles them with the
//! session. A removal pauses the worker, checks whether the session's device
//! is really gone, force-closes it if so, and only then lets queued
//! operations continue.

use super::notify::{Notification, Notifier};
use super::worker::SessionCell;
use crate::directory::{DeviceDirectory, DeviceEvent, DirectoryWatch};
use crate::error::{SessionError, SessionResult};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(crate) struct HotplugCoordinator {
    watch: Option<DirectoryWatch>,
    thread: Option<JoinHandle<()>>,
}

impl HotplugCoordinator {
    pub fn spawn(
        cell: Arc<SessionCell>,
        directory: Arc<dyn DeviceDirectory>,
        notifier: Notifier,
    ) -> SessionResult<Self> {
        let (tx, rx) = mpsc::channel::<DeviceEvent>();
        let watch = directory.watch(tx).map_err(SessionError::Directory)?;

        let thread = thread::Builder::new()
            .name("serial-session-hotplug".into())
            .spawn(move || {
                for event in rx {
                    if let Some(notification) = handle_event(&cell, directory.as_ref(), &event) {
                        notifier.notify(notification);
                    }
                }
                debug!("hotplug coordinator stopped");
            })
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            watch: Some(watch),
            thread: Some(thread),
        })
    }

    /// Cancel the directory subscription and wait for pending events to be
    /// handled.
    pub fn shutdown(&mut self) {
        self.watch.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("hotplug coordinator panicked");
            }
        }
    }
}

impl Drop for HotplugCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Apply one directory event to the session, returning the notification to
/// deliver, if any.
pub(crate) fn handle_event(
    cell: &SessionCell,
    directory: &dyn DeviceDirectory,
    event: &DeviceEvent,
) -> Option<Notification> {
    match event {
        DeviceEvent::Added(id) => {
            debug!(device = %id, "device added");
            Some(Notification::connected(id.clone(), cell.status()))
        }
        DeviceEvent::Removed(id) => on_device_removed(cell, directory, id),
    }
}

fn on_device_removed(
    cell: &SessionCell,
    directory: &dyn DeviceDirectory,
    id: &str,
) -> Option<Notification> {
    // Held until the end of reconciliation; nothing queued may run meanwhile.
    let mut session = cell.pause();

    let Some(path) = session.device_path().map(str::to_string) else {
        debug!(device = %id, "device removed while session idle");
        return None;
    };

    let still_present = match directory.list_devices() {
        Ok(devices) => devices.contains(&path),
        Err(e) => {
            warn!(
                error = %e,
                device = %id,
                "device enumeration failed, matching removal against session path"
            );
            path != id
        }
    };
    if still_present {
        debug!(device = %id, session = %path, "unrelated device removed");
        return None;
    }

    session.detach();
    let status = session.status();
    drop(session);

    info!(
        device = %id,
        reason = %SessionError::ForcedDisconnect(path),
        "session closed"
    );
    Some(Notification::disconnected(id, status))
}
