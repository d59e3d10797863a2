//! Polling device directory backed by `serialport::available_ports`.
//!
//! The OS enumeration is snapshotted on a background thread; consecutive
//! snapshots are diffed into add/remove events.

use super::{diff_snapshots, DeviceDirectory, DeviceEvent, DirectoryWatch};
use crate::port::PortError;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Interval between enumeration passes when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Serial device directory that polls the operating system.
#[derive(Debug, Clone)]
pub struct SerialDirectory {
    poll_interval: Duration,
}

impl Default for SerialDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl SerialDirectory {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

fn enumerate() -> Result<BTreeSet<String>, PortError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

impl DeviceDirectory for SerialDirectory {
    fn list_devices(&self) -> Result<BTreeSet<String>, PortError> {
        enumerate()
    }

    fn watch(&self, sink: Sender<DeviceEvent>) -> Result<DirectoryWatch, PortError> {
        let mut known = enumerate()?;
        let interval = self.poll_interval;
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("serial-directory".into())
            .spawn(move || {
                debug!(devices = known.len(), "device polling started");
                while !thread_stop.load(Ordering::Acquire) {
                    thread::park_timeout(interval);
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                    let current = match enumerate() {
                        Ok(current) => current,
                        Err(e) => {
                            warn!(error = %e, "device enumeration failed");
                            continue;
                        }
                    };
                    for event in diff_snapshots(&known, &current) {
                        trace!(?event, "device presence changed");
                        if sink.send(event).is_err() {
                            debug!("event receiver gone, stopping device polling");
                            return;
                        }
                    }
                    known = current;
                }
                debug!("device polling stopped");
            })
            .map_err(PortError::Io)?;

        Ok(DirectoryWatch::new(move || {
            stop.store(true, Ordering::Release);
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("device polling thread panicked");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_default_interval() {
        assert_eq!(SerialDirectory::default().poll_interval(), DEFAULT_POLL_INTERVAL);
    }

    // Enumeration may be unavailable in sandboxes; only exercise the watch
    // lifecycle when it works.
    #[test]
    fn test_watch_stops_on_drop() {
        let directory = SerialDirectory::new(Duration::from_millis(10));
        let (tx, rx) = mpsc::channel();
        let Ok(watch) = directory.watch(tx) else {
            return;
        };
        thread::sleep(Duration::from_millis(30));
        drop(watch);

        // The polling thread owned the only sender.
        while rx.try_recv().is_ok() {}
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(1)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
    }
}
