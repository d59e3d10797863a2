//! Session state and its externally visible snapshot.

use crate::port::{DeviceHandle, PortSettings};
use serde::{Deserialize, Serialize};

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub path: Option<String>,
    pub connected: bool,
    pub baud_rate: u32,
}

/// The open device. Its presence is what "connected" means.
#[derive(Debug)]
struct ActiveDevice {
    path: String,
    handle: Box<dyn DeviceHandle>,
}

/// State owned by the serialization core.
///
/// `path` and `connected` cannot disagree: both are derived from the single
/// optional `ActiveDevice`.
#[derive(Debug)]
pub struct SessionState {
    device: Option<ActiveDevice>,
    settings: PortSettings,
}

impl SessionState {
    pub(crate) fn new(settings: PortSettings) -> Self {
        Self {
            device: None,
            settings,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    pub fn device_path(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.path.as_str())
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut PortSettings {
        &mut self.settings
    }

    /// The open handle, if any.
    pub(crate) fn handle_mut(&mut self) -> Option<&mut (dyn DeviceHandle + 'static)> {
        self.device.as_mut().map(|d| d.handle.as_mut())
    }

    pub(crate) fn attach(&mut self, path: String, handle: Box<dyn DeviceHandle>) {
        debug_assert!(self.device.is_none(), "attach over an open device");
        self.device = Some(ActiveDevice { path, handle });
    }

    /// Close and forget the open device. Returns its path, or `None` if the
    /// session was already closed.
    pub(crate) fn detach(&mut self) -> Option<String> {
        let mut device = self.device.take()?;
        device.handle.close();
        Some(device.path)
    }

    pub fn status(&self) -> Status {
        Status {
            path: self.device_path().map(str::to_string),
            connected: self.is_connected(),
            baud_rate: self.settings.baud_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockPortDriver, PortDriver};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_state_is_disconnected() {
        let state = SessionState::new(PortSettings::default());
        assert_eq!(
            state.status(),
            Status {
                path: None,
                connected: false,
                baud_rate: 9600
            }
        );
    }

    #[test]
    fn test_attach_then_detach() {
        let driver = MockPortDriver::new();
        let mut state = SessionState::new(PortSettings::default());
        let handle = driver.open("/dev/ttyUSB0", state.settings()).unwrap();

        state.attach("/dev/ttyUSB0".into(), handle);
        assert!(state.is_connected());
        assert_eq!(state.device_path(), Some("/dev/ttyUSB0"));
        assert!(state.handle_mut().is_some());

        assert_eq!(state.detach().as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(driver.close_count(), 1);
        assert_eq!(state.status().path, None);
        assert!(!state.status().connected);
    }

    #[test]
    fn test_detach_when_closed_is_noop() {
        let mut state = SessionState::new(PortSettings::default());
        assert_eq!(state.detach(), None);
    }
}
