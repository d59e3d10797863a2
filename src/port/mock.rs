//! Mock port driver for testing.
//!
//! `MockPortDriver` simulates devices without hardware. Lines are queued per
//! device path, opens can be made to fail, reads can be slowed down, and a
//! path can be "unplugged" so that reads on open handles fail.

use super::error::PortError;
use super::traits::{DeviceHandle, PortDriver, PortSettings};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockDriverState {
    lines: HashMap<String, VecDeque<String>>,
    writes: HashMap<String, Vec<String>>,
    failing_opens: HashSet<String>,
    unplugged: HashSet<String>,
    read_delay: Option<Duration>,
    last_settings: Option<PortSettings>,
    open_count: usize,
    close_count: usize,
    open_handles: usize,
}

/// Mock driver whose devices are backed by in-memory queues.
///
/// # Example
/// ```
/// use threadsafe_serial::port::{DeviceHandle, MockPortDriver, PortDriver, PortSettings};
///
/// let driver = MockPortDriver::new();
/// driver.push_line("/dev/ttyUSB0", "hello");
///
/// let mut handle = driver.open("/dev/ttyUSB0", &PortSettings::default()).unwrap();
/// assert_eq!(handle.read_line().unwrap(), "hello");
///
/// handle.write_str("ping").unwrap();
/// assert_eq!(driver.written("/dev/ttyUSB0"), vec!["ping".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockPortDriver {
    state: Arc<Mutex<MockDriverState>>,
}

impl MockPortDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line to be returned by reads on `path`.
    pub fn push_line(&self, path: &str, line: impl Into<String>) {
        self.state
            .lock()
            .lines
            .entry(path.to_string())
            .or_default()
            .push_back(line.into());
    }

    /// Make subsequent opens of `path` fail (or succeed again).
    pub fn set_open_fails(&self, path: &str, fails: bool) {
        let mut state = self.state.lock();
        if fails {
            state.failing_opens.insert(path.to_string());
        } else {
            state.failing_opens.remove(path);
        }
    }

    /// Every read sleeps this long before looking at the queue.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().read_delay = delay;
    }

    /// Simulate physical removal: opens and reads on `path` fail until
    /// `replug` is called.
    pub fn unplug(&self, path: &str) {
        self.state.lock().unplugged.insert(path.to_string());
    }

    pub fn replug(&self, path: &str) {
        self.state.lock().unplugged.remove(path);
    }

    /// Everything written to `path`, in order.
    pub fn written(&self, path: &str) -> Vec<String> {
        self.state
            .lock()
            .writes
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Number of handles that were closed (explicitly or by drop).
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    /// Settings passed to the most recent open.
    pub fn last_settings(&self) -> Option<PortSettings> {
        self.state.lock().last_settings.clone()
    }
}

impl PortDriver for MockPortDriver {
    fn open(
        &self,
        path: &str,
        settings: &PortSettings,
    ) -> Result<Box<dyn DeviceHandle>, PortError> {
        let mut state = self.state.lock();
        if state.failing_opens.contains(path) || state.unplugged.contains(path) {
            return Err(PortError::not_found(path));
        }
        state.open_count += 1;
        state.open_handles += 1;
        state.last_settings = Some(settings.clone());

        Ok(Box::new(MockDeviceHandle {
            name: path.to_string(),
            read_timeout: settings.read_timeout,
            open: true,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Handle returned by `MockPortDriver`.
pub struct MockDeviceHandle {
    name: String,
    read_timeout: Duration,
    open: bool,
    state: Arc<Mutex<MockDriverState>>,
}

impl DeviceHandle for MockDeviceHandle {
    fn read_line(&mut self) -> Result<String, PortError> {
        if !self.open {
            return Err(PortError::disconnected(self.name.clone()));
        }
        let delay = self.state.lock().read_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if state.unplugged.contains(&self.name) {
            return Err(PortError::disconnected(self.name.clone()));
        }
        state
            .lines
            .get_mut(&self.name)
            .and_then(VecDeque::pop_front)
            .ok_or(PortError::Timeout(self.read_timeout))
    }

    fn write_str(&mut self, data: &str) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if !self.open || state.unplugged.contains(&self.name) {
            return Err(PortError::disconnected(self.name.clone()));
        }
        state
            .writes
            .entry(self.name.clone())
            .or_default()
            .push(data.to_string());
        Ok(data.len())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut state = self.state.lock();
            state.close_count += 1;
            state.open_handles -= 1;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MockDeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MockDeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDeviceHandle")
            .field("name", &self.name)
            .field("open", &self.open)
            .finish()
    }
}
