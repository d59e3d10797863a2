//! Thread-safe serial session.
//!
//! `SerialSession` gives callers a blocking API over a single serial device.
//! Every operation that touches the device runs on one worker thread, in
//! submission order; callers block until their operation completes (or, for
//! reads, until their timeout elapses).
//!
//! # Architecture
//!
//! ```text
//! caller ──> SerialSession ──> Worker (FIFO, one op at a time) ──> PortDriver
//!                 ^                   ^
//!                 │ completion        │ pause (same lock)
//!                 │                   │
//! DeviceDirectory ──> HotplugCoordinator ──> NotificationDispatcher ──> observer
//! ```
//!
//! # Example
//!
//! ```
//! use threadsafe_serial::directory::MockDirectory;
//! use threadsafe_serial::port::MockPortDriver;
//! use threadsafe_serial::SerialSession;
//!
//! let driver = MockPortDriver::new();
//! driver.push_line("/dev/ttyUSB0", "READY");
//!
//! let session = SerialSession::new(driver, MockDirectory::with_devices(["/dev/ttyUSB0"]))?;
//! assert!(session.open("/dev/ttyUSB0"));
//! assert_eq!(session.read_line(500).as_deref(), Some("READY"));
//! assert!(session.close());
//! assert!(!session.status().connected);
//! # Ok::<(), threadsafe_serial::SessionError>(())
//! ```

mod completion;
mod hotplug;
mod notify;
mod state;
mod worker;

pub use completion::WaitError;
pub use notify::{Notification, NotificationKind, SessionObserver};
pub use state::Status;

use crate::directory::DeviceDirectory;
use crate::error::{SessionError, SessionResult};
use crate::port::{PortDriver, PortError, PortSettings};
use completion::Completion;
use hotplug::HotplugCoordinator;
use notify::{NotificationDispatcher, ObserverSlot};
use once_cell::sync::OnceCell;
use state::SessionState;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use worker::{SessionCell, Worker};

/// Builder for [`SerialSession`].
pub struct SessionBuilder {
    driver: Arc<dyn PortDriver>,
    directory: Arc<dyn DeviceDirectory>,
    settings: PortSettings,
    observer: Option<Weak<dyn SessionObserver>>,
    hotplug: bool,
}

impl SessionBuilder {
    /// Settings used for every open.
    pub fn settings(mut self, settings: PortSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register the observer up front. The session keeps only a weak
    /// reference.
    pub fn observer<O: SessionObserver + 'static>(mut self, observer: &Arc<O>) -> Self {
        let weak: Weak<dyn SessionObserver> = Arc::<O>::downgrade(observer);
        self.observer = Some(weak);
        self
    }

    /// Whether to subscribe to directory events (on by default).
    pub fn hotplug(mut self, enabled: bool) -> Self {
        self.hotplug = enabled;
        self
    }

    pub fn build(self) -> SessionResult<SerialSession> {
        let cell = Arc::new(SessionCell::new(SessionState::new(self.settings)));
        let observer: ObserverSlot = Arc::new(OnceCell::new());
        if let Some(weak) = self.observer {
            notify::register(&observer, weak)?;
        }

        let dispatcher = NotificationDispatcher::spawn(Arc::clone(&observer))?;
        let worker = Worker::spawn(Arc::clone(&cell))?;
        let hotplug = match (self.hotplug, dispatcher.notifier()) {
            (true, Some(notifier)) => Some(HotplugCoordinator::spawn(
                Arc::clone(&cell),
                Arc::clone(&self.directory),
                notifier,
            )?),
            _ => None,
        };

        debug!(hotplug = hotplug.is_some(), "serial session started");
        Ok(SerialSession {
            cell,
            worker,
            driver: self.driver,
            directory: self.directory,
            observer,
            hotplug,
            dispatcher,
        })
    }
}

/// A serial session serialising all device access onto one worker thread.
pub struct SerialSession {
    cell: Arc<SessionCell>,
    worker: Worker,
    driver: Arc<dyn PortDriver>,
    directory: Arc<dyn DeviceDirectory>,
    observer: ObserverSlot,
    hotplug: Option<HotplugCoordinator>,
    dispatcher: NotificationDispatcher,
}

impl SerialSession {
    /// Session with default settings and hot-plug handling enabled.
    pub fn new(
        driver: impl PortDriver + 'static,
        directory: impl DeviceDirectory + 'static,
    ) -> SessionResult<Self> {
        Self::builder(driver, directory).build()
    }

    pub fn builder(
        driver: impl PortDriver + 'static,
        directory: impl DeviceDirectory + 'static,
    ) -> SessionBuilder {
        SessionBuilder {
            driver: Arc::new(driver),
            directory: Arc::new(directory),
            settings: PortSettings::default(),
            observer: None,
            hotplug: true,
        }
    }

    /// Open `path`. Returns `false` if the session is already connected or
    /// the driver refuses the device.
    pub fn open(&self, path: &str) -> bool {
        match self.try_open(path) {
            Ok(()) => true,
            Err(e @ SessionError::AlreadyConnected) => {
                debug!(path, "{}", e);
                false
            }
            Err(e) => {
                warn!(path, error = %e, "open failed");
                false
            }
        }
    }

    /// Like [`open`](Self::open), but reports why it failed.
    pub fn try_open(&self, path: &str) -> SessionResult<()> {
        // Only one open per session; reject without queueing.
        if self.cell.status().connected {
            return Err(SessionError::AlreadyConnected);
        }

        let driver = Arc::clone(&self.driver);
        let path = path.to_string();
        let completion = self
            .worker
            .submit(move |state| open_device(state, driver.as_ref(), path))?;
        await_result(completion)
    }

    /// Close the device if one is open. Always returns `true`.
    pub fn close(&self) -> bool {
        match self.worker.submit(|state| state.detach()).map(Completion::wait) {
            Ok(Ok(Some(path))) => info!(path = %path, "serial session closed"),
            Ok(Ok(None)) => debug!("close on idle session"),
            Ok(Err(_)) | Err(_) => warn!("close could not reach the session worker"),
        }
        true
    }

    /// Read one line, waiting at most `timeout_ms` milliseconds (`<= 0`
    /// waits indefinitely). Returns `None` when disconnected, on timeout, or
    /// when the driver fails.
    ///
    /// A read that times out is abandoned, not cancelled: it stays queued on
    /// the worker, runs to completion against the driver, and its line (if
    /// any) is discarded.
    pub fn read_line(&self, timeout_ms: i64) -> Option<String> {
        let timeout = u64::try_from(timeout_ms)
            .ok()
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis);
        match self.try_read_line(timeout) {
            Ok(line) => Some(line),
            Err(e @ (SessionError::NotConnected | SessionError::ReadTimeout(_))) => {
                debug!("read_line: {}", e);
                None
            }
            Err(e) => {
                warn!(error = %e, "read_line failed");
                None
            }
        }
    }

    /// Like [`read_line`](Self::read_line), but reports why no line came back.
    pub fn try_read_line(&self, timeout: Option<Duration>) -> SessionResult<String> {
        if !self.cell.status().connected {
            return Err(SessionError::NotConnected);
        }

        let completion = self.worker.submit(read_device)?;
        match completion.wait_timeout(timeout) {
            Ok(result) => result,
            Err(WaitError::TimedOut) => Err(SessionError::ReadTimeout(timeout.unwrap_or_default())),
            Err(WaitError::Abandoned) => Err(SessionError::WorkerStopped),
        }
    }

    /// Write `data` as-is. Returns `true` once the driver accepted all of it.
    pub fn write(&self, data: &str) -> bool {
        match self.try_write(data) {
            Ok(_) => true,
            Err(e @ SessionError::NotConnected) => {
                debug!("write: {}", e);
                false
            }
            Err(e) => {
                warn!(error = %e, "write failed");
                false
            }
        }
    }

    /// Like [`write`](Self::write), returning the number of bytes written.
    pub fn try_write(&self, data: &str) -> SessionResult<usize> {
        if !self.cell.status().connected {
            return Err(SessionError::NotConnected);
        }

        let data = data.to_string();
        let completion = self.worker.submit(
            move |state: &mut SessionState| -> SessionResult<usize> {
                let handle = state.handle_mut().ok_or(SessionError::NotConnected)?;
                handle.write_str(&data).map_err(SessionError::Write)
            },
        )?;
        await_result(completion)
    }

    /// Snapshot of path, connectivity and baud rate. Never blocks behind an
    /// in-flight operation.
    pub fn status(&self) -> Status {
        self.cell.status()
    }

    /// Settings the next open will use. Queued behind pending operations.
    pub fn settings(&self) -> SessionResult<PortSettings> {
        let completion = self.worker.submit(|state| state.settings().clone())?;
        completion.wait().map_err(|_| SessionError::WorkerStopped)
    }

    /// Change the baud rate used by the next open.
    pub fn set_baud_rate(&self, baud_rate: u32) -> bool {
        let applied = self
            .worker
            .submit(move |state| state.settings_mut().baud_rate = baud_rate)
            .map(Completion::wait);
        matches!(applied, Ok(Ok(())))
    }

    /// Register the observer. Only the first registration succeeds; the
    /// session does not keep the observer alive.
    pub fn set_observer<O: SessionObserver + 'static>(
        &self,
        observer: &Arc<O>,
    ) -> SessionResult<()> {
        let weak: Weak<dyn SessionObserver> = Arc::<O>::downgrade(observer);
        notify::register(&self.observer, weak)
    }

    /// Devices currently present according to the directory. Empty if the
    /// directory cannot be queried.
    pub fn available_devices(&self) -> BTreeSet<String> {
        self.directory.list_devices().unwrap_or_else(|e| {
            warn!(error = %e, "device enumeration failed");
            BTreeSet::new()
        })
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        if let Some(mut hotplug) = self.hotplug.take() {
            hotplug.shutdown();
        }
        self.close();
        self.worker.shutdown();
        self.dispatcher.shutdown();
        debug!("serial session stopped");
    }
}

impl fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSession")
            .field("status", &self.status())
            .field("hotplug", &self.hotplug.is_some())
            .field("observer", &self.observer.get().is_some())
            .finish()
    }
}

fn await_result<T>(completion: Completion<SessionResult<T>>) -> SessionResult<T> {
    completion.wait().map_err(|_| SessionError::WorkerStopped)?
}

fn open_device(
    state: &mut SessionState,
    driver: &dyn PortDriver,
    path: String,
) -> SessionResult<()> {
    // A concurrent open may have won while this one was queued.
    if state.is_connected() {
        return Err(SessionError::AlreadyConnected);
    }
    let handle = driver
        .open(&path, state.settings())
        .map_err(|e| SessionError::open(path.as_str(), e))?;
    info!(path = %path, baud = state.settings().baud_rate, "serial session opened");
    state.attach(path, handle);
    Ok(())
}

fn read_device(state: &mut SessionState) -> SessionResult<String> {
    let read_timeout = state.settings().read_timeout;
    let handle = state.handle_mut().ok_or(SessionError::NotConnected)?;
    handle.read_line().map_err(|e| match e {
        PortError::Timeout(d) => SessionError::ReadTimeout(d),
        e if e.is_timeout() => SessionError::ReadTimeout(read_timeout),
        e => SessionError::Read(e),
    })
}
