//! Shared test utilities for session tests.
//!
//! This module provides common test infrastructure including:
//! - Session construction over the mock driver and directory
//! - A recording observer that tests can wait on

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use threadsafe_serial::{
    MockDirectory, MockPortDriver, Notification, NotificationKind, PortSettings, SerialSession,
    SessionObserver,
};

/// How long a test waits for a notification that should arrive.
pub const NOTIFY_WAIT: Duration = Duration::from_secs(2);

/// Settings with a short driver read timeout so abandoned reads finish fast.
pub fn quick_settings() -> PortSettings {
    PortSettings {
        read_timeout: Duration::from_millis(50),
        ..PortSettings::default()
    }
}

/// Session without hot-plug handling.
pub fn plain_session(driver: &MockPortDriver) -> SerialSession {
    SerialSession::builder(driver.clone(), MockDirectory::new())
        .settings(quick_settings())
        .hotplug(false)
        .build()
        .expect("session should start")
}

/// Session watching `directory`, reporting to `observer`.
pub fn watched_session(
    driver: &MockPortDriver,
    directory: &MockDirectory,
    observer: &Arc<RecordingObserver>,
) -> SerialSession {
    SerialSession::builder(driver.clone(), directory.clone())
        .settings(quick_settings())
        .observer(observer)
        .build()
        .expect("session should start")
}

/// Observer that forwards every notification to a channel.
pub struct RecordingObserver {
    tx: Mutex<Sender<Notification>>,
    rx: Mutex<Receiver<Notification>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        Arc::new(Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
        })
    }

    /// Next notification, or `None` if nothing arrives within `timeout`.
    pub fn next(&self, timeout: Duration) -> Option<Notification> {
        match self.rx.lock().recv_timeout(timeout) {
            Ok(notification) => Some(notification),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next notification; panics if none arrives in time.
    pub fn expect_next(&self) -> Notification {
        self.next(NOTIFY_WAIT)
            .expect("notification should have been delivered")
    }

    fn record(&self, notification: &Notification) {
        let _ = self.tx.lock().send(notification.clone());
    }
}

impl SessionObserver for RecordingObserver {
    fn on_connected(&self, notification: &Notification) {
        assert_eq!(notification.kind, NotificationKind::Connected);
        self.record(notification);
    }

    fn on_disconnected(&self, notification: &Notification) {
        assert_eq!(notification.kind, NotificationKind::Disconnected);
        self.record(notification);
    }
}
