//! One-shot completion slot used to turn worker results into blocking returns.
//!
//! The worker fills the slot exactly once; the caller blocks on it with an
//! optional timeout. If the caller gives up first, the late result is dropped.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

/// Why a wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The timeout elapsed first. The operation may still run later.
    TimedOut,
    /// The completer was dropped without a value (worker gone).
    Abandoned,
}

/// Worker side of the slot.
#[derive(Debug)]
pub struct Completer<T> {
    tx: SyncSender<T>,
}

impl<T> Completer<T> {
    /// Deliver the result. Returns `false` when nobody is waiting anymore.
    pub fn complete(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// Caller side of the slot.
#[derive(Debug)]
pub struct Completion<T> {
    rx: Receiver<T>,
    started: Instant,
}

/// Create a connected completer/completion pair. The wait clock starts now.
pub fn slot<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (
        Completer { tx },
        Completion {
            rx,
            started: Instant::now(),
        },
    )
}

impl<T> Completion<T> {
    /// When the request was created.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Block until the worker delivers a value.
    pub fn wait(self) -> Result<T, WaitError> {
        self.rx.recv().map_err(|_| WaitError::Abandoned)
    }

    /// Block until a value arrives or `timeout` has elapsed since the request
    /// was created. `None` waits forever.
    pub fn wait_timeout(self, timeout: Option<Duration>) -> Result<T, WaitError> {
        let Some(timeout) = timeout else {
            return self.wait();
        };
        let remaining = timeout.saturating_sub(self.started.elapsed());
        match self.rx.recv_timeout(remaining) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Abandoned),
        }
    }
}
