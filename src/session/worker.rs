//! Serialization core.
//!
//! A single worker thread pulls operations off a FIFO queue and runs each one
//! to completion while holding the session lock. The hot-plug coordinator
//! takes the same lock through [`SessionCell::pause`], so no operation can
//! start while a reconciliation is in progress.

use super::completion::{self, Completion};
use super::state::{SessionState, Status};
use crate::error::{SessionError, SessionResult};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::ops::{Deref, DerefMut};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Session state plus a lock-free-to-read snapshot of it.
///
/// The snapshot is republished every time the state lock is released after a
/// mutation, so `status()` never blocks behind a slow driver call.
#[derive(Debug)]
pub(crate) struct SessionCell {
    state: Mutex<SessionState>,
    snapshot: RwLock<Status>,
}

impl SessionCell {
    pub fn new(state: SessionState) -> Self {
        let snapshot = RwLock::new(state.status());
        Self {
            state: Mutex::new(state),
            snapshot,
        }
    }

    pub fn status(&self) -> Status {
        self.snapshot.read().clone()
    }

    /// Hold the session exclusively. While the guard lives the worker cannot
    /// start its next operation; queued operations wait.
    pub fn pause(&self) -> PauseGuard<'_> {
        trace!("pausing session worker");
        PauseGuard {
            state: self.state.lock(),
            snapshot: &self.snapshot,
        }
    }
}

/// Exclusive access to the session state. Publishes the snapshot on drop.
pub(crate) struct PauseGuard<'a> {
    state: MutexGuard<'a, SessionState>,
    snapshot: &'a RwLock<Status>,
}

impl Deref for PauseGuard<'_> {
    type Target = SessionState;

    fn deref(&self) -> &SessionState {
        &self.state
    }
}

impl DerefMut for PauseGuard<'_> {
    fn deref_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        *self.snapshot.write() = self.state.status();
        trace!("session worker resumed");
    }
}

/// Wakes the caller; runs after the session lock is released.
type Finish = Box<dyn FnOnce() + Send>;

type Job = Box<dyn FnOnce(&mut SessionState) -> Finish + Send>;

/// Handle to the worker thread.
#[derive(Debug)]
pub(crate) struct Worker {
    tx: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(cell: Arc<SessionCell>) -> SessionResult<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("serial-session-worker".into())
            .spawn(move || {
                debug!("session worker started");
                while let Ok(job) = rx.recv() {
                    // The snapshot is published when the guard drops, so the
                    // caller never wakes to a stale status.
                    let finish = {
                        let mut guard = cell.pause();
                        job(&mut *guard)
                    };
                    finish();
                }
                debug!("session worker stopped");
            })
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// Queue `op` behind everything submitted before it. The returned
    /// completion yields the operation's result.
    pub fn submit<T, F>(&self, op: F) -> SessionResult<Completion<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionState) -> T + Send + 'static,
    {
        let (completer, completion) = completion::slot();
        let job: Job = Box::new(move |state: &mut SessionState| {
            let value = op(state);
            Box::new(move || {
                if !completer.complete(value) {
                    trace!("operation finished after its caller stopped waiting");
                }
            }) as Finish
        });
        self.tx
            .as_ref()
            .ok_or(SessionError::WorkerStopped)?
            .send(job)
            .map_err(|_| SessionError::WorkerStopped)?;
        Ok(completion)
    }

    /// Run every queued operation, then stop the thread.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("session worker panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
