//! Connect/disconnect notifications.
//!
//! Notifications are queued to a dispatcher thread, which hands each one to
//! the observer on a fresh short-lived thread and waits for it before taking
//! the next. Senders never block on the observer; a panicking observer only
//! loses its own notification; delivery order matches queue order.

use super::state::Status;
use crate::error::{SessionError, SessionResult};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Receives hot-plug transitions for a session.
///
/// Callbacks run on a dedicated notification thread, never on the caller's
/// thread or the session worker.
pub trait SessionObserver: Send + Sync {
    /// A device of the watched class appeared. Informational: nothing is
    /// opened automatically.
    fn on_connected(&self, notification: &Notification);

    /// The session's device disappeared and the session was closed.
    fn on_disconnected(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Connected,
    Disconnected,
}

/// A delivered transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Identifier reported by the device directory.
    pub device: String,
    /// Session status right after the transition was applied.
    pub status: Status,
}

impl Notification {
    pub fn connected(device: impl Into<String>, status: Status) -> Self {
        Self {
            kind: NotificationKind::Connected,
            device: device.into(),
            status,
        }
    }

    pub fn disconnected(device: impl Into<String>, status: Status) -> Self {
        Self {
            kind: NotificationKind::Disconnected,
            device: device.into(),
            status,
        }
    }
}

/// Set-once, non-owning observer registration shared with the dispatcher.
pub(crate) type ObserverSlot = Arc<OnceCell<Weak<dyn SessionObserver>>>;

pub(crate) fn register(
    slot: &ObserverSlot,
    observer: Weak<dyn SessionObserver>,
) -> SessionResult<()> {
    slot.set(observer).map_err(|_| SessionError::ObserverAlreadySet)
}

/// Queues notifications for the dispatcher.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    tx: Sender<Notification>,
}

impl Notifier {
    pub fn notify(&self, notification: Notification) {
        trace!(kind = ?notification.kind, device = %notification.device, "queueing notification");
        if self.tx.send(notification).is_err() {
            debug!("notification dispatcher gone, dropping notification");
        }
    }
}

#[derive(Debug)]
pub(crate) struct NotificationDispatcher {
    tx: Option<Sender<Notification>>,
    thread: Option<JoinHandle<()>>,
}

impl NotificationDispatcher {
    pub fn spawn(observer: ObserverSlot) -> SessionResult<Self> {
        let (tx, rx) = mpsc::channel::<Notification>();
        let thread = thread::Builder::new()
            .name("serial-session-dispatch".into())
            .spawn(move || {
                while let Ok(notification) = rx.recv() {
                    deliver(&observer, notification);
                }
                debug!("notification dispatcher stopped");
            })
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn notifier(&self) -> Option<Notifier> {
        self.tx.as_ref().map(|tx| Notifier { tx: tx.clone() })
    }

    /// Deliver what is queued, then stop. Other `Notifier` clones must be
    /// dropped first or this waits for them.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("notification dispatcher panicked");
            }
        }
    }
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(slot: &ObserverSlot, notification: Notification) {
    let Some(observer) = slot.get().and_then(Weak::upgrade) else {
        trace!(device = %notification.device, "no live observer, notification dropped");
        return;
    };

    let spawned = thread::Builder::new()
        .name("serial-session-notify".into())
        .spawn(move || match notification.kind {
            NotificationKind::Connected => observer.on_connected(&notification),
            NotificationKind::Disconnected => observer.on_disconnected(&notification),
        });

    match spawned {
        Ok(handle) => {
            if handle.join().is_err() {
                warn!("session observer panicked during notification");
            }
        }
        Err(e) => warn!(error = %e, "failed to spawn notification thread"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(NotificationKind, String)>>,
        threads: Mutex<Vec<Option<String>>>,
    }

    impl SessionObserver for Recorder {
        fn on_connected(&self, n: &Notification) {
            self.threads.lock().push(thread::current().name().map(str::to_string));
            self.seen.lock().push((n.kind, n.device.clone()));
        }

        fn on_disconnected(&self, n: &Notification) {
            self.seen.lock().push((n.kind, n.device.clone()));
        }
    }

    fn closed() -> Status {
        Status {
            path: None,
            connected: false,
            baud_rate: 9600,
        }
    }

    #[test]
    fn test_delivers_in_order_on_notification_thread() {
        let slot: ObserverSlot = Arc::new(OnceCell::new());
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SessionObserver> = Arc::<Recorder>::downgrade(&recorder);
        register(&slot, weak).unwrap();

        let mut dispatcher = NotificationDispatcher::spawn(Arc::clone(&slot)).unwrap();
        let notifier = dispatcher.notifier().unwrap();
        notifier.notify(Notification::connected("A", closed()));
        notifier.notify(Notification::disconnected("A", closed()));
        notifier.notify(Notification::connected("B", closed()));
        drop(notifier);
        dispatcher.shutdown();

        assert_eq!(
            *recorder.seen.lock(),
            vec![
                (NotificationKind::Connected, "A".to_string()),
                (NotificationKind::Disconnected, "A".to_string()),
                (NotificationKind::Connected, "B".to_string()),
            ]
        );
        assert!(recorder
            .threads
            .lock()
            .iter()
            .all(|name| name.as_deref() == Some("serial-session-notify")));
    }

    #[test]
    fn test_second_registration_rejected() {
        let slot: ObserverSlot = Arc::new(OnceCell::new());
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SessionObserver> = Arc::<Recorder>::downgrade(&recorder);
        register(&slot, weak.clone()).unwrap();
        assert!(matches!(
            register(&slot, weak),
            Err(SessionError::ObserverAlreadySet)
        ));
    }

    /// Panics on its first callback, records every later one.
    #[derive(Default)]
    struct PanicsOnce {
        calls: Mutex<usize>,
        seen: Mutex<Vec<(NotificationKind, String)>>,
    }

    impl PanicsOnce {
        fn handle(&self, n: &Notification) {
            let first = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls == 1
            };
            if first {
                panic!("observer bug");
            }
            self.seen.lock().push((n.kind, n.device.clone()));
        }
    }

    impl SessionObserver for PanicsOnce {
        fn on_connected(&self, n: &Notification) {
            self.handle(n);
        }

        fn on_disconnected(&self, n: &Notification) {
            self.handle(n);
        }
    }

    #[test]
    fn test_panicking_observer_does_not_stop_dispatch() {
        let slot: ObserverSlot = Arc::new(OnceCell::new());
        let observer = Arc::new(PanicsOnce::default());
        let weak: Weak<dyn SessionObserver> = Arc::<PanicsOnce>::downgrade(&observer);
        register(&slot, weak).unwrap();

        let mut dispatcher = NotificationDispatcher::spawn(slot).unwrap();
        let notifier = dispatcher.notifier().unwrap();
        notifier.notify(Notification::connected("A", closed()));
        notifier.notify(Notification::connected("B", closed()));
        notifier.notify(Notification::disconnected("A", closed()));
        drop(notifier);
        dispatcher.shutdown();

        assert_eq!(*observer.calls.lock(), 3);
        assert_eq!(
            *observer.seen.lock(),
            vec![
                (NotificationKind::Connected, "B".to_string()),
                (NotificationKind::Disconnected, "A".to_string()),
            ]
        );
    }

    #[test]
    fn test_dropped_observer_is_not_kept_alive() {
        let slot: ObserverSlot = Arc::new(OnceCell::new());
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SessionObserver> = Arc::<Recorder>::downgrade(&recorder);
        register(&slot, weak).unwrap();
        drop(recorder);

        assert!(slot.get().and_then(Weak::upgrade).is_none());
        deliver(&slot, Notification::connected("A", closed()));
    }
}
