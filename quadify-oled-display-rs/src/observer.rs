//! Mode-change notification.
//!
//! Screens and menus register interest in mode transitions (`"clock"`,
//! `"menu"`, `"webradio"`, ...) and are called back synchronously, in
//! registration order, whenever the active mode changes.

use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error};
use parking_lot::RwLock;

/// Error type a callback may return.
pub type CallbackError = Box<dyn Error + Send + Sync>;

/// A registered mode-change callback.
pub type ModeCallback = Arc<dyn Fn(&str) -> Result<(), CallbackError> + Send + Sync>;

/// Registry of mode-change callbacks owned by the display service.
///
/// Each callback is isolated: an `Err` return or a panic is caught and
/// logged, and the remaining callbacks still run.
#[derive(Default)]
pub struct ModeObservers {
    callbacks: RwLock<Vec<ModeCallback>>,
}

impl ModeObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the registry.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&str) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let mut callbacks = self.callbacks.write();
        callbacks.push(Arc::new(callback));
        debug!("Added mode change callback #{}", callbacks.len());
    }

    /// Invoke every callback with `mode`, in registration order.
    ///
    /// The registry is snapshotted first, so callbacks may register further
    /// callbacks; those are only invoked on the next notification.
    ///
    /// Returns the number of callbacks that failed.
    pub fn notify(&self, mode: &str) -> usize {
        debug!("Notifying mode change to: {}", mode);
        let snapshot: Vec<ModeCallback> = self.callbacks.read().clone();

        let mut failures = 0;
        for (index, callback) in snapshot.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(mode))) {
                Ok(Ok(())) => debug!("Successfully executed callback #{}", index),
                Ok(Err(e)) => {
                    failures += 1;
                    error!("Error in mode change callback #{}: {}", index, e);
                }
                Err(_) => {
                    failures += 1;
                    error!("Mode change callback #{} panicked", index);
                }
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl std::fmt::Debug for ModeObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeObservers")
            .field("callbacks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str, &str)) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |tag: &str, mode: &str| {
            sink.lock().push(format!("{}:{}", tag, mode))
        })
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let observers = ModeObservers::new();
        let (log, record) = recorder();
        let record = Arc::new(record);
        for tag in ["menu", "clock", "screensaver"] {
            let record = Arc::clone(&record);
            observers.register(move |mode| {
                record(tag, mode);
                Ok(())
            });
        }

        assert_eq!(observers.notify("webradio"), 0);
        assert_eq!(
            *log.lock(),
            ["menu:webradio", "clock:webradio", "screensaver:webradio"]
        );
    }

    #[test]
    fn failing_callback_does_not_stop_the_rest() {
        let observers = ModeObservers::new();
        let (log, record) = recorder();
        let record = Arc::new(record);

        let first = Arc::clone(&record);
        observers.register(move |mode| {
            first("a", mode);
            Ok(())
        });
        observers.register(|_| Err("screen not ready".into()));
        observers.register(|_| panic!("bad callback"));
        let last = Arc::clone(&record);
        observers.register(move |mode| {
            last("d", mode);
            Ok(())
        });

        assert_eq!(observers.notify("clock"), 2);
        assert_eq!(*log.lock(), ["a:clock", "d:clock"]);
    }

    #[test]
    fn callback_may_register_during_notify() {
        let observers = Arc::new(ModeObservers::new());
        let inner = Arc::clone(&observers);
        observers.register(move |_| {
            inner.register(|_| Ok(()));
            Ok(())
        });

        assert_eq!(observers.notify("menu"), 0);
        assert_eq!(observers.len(), 2);
    }

    #[test]
    fn empty_registry_notifies_nobody() {
        let observers = ModeObservers::new();
        assert!(observers.is_empty());
        assert_eq!(observers.notify("menu"), 0);
    }
}
