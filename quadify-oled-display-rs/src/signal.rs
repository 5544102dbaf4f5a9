//! Cancellation signal shared between a playback loop and its controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Inner {
    set: Mutex<bool>,
    changed: Condvar,
}

/// A clonable, externally settable stop flag.
///
/// Playback loops poll it with [`is_set`](Self::is_set) and sleep on it with
/// [`wait_timeout`](Self::wait_timeout), which returns as soon as the flag
/// is raised, so a stop is observed without waiting for the current frame's
/// delay to run out.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter.
    pub fn set(&self) {
        let mut set = self.inner.set.lock();
        *set = true;
        self.inner.changed.notify_all();
    }

    /// Lower the flag so the signal can be reused.
    pub fn reset(&self) {
        *self.inner.set.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.inner.set.lock()
    }

    /// Sleep for up to `timeout`, returning early if the flag is raised.
    ///
    /// Returns `true` if the flag is set when the call returns.
    ///
    /// A timeout too large to represent as an [`Instant`] waits until the
    /// flag is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        let mut set = self.inner.set.lock();
        while !*set {
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .changed
                        .wait_until(&mut set, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.inner.changed.wait(&mut set),
            }
        }
        *set
    }
}

/// `now + after`, or `None` if that instant cannot be represented.
pub(crate) fn deadline_after(after: Duration) -> Option<Instant> {
    Instant::now().checked_add(after)
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_lowered() {
        let signal = StopSignal::new();
        assert!(!signal.is_set());
    }

    #[test]
    fn clones_share_state() {
        let signal = StopSignal::new();
        let other = signal.clone();
        other.set();
        assert!(signal.is_set());
        signal.reset();
        assert!(!other.is_set());
    }

    #[test]
    fn wait_times_out_when_never_set() {
        let signal = StopSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_returns_early_when_set() {
        let signal = StopSignal::new();
        let setter = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });
        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn unbounded_wait_returns_when_set() {
        let signal = StopSignal::new();
        let setter = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });
        assert!(signal.wait_timeout(Duration::MAX));
        handle.join().unwrap();
    }

    #[test]
    fn unrepresentable_deadline_is_none() {
        assert!(deadline_after(Duration::MAX).is_none());
        assert!(deadline_after(Duration::from_secs(1)).is_some());
    }

    #[test]
    fn wait_on_raised_signal_is_immediate() {
        let signal = StopSignal::new();
        signal.set();
        assert!(signal.wait_timeout(Duration::from_secs(5)));
    }
}
