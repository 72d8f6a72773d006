//! Cross-thread wake signal and the privileged thread's event loop.
//!
//! Any thread may call [`Notifier::notify`]. The privileged thread owns the
//! [`MainThreadLoop`], registers its callbacks with
//! [`MainThreadLoop::on_notify`], and either blocks in
//! [`MainThreadLoop::run`] or polls with [`MainThreadLoop::pump`] from a host
//! event loop it does not own.
//!
//! Notifications are coalesced: several `notify` calls before the loop wakes
//! up produce one callback round. This is enough for a drain loop, which
//! always processes everything queued when it runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::WakeError;

/// Fire-and-forget notification that work is pending for the privileged thread.
pub trait Notifier: Send + Sync {
    /// Requests that the privileged thread run its registered callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`WakeError::Closed`] if the receiving loop has shut down.
    fn notify(&self) -> Result<(), WakeError>;
}

#[derive(Debug, Default)]
struct WakeState {
    pending: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<WakeState>,
    wakeup: Condvar,
}

/// Sending half of the wake signal. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct WakeSignal {
    shared: Arc<Shared>,
}

impl WakeSignal {
    /// Closes the signal.
    ///
    /// A notification already pending is still delivered; after that the
    /// loop's [`MainThreadLoop::run`] returns, and further `notify` calls fail.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.wakeup.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl Notifier for WakeSignal {
    fn notify(&self) -> Result<(), WakeError> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(WakeError::Closed);
        }
        state.pending = true;
        self.shared.wakeup.notify_one();
        Ok(())
    }
}

/// Receiving half of the wake signal, pinned to the privileged thread.
///
/// Callbacks are not required to be `Send`: they run only on the thread that
/// owns the loop, which is what makes it safe for them to hold non-thread-safe
/// host state.
pub struct MainThreadLoop {
    shared: Arc<Shared>,
    callbacks: Vec<Box<dyn FnMut()>>,
}

impl std::fmt::Debug for MainThreadLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadLoop")
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

/// Creates a connected wake signal and main-thread loop.
///
/// Call this on the privileged thread: the loop cannot leave it.
#[must_use]
pub fn channel() -> (WakeSignal, MainThreadLoop) {
    let shared = Arc::new(Shared::default());
    (
        WakeSignal {
            shared: Arc::clone(&shared),
        },
        MainThreadLoop {
            shared,
            callbacks: Vec::new(),
        },
    )
}

impl MainThreadLoop {
    /// Registers a callback to run on every wake-up, in registration order.
    pub fn on_notify(&mut self, callback: impl FnMut() + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Returns a new sending half connected to this loop.
    #[must_use]
    pub fn signal(&self) -> WakeSignal {
        WakeSignal {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Blocks the calling thread, dispatching callbacks for each wake-up,
    /// until the signal is closed.
    ///
    /// Returns the number of callback rounds dispatched.
    pub fn run(&mut self) -> u64 {
        let mut rounds = 0;
        while self.wait(None) {
            self.dispatch();
            rounds += 1;
        }
        tracing::debug!(rounds, "Main-thread loop stopped");
        rounds
    }

    /// Dispatches one round if a notification is pending. Never blocks.
    ///
    /// Returns `true` if callbacks ran.
    pub fn pump(&mut self) -> bool {
        self.pump_timeout(Duration::ZERO)
    }

    /// Waits up to `timeout` for a notification and dispatches one round.
    ///
    /// Returns `true` if callbacks ran.
    pub fn pump_timeout(&mut self, timeout: Duration) -> bool {
        if self.wait(Some(Instant::now() + timeout)) {
            self.dispatch();
            true
        } else {
            false
        }
    }

    /// Consumes one pending notification.
    ///
    /// Returns `false` when the deadline passes with nothing pending, or when
    /// the signal is closed with nothing pending.
    fn wait(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.shared.state.lock();
        loop {
            if state.pending {
                state.pending = false;
                return true;
            }
            if state.closed {
                return false;
            }
            match deadline {
                None => self.shared.wakeup.wait(&mut state),
                Some(deadline) => {
                    if self.shared.wakeup.wait_until(&mut state, deadline).timed_out() {
                        return std::mem::take(&mut state.pending);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self) {
        tracing::trace!(callbacks = self.callbacks.len(), "Main-thread wake-up");
        for callback in &mut self.callbacks {
            callback();
        }
    }
}
