//! Pending requests and their waiter entries.

use std::fmt;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use uuid::Uuid;

use crate::host::Operation;

/// Opaque identifier correlating a submitted request with its result.
///
/// Tokens are random (UUID v4), so a token is never handed out twice while
/// any reference to it is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(Uuid);

impl Token {
    /// Generates a fresh token.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued call waiting for the main thread.
///
/// Never mutated after creation; consumed exactly once by a drain pass.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Correlation token.
    pub token: Token,
    /// The host operation to run.
    pub operation: Operation,
    /// Positional arguments.
    pub args: Vec<Value>,
}

/// State of a waiter's result slot.
#[derive(Debug)]
enum Slot {
    Empty,
    Filled(Value),
    Taken,
}

/// Rendezvous point between one waiting caller and the drain loop.
///
/// The slot is written under the entry's own mutex before the condition
/// variable is signalled, and the waiter re-checks the slot under the same
/// mutex, so a signalled waiter always observes the written result.
#[derive(Debug)]
pub(crate) struct WaiterEntry {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl WaiterEntry {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            ready: Condvar::new(),
        }
    }

    /// Publishes the result and wakes the waiter.
    ///
    /// Returns `false` if the slot was already written.
    pub(crate) fn complete(&self, result: Value) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Empty) {
            return false;
        }
        *slot = Slot::Filled(result);
        self.ready.notify_all();
        true
    }

    /// Blocks until the result is published or `deadline` passes.
    ///
    /// Returns the result at most once. After a timeout the entry refuses
    /// further writes.
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<Value> {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Empty) {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }

        // Closed either way: a late result must not count as delivered
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Filled(value) => Some(value),
            Slot::Empty | Slot::Taken => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = Token::fresh();
        let b = Token::fresh();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }

    #[test]
    fn complete_is_write_once() {
        let entry = WaiterEntry::new();
        assert!(entry.complete(json!(1)));
        assert!(!entry.complete(json!(2)));

        let deadline = Instant::now() + Duration::from_millis(10);
        assert_eq!(entry.wait_until(deadline), Some(json!(1)));
        assert_eq!(entry.wait_until(deadline), None);
        assert!(!entry.complete(json!(3)));
    }

    #[test]
    fn wait_times_out_without_result() {
        let entry = WaiterEntry::new();
        let start = Instant::now();
        let result = entry.wait_until(start + Duration::from_millis(30));
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn timed_out_entry_refuses_late_result() {
        let entry = WaiterEntry::new();
        assert_eq!(entry.wait_until(Instant::now() + Duration::from_millis(5)), None);

        assert!(!entry.complete(json!({"late": true})));
        assert_eq!(entry.wait_until(Instant::now()), None);
    }

    #[test]
    fn result_published_from_another_thread_wakes_waiter() {
        let entry = Arc::new(WaiterEntry::new());
        let publisher = Arc::clone(&entry);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.complete(json!({"ok": true}))
        });

        let result = entry.wait_until(Instant::now() + Duration::from_secs(5));
        assert_eq!(result, Some(json!({"ok": true})));
        assert!(handle.join().unwrap());
    }
}
