//! Main-thread request bridge.
//!
//! Fusion 360's API is not thread-safe: every call has to happen on the
//! application's main thread. The MCP server, however, answers tool calls on
//! its own threads. The [`Bridge`] marshals calls across:
//!
//! ```text
//!  caller thread(s)                         privileged (main) thread
//!  ────────────────                         ────────────────────────
//!  invoke(op, args)
//!    ├─ submit ──▶ [queue] ─────────────┐
//!    ├─ notify ──▶ WakeSignal ──▶ MainThreadLoop
//!    │                                  └─▶ drain_and_execute(executor)
//!    │                                        ├─ pop oldest request
//!    │                                        ├─ executor(op, args)
//!    └─ await_result ◀── [waiter registry] ◀──┴─ publish result
//! ```
//!
//! Host failures never cross the bridge as Rust errors: a failing or
//! panicking executor produces an *error-shaped result* (a JSON object with
//! an `"error"` field) that is delivered like any other result. Only
//! timeouts and wake failures are reported as [`BridgeError`].

mod error;
mod request;
pub mod wake;

pub use error::{BridgeError, BridgeResult, WakeError};
pub use request::{PendingRequest, Token};
pub use wake::{MainThreadLoop, Notifier, WakeSignal};

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::host::Operation;
use request::WaiterEntry;

/// Default upper bound a caller waits for the main thread.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Name of the field that marks a result as error-shaped.
pub const ERROR_FIELD: &str = "error";

/// Builds an error-shaped result.
#[must_use]
pub fn error_result(message: impl Into<String>) -> Value {
    let message: String = message.into();
    json!({ ERROR_FIELD: message })
}

/// Returns the message of an error-shaped result, if it is one.
#[must_use]
pub fn error_message(result: &Value) -> Option<&str> {
    result.get(ERROR_FIELD).and_then(Value::as_str)
}

/// Returns `true` if the result carries the designated error field.
#[must_use]
pub fn is_error_result(result: &Value) -> bool {
    result.get(ERROR_FIELD).is_some()
}

/// Runs host operations on the privileged thread.
///
/// Implemented by [`crate::host::CapabilityTable`] and by any closure of the
/// right shape.
pub trait Executor {
    /// Failure raised by a host call.
    type Error: fmt::Display;

    /// Executes one operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the host call fails. The bridge turns it into an
    /// error-shaped result.
    fn execute(&mut self, operation: &Operation, args: &[Value]) -> Result<Value, Self::Error>;
}

impl<F, E> Executor for F
where
    F: FnMut(&Operation, &[Value]) -> Result<Value, E>,
    E: fmt::Display,
{
    type Error = E;

    fn execute(&mut self, operation: &Operation, args: &[Value]) -> Result<Value, E> {
        self(operation, args)
    }
}

/// Counters for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Requests popped and executed.
    pub executed: usize,
    /// Results handed to a registered waiter.
    pub delivered: usize,
    /// Results dropped because the waiter had already given up.
    pub orphaned: usize,
    /// Executions that produced an error-shaped result from a failure or panic.
    pub failed: usize,
}

/// Request queue and waiter registry shared by callers and the main thread.
///
/// Construct one per process, wrap it in an [`Arc`], and hand clones to the
/// network-facing side and to the main-thread drain callback.
pub struct Bridge {
    queue: Mutex<VecDeque<PendingRequest>>,
    waiters: Mutex<HashMap<Token, Arc<WaiterEntry>>>,
    notifier: Box<dyn Notifier>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("pending", &self.pending_count())
            .field("waiters", &self.waiter_count())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge that wakes the main thread through `notifier`.
    #[must_use]
    pub fn new(notifier: impl Notifier + 'static) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            waiters: Mutex::new(HashMap::new()),
            notifier: Box::new(notifier),
        }
    }

    /// Number of requests waiting for a drain pass.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of registered waiters.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Queues a request and registers its waiter.
    ///
    /// Does not wake the main thread; [`invoke`](Self::invoke) does.
    pub fn submit(&self, operation: impl Into<Operation>, args: Vec<Value>) -> Token {
        let token = Token::fresh();
        let operation = operation.into();

        {
            let mut waiters = self.waiters.lock();
            let previous = waiters.insert(token, Arc::new(WaiterEntry::new()));
            debug_assert!(previous.is_none(), "token {token} registered twice");
        }

        trace!(%token, operation = %operation, "Request queued");
        self.queue.lock().push_back(PendingRequest {
            token,
            operation,
            args,
        });

        token
    }

    /// Blocks until the result for `token` is published or `timeout` elapses.
    ///
    /// The waiter is removed from the registry either way, so a result the
    /// main thread publishes after a timeout is dropped.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::UnknownToken`] if no waiter is registered for `token`
    /// - [`BridgeError::Timeout`] if no result arrived in time
    pub fn await_result(&self, token: Token, timeout: Duration) -> BridgeResult<Value> {
        let entry = self
            .waiters
            .lock()
            .get(&token)
            .cloned()
            .ok_or(BridgeError::UnknownToken { token })?;

        let start = Instant::now();
        let result = entry.wait_until(start + timeout);
        self.waiters.lock().remove(&token);

        result.ok_or_else(|| {
            warn!(%token, ?timeout, "Timed out waiting for main thread");
            BridgeError::Timeout {
                token,
                waited: start.elapsed(),
            }
        })
    }

    /// Drains the queue on the privileged thread.
    ///
    /// Requests are executed oldest-first until the queue is empty, including
    /// any submitted while the pass is running. Every popped request yields
    /// exactly one outcome: the executor's value, or an error-shaped result
    /// when it fails or panics.
    pub fn drain_and_execute<E>(&self, executor: &mut E) -> DrainStats
    where
        E: Executor + ?Sized,
    {
        let mut stats = DrainStats::default();

        loop {
            let next = self.queue.lock().pop_front();
            let Some(request) = next else {
                break;
            };

            let (result, failed) = execute_guarded(executor, &request);
            stats.executed += 1;
            if failed {
                stats.failed += 1;
            }

            let entry = self.waiters.lock().get(&request.token).cloned();
            if entry.is_some_and(|entry| entry.complete(result)) {
                stats.delivered += 1;
            } else {
                debug!(
                    token = %request.token,
                    operation = %request.operation,
                    "Dropping result: caller no longer waiting"
                );
                stats.orphaned += 1;
            }
        }

        if stats.executed > 0 {
            debug!(
                executed = stats.executed,
                delivered = stats.delivered,
                orphaned = stats.orphaned,
                failed = stats.failed,
                "Drain pass complete"
            );
        }

        stats
    }

    /// Runs one operation on the main thread and waits for its result.
    ///
    /// This is the synchronous call the network-facing side makes once per
    /// inbound tool call.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::WakeFailed`] if the main thread cannot be notified;
    ///   the request is withdrawn before it runs
    /// - [`BridgeError::Timeout`] if no result arrives within `timeout`; the
    ///   host call may still run later and its result is discarded
    pub fn invoke(
        &self,
        operation: impl Into<Operation>,
        args: Vec<Value>,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        let token = self.submit(operation, args);

        if let Err(source) = self.notifier.notify() {
            self.withdraw(token);
            warn!(%token, error = %source, "Could not wake main thread");
            return Err(BridgeError::WakeFailed { source });
        }

        self.await_result(token, timeout)
    }

    /// Removes a request that has not run yet, and its waiter.
    fn withdraw(&self, token: Token) {
        self.queue.lock().retain(|request| request.token != token);
        self.waiters.lock().remove(&token);
    }
}

/// Executes one request, converting failures and panics into error-shaped results.
///
/// Returns the result and whether it came from a failure.
fn execute_guarded<E>(executor: &mut E, request: &PendingRequest) -> (Value, bool)
where
    E: Executor + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        executor.execute(&request.operation, &request.args)
    }));

    match outcome {
        Ok(Ok(value)) => (value, false),
        Ok(Err(e)) => {
            debug!(operation = %request.operation, error = %e, "Host call failed");
            (error_result(format!("API call failed: {e}")), true)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(operation = %request.operation, %message, "Host call panicked");
            (error_result(format!("API call failed: {message}")), true)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "host call panicked".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn bridge() -> (Bridge, MainThreadLoop) {
        let (signal, main_loop) = wake::channel();
        (Bridge::new(signal), main_loop)
    }

    /// Test executor: `noop`, `echo`, `boom` (fails with "x") and `panic`.
    fn test_executor(operation: &Operation, args: &[Value]) -> Result<Value, String> {
        match operation.name() {
            "noop" => Ok(json!({"ok": true})),
            "echo" => Ok(json!({"op": operation.name(), "args": args})),
            "boom" => Err("x".to_string()),
            "panic" => panic!("host exploded"),
            other => Ok(error_result(format!("Unknown function: {other}"))),
        }
    }

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(5);

    #[test]
    fn noop_round_trip() {
        let (bridge, _loop) = bridge();
        let token = bridge.submit("noop", vec![]);

        let stats = bridge.drain_and_execute(&mut test_executor);
        assert_eq!(stats.executed, 1);
        assert_eq!(stats.delivered, 1);

        let result = bridge.await_result(token, LONG).unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert_eq!(bridge.waiter_count(), 0);
    }

    #[test]
    fn failing_call_becomes_error_shaped_result() {
        let (bridge, _loop) = bridge();
        let token = bridge.submit("boom", vec![]);

        let stats = bridge.drain_and_execute(&mut test_executor);
        assert_eq!(stats.failed, 1);

        let result = bridge.await_result(token, LONG).unwrap();
        assert!(is_error_result(&result));
        assert!(error_message(&result).unwrap().contains('x'));
    }

    #[test]
    fn panicking_call_does_not_abort_the_pass() {
        let (bridge, _loop) = bridge();
        let exploding = bridge.submit("panic", vec![]);
        let after = bridge.submit("noop", vec![]);

        let stats = bridge.drain_and_execute(&mut test_executor);
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 1);

        let result = bridge.await_result(exploding, LONG).unwrap();
        assert_eq!(
            error_message(&result),
            Some("API call failed: host exploded")
        );
        assert_eq!(
            bridge.await_result(after, LONG).unwrap(),
            json!({"ok": true})
        );
    }

    #[test]
    fn unknown_function_is_reported_as_data() {
        let (bridge, _loop) = bridge();
        let token = bridge.submit("does_not_exist", vec![]);
        bridge.drain_and_execute(&mut test_executor);

        let result = bridge.await_result(token, LONG).unwrap();
        assert_eq!(
            error_message(&result),
            Some("Unknown function: does_not_exist")
        );
    }

    #[test]
    fn draining_empty_queue_is_a_no_op() {
        let (bridge, _loop) = bridge();
        let stats = bridge.drain_and_execute(&mut test_executor);
        assert_eq!(stats, DrainStats::default());
    }

    #[test]
    fn timeout_then_late_drain_discards_result() {
        let (bridge, _loop) = bridge();
        let token = bridge.submit("noop", vec![]);

        let err = bridge.await_result(token, SHORT).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(bridge.waiter_count(), 0);

        let stats = bridge.drain_and_execute(&mut test_executor);
        assert_eq!(stats.executed, 1);
        assert_eq!(stats.orphaned, 1);
        assert_eq!(stats.delivered, 0);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[test]
    fn drain_racing_a_timeout_counts_result_as_orphaned() {
        let (bridge, _loop) = bridge();
        let token = bridge.submit("noop", vec![]);

        // The caller has given up but not yet left the registry
        let entry = bridge.waiters.lock().get(&token).cloned().unwrap();
        assert_eq!(entry.wait_until(Instant::now()), None);
        assert_eq!(bridge.waiter_count(), 1);

        let stats = bridge.drain_and_execute(&mut test_executor);
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.orphaned, 1);
    }

    #[test]
    fn awaiting_twice_reports_unknown_token() {
        let (bridge, _loop) = bridge();
        let token = bridge.submit("noop", vec![]);
        bridge.drain_and_execute(&mut test_executor);

        bridge.await_result(token, LONG).unwrap();
        let err = bridge.await_result(token, LONG).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownToken { .. }));
    }

    #[test]
    fn queue_is_drained_in_submission_order() {
        let (bridge, _loop) = bridge();
        let tokens: Vec<_> = (0..5).map(|i| bridge.submit("echo", vec![json!(i)])).collect();

        let mut seen = Vec::new();
        bridge.drain_and_execute(&mut |_: &Operation, args: &[Value]| {
            seen.push(args[0].clone());
            Ok::<_, String>(json!(null))
        });

        assert_eq!(seen, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
        for token in tokens {
            bridge.await_result(token, LONG).unwrap();
        }
    }

    #[test]
    fn submissions_during_a_pass_are_picked_up_by_the_same_pass() {
        let (bridge, _loop) = bridge();
        let first = bridge.submit("noop", vec![]);
        let mut late = None;

        let stats = bridge.drain_and_execute(&mut |op: &Operation, _: &[Value]| {
            if late.is_none() {
                late = Some(bridge.submit("echo", vec![json!("late")]));
            }
            Ok::<_, String>(json!({"ran": op.name()}))
        });

        assert_eq!(stats.executed, 2);
        assert_eq!(
            bridge.await_result(first, LONG).unwrap(),
            json!({"ran": "noop"})
        );
        assert_eq!(
            bridge.await_result(late.unwrap(), LONG).unwrap(),
            json!({"ran": "echo"})
        );
    }

    #[test]
    fn concurrent_callers_receive_their_own_results() {
        let (bridge, _loop) = bridge();
        let bridge = Arc::new(bridge);
        let barrier = Arc::new(Barrier::new(3));

        let spawn_caller = |name: &'static str, arg: i64| {
            let bridge = Arc::clone(&bridge);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let token = bridge.submit(name, vec![json!(arg)]);
                barrier.wait();
                bridge.await_result(token, LONG)
            })
        };

        let a = spawn_caller("f1", 1);
        let b = spawn_caller("f2", 2);

        // Both requests are queued before the single drain pass
        barrier.wait();
        let stats = bridge.drain_and_execute(&mut |op: &Operation, args: &[Value]| {
            Ok::<_, String>(json!({"function": op.name(), "arg": args[0]}))
        });
        assert_eq!(stats.executed, 2);

        assert_eq!(
            a.join().unwrap().unwrap(),
            json!({"function": "f1", "arg": 1})
        );
        assert_eq!(
            b.join().unwrap().unwrap(),
            json!({"function": "f2", "arg": 2})
        );
    }

    #[test]
    fn invoke_wakes_main_thread_and_returns_result() {
        let (bridge, mut main_loop) = bridge();
        let bridge = Arc::new(bridge);

        let drain_bridge = Arc::clone(&bridge);
        main_loop.on_notify(move || {
            drain_bridge.drain_and_execute(&mut test_executor);
        });

        let caller_bridge = Arc::clone(&bridge);
        let caller = thread::spawn(move || caller_bridge.invoke("noop", vec![], LONG));

        assert!(main_loop.pump_timeout(LONG));
        assert_eq!(caller.join().unwrap().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn invoke_after_close_withdraws_request() {
        let (bridge, main_loop) = bridge();
        main_loop.signal().close();

        let err = bridge.invoke("noop", vec![], SHORT).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::WakeFailed {
                source: WakeError::Closed
            }
        ));
        assert_eq!(bridge.pending_count(), 0);
        assert_eq!(bridge.waiter_count(), 0);
    }

    #[test]
    fn panic_message_handles_both_payload_types() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(static_str.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "host call panicked");
    }
}
