// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared control channel between the caller and dispatcher threads
//!
//! A fixed array of atomic 32-bit slots: slot 0 carries the pending
//! operation code, every other slot is one operation's result cell. Each
//! slot pairs its atomic with a mutex/condvar so either side can block on a
//! value change without busy-polling.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use relayfs_proto::{OperationCode, ResultCode, OP_IDLE, RESULT_PENDING};

const COMMAND_SLOT: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaitOutcome {
    Changed(i32),
    TimedOut,
}

struct Slot {
    value: AtomicI32,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            value: AtomicI32::new(OP_IDLE),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    fn load(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    fn store(&self, value: i32) {
        self.value.store(value, Ordering::SeqCst);
    }

    fn take(&self, replacement: i32) -> i32 {
        self.value.swap(replacement, Ordering::SeqCst)
    }

    fn store_and_notify(&self, value: i32) {
        self.value.store(value, Ordering::SeqCst);
        // Taking the lock orders the store against a waiter that has checked
        // the value but not yet parked.
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_all();
    }

    fn wait_while_eq(&self, parked: i32, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().unwrap();
        loop {
            let value = self.value.load(Ordering::SeqCst);
            if value != parked {
                return WaitOutcome::Changed(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let (next, _timed_out) = self.cond.wait_timeout(guard, deadline - now).unwrap();
            guard = next;
        }
    }

    fn wait_while_eq_blocking(&self, parked: i32) -> i32 {
        let mut guard = self.lock.lock().unwrap();
        loop {
            let value = self.value.load(Ordering::SeqCst);
            if value != parked {
                return value;
            }
            guard = self.cond.wait(guard).unwrap();
        }
    }
}

/// One pending call at a time: the caller posts a command and parks on the
/// operation's result slot; the dispatcher consumes the command and
/// publishes the result.
pub struct ControlChannel {
    slots: Vec<Slot>,
}

impl ControlChannel {
    pub fn new() -> Self {
        Self {
            slots: (0..OperationCode::SLOT_COUNT).map(|_| Slot::new()).collect(),
        }
    }

    /// Caller side: park the operation's result slot, then post its code.
    pub fn post(&self, op: OperationCode) {
        self.slots[op.result_slot()].store(RESULT_PENDING);
        self.slots[COMMAND_SLOT].store_and_notify(op as i32);
    }

    /// Caller side: block until the dispatcher publishes a result for `op`.
    pub fn await_result(&self, op: OperationCode) -> i32 {
        self.slots[op.result_slot()].wait_while_eq_blocking(RESULT_PENDING)
    }

    /// Dispatcher side: block until a command is posted or the timeout
    /// elapses. Consuming the code clears the command slot so a stale value
    /// cannot re-trigger dispatch.
    pub fn next_op(&self, timeout: Duration) -> Option<i32> {
        match self.slots[COMMAND_SLOT].wait_while_eq(OP_IDLE, timeout) {
            WaitOutcome::TimedOut => None,
            WaitOutcome::Changed(_) => {
                let code = self.slots[COMMAND_SLOT].take(OP_IDLE);
                (code != OP_IDLE).then_some(code)
            }
        }
    }

    /// Dispatcher side: publish a handler's result and wake the caller.
    pub fn publish(&self, op: OperationCode, rc: ResultCode) {
        self.slots[op.result_slot()].store_and_notify(rc as i32);
    }

    /// Current value of an operation's result slot, without waiting.
    pub fn peek_result(&self, op: OperationCode) -> i32 {
        self.slots[op.result_slot()].load()
    }

    /// Post a raw command-slot value. Protocol plumbing for callers that
    /// maintain their own code table; well-behaved callers use [`post`].
    ///
    /// [`post`]: ControlChannel::post
    pub fn post_raw(&self, code: i32) {
        self.slots[COMMAND_SLOT].store_and_notify(code);
    }
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self::new()
    }
}
