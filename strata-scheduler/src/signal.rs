// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! A coalescing wake-up primitive: `signal()` atomically sets a pending flag
//! and wakes a single waiter; `await_signal()` returns immediately if the
//! flag is already set (clearing it), otherwise blocks until `signal()`.
//!
//! This replaces a per-event condition queue with a single boolean flag
//! guarded by a mutex/condvar — no event is ever lost: a `signal()`
//! observed after a check-and-wait is observed by the next wait.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

pub struct SignalQueuingCondition {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl Default for SignalQueuingCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalQueuingCondition {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Atomically set the pending flag and wake one waiter.
    pub fn signal(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.condvar.notify_one();
    }

    /// Return immediately (clearing the flag) if a signal is already
    /// pending; otherwise block until the next `signal()`.
    pub fn await_signal(&self) {
        let mut pending = self.pending.lock();
        if *pending {
            *pending = false;
            return;
        }
        self.condvar.wait(&mut pending);
        *pending = false;
    }

    /// Like `await_signal`, but gives up after `timeout` and returns
    /// whether a signal was actually observed.
    pub fn await_signal_timeout(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if *pending {
            *pending = false;
            return true;
        }
        let result = self.condvar.wait_for(&mut pending, timeout);
        let fired = *pending && !result.timed_out();
        *pending = false;
        fired
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn signal_before_wait_is_not_lost() {
        let cond = SignalQueuingCondition::new();
        cond.signal();
        // Must return immediately, not block.
        cond.await_signal();
    }

    #[test]
    fn waiter_wakes_on_signal_from_another_thread() {
        let cond = Arc::new(SignalQueuingCondition::new());
        let waiter = cond.clone();
        let handle = thread::spawn(move || {
            waiter.await_signal();
        });

        thread::sleep(Duration::from_millis(20));
        cond.signal();

        handle.join().unwrap();
    }

    #[test]
    fn timeout_without_signal_reports_not_fired() {
        let cond = SignalQueuingCondition::new();
        let fired = cond.await_signal_timeout(Duration::from_millis(20));
        assert!(!fired);
    }
}
