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

//! Runtime-wide tunables. Loading this from a file or environment is left to
//! the CLI/driver bootstrap, which is out of scope for this crate; this
//! module only owns the struct, its defaults and builder methods.

use serde::Deserialize;

/// The fixed hash-range multiplier: `hashRange` for a shuffle edge is the
/// smallest prime `>= multiplier * dstParallelism`.
pub const HASH_RANGE_MULTIPLIER: u32 = 5;

/// Default number of top buckets (by size) flagged as skewed.
pub const DEFAULT_SKEWED_KEY_COUNT: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Number of top-K largest buckets flagged as skewed by the Key-Range
    /// Planner.
    pub skewed_key_count: usize,
    /// Notional per-attempt scheduling timeout recorded by the policy
    /// (`getScheduleTimeoutMs`); there is no hard timer driven by
    /// this value, only logging around slow placement attempts.
    pub schedule_timeout_ms: u64,
    /// Number of resubmissions allowed for a task group failing with a
    /// recoverable cause before it becomes `failed-unrecoverable`.
    pub max_resubmit_attempts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            skewed_key_count: DEFAULT_SKEWED_KEY_COUNT,
            schedule_timeout_ms: 10_000,
            max_resubmit_attempts: 4,
        }
    }
}

impl RuntimeConfig {
    pub fn with_skewed_key_count(mut self, n: usize) -> Self {
        self.skewed_key_count = n;
        self
    }

    pub fn with_schedule_timeout_ms(mut self, ms: u64) -> Self {
        self.schedule_timeout_ms = ms;
        self
    }

    pub fn with_max_resubmit_attempts(mut self, n: u32) -> Self {
        self.max_resubmit_attempts = n;
        self
    }
}
