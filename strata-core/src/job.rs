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

//! Per-job and per-task-group state machines.

use crate::error::FailureCause;

/// `{pending -> executing -> {complete, failed}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Executing,
    Complete,
    Failed,
}

/// `{ready -> executing -> {complete, failed-recoverable(cause), failed-unrecoverable, on-hold}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskGroupStatus {
    Ready,
    Executing,
    Complete,
    FailedRecoverable(FailureCause),
    FailedUnrecoverable,
    OnHold,
}

/// Tracks one task group's state plus the resubmission count used to decide
/// when a recoverable failure escalates to `FailedUnrecoverable` after an
/// implementation-defined retry count.
#[derive(Debug, Clone)]
pub struct TaskGroupRecord {
    pub status: TaskGroupStatus,
    pub resubmit_count: u32,
}

impl TaskGroupRecord {
    pub fn new() -> Self {
        Self {
            status: TaskGroupStatus::Ready,
            resubmit_count: 0,
        }
    }

    /// Record a recoverable failure. Returns `true` if the task group
    /// should be resubmitted, `false` if it has exceeded `max_attempts` and
    /// has been escalated to `FailedUnrecoverable`.
    pub fn record_recoverable_failure(
        &mut self,
        cause: FailureCause,
        max_attempts: u32,
    ) -> bool {
        self.resubmit_count += 1;
        if self.resubmit_count > max_attempts {
            self.status = TaskGroupStatus::FailedUnrecoverable;
            false
        } else {
            self.status = TaskGroupStatus::FailedRecoverable(cause);
            true
        }
    }

    pub fn mark_executing(&mut self) {
        self.status = TaskGroupStatus::Executing;
    }

    pub fn mark_complete(&mut self) {
        self.status = TaskGroupStatus::Complete;
    }

    pub fn mark_unrecoverable(&mut self) {
        self.status = TaskGroupStatus::FailedUnrecoverable;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskGroupStatus::Complete | TaskGroupStatus::FailedUnrecoverable
        )
    }
}

impl Default for TaskGroupRecord {
    fn default() -> Self {
        Self::new()
    }
}
