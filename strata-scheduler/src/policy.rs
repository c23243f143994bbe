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

//! Round-robin placement per container type, biased away from executors
//! already running a hot task group.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use parking_lot::Mutex;
use strata_core::model::{ContainerType, TaskGroup};

use crate::executor_registry::ExecutorRegistry;

struct ContainerTypeCandidates {
    candidates: Vec<String>,
    cursor: usize,
}

impl ContainerTypeCandidates {
    fn new() -> Self {
        Self {
            candidates: Vec::new(),
            cursor: 0,
        }
    }

    fn insert_at_cursor(&mut self, executor_id: &str) {
        let at = self.cursor.min(self.candidates.len());
        self.candidates.insert(at, executor_id.to_string());
    }

    /// Remove `executor_id`, adjusting the cursor per the policy's removal
    /// rule: decrement if the removed entry was before the cursor, reset to
    /// zero if it was exactly at the cursor, leave unchanged otherwise.
    fn remove(&mut self, executor_id: &str) {
        if let Some(pos) = self.candidates.iter().position(|id| id == executor_id) {
            self.candidates.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            } else if pos == self.cursor {
                // Reset to 0 here rather than advancing to the next valid
                // index, matching the observed behavior this is modeled on.
                self.cursor = 0;
            }
        }
        if !self.candidates.is_empty() {
            self.cursor %= self.candidates.len();
        } else {
            self.cursor = 0;
        }
    }
}

struct PolicyState {
    by_container_type: HashMap<ContainerType, ContainerTypeCandidates>,
    /// Union of every registered executor regardless of container type,
    /// maintained in lockstep with `by_container_type` so a task group
    /// tagged `ContainerType::none()` ("any") can be placed on any
    /// executor, not just ones literally tagged `NONE`.
    all: ContainerTypeCandidates,
    /// executorId -> task-group index of the hot task group it is running.
    hot_map: HashMap<String, u32>,
    terminated: bool,
}

pub struct SchedulingPolicy {
    registry: std::sync::Arc<ExecutorRegistry>,
    state: Mutex<PolicyState>,
}

impl SchedulingPolicy {
    pub fn new(registry: std::sync::Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(PolicyState {
                by_container_type: HashMap::new(),
                all: ContainerTypeCandidates::new(),
                hot_map: HashMap::new(),
                terminated: false,
            }),
        }
    }

    /// Insert a newly available executor into its container type's
    /// round-robin list (and the cross-type union list) at the current
    /// cursor position, so it is tried next.
    pub fn on_executor_added(&self, executor_id: &str, container_type: ContainerType) {
        let mut state = self.state.lock();
        state
            .by_container_type
            .entry(container_type)
            .or_insert_with(ContainerTypeCandidates::new)
            .insert_at_cursor(executor_id);
        state.all.insert_at_cursor(executor_id);
    }

    /// Remove an executor from its container type's list and the union
    /// list. Returns the set of task groups that were running on it and
    /// must be resubmitted.
    pub fn on_executor_removed(
        &self,
        executor_id: &str,
        container_type: &ContainerType,
    ) -> HashSet<String> {
        let resubmit = match self.registry.mark_failed(executor_id) {
            Ok(resubmit) => resubmit,
            Err(e) => {
                warn!("on_executor_removed: {}", e);
                HashSet::new()
            }
        };

        let mut state = self.state.lock();
        state.hot_map.remove(executor_id);
        if let Some(entry) = state.by_container_type.get_mut(container_type) {
            entry.remove(executor_id);
        }
        state.all.remove(executor_id);
        resubmit
    }

    pub fn on_task_group_complete(&self, executor_id: &str, task_group: &TaskGroup) {
        if let Err(e) = self.registry.mark_complete(executor_id, &task_group.id) {
            warn!("on_task_group_complete: {}", e);
        }
        if task_group.is_hot {
            self.clear_hot(executor_id, task_group);
        }
    }

    pub fn on_task_group_failed(&self, executor_id: &str, task_group: &TaskGroup) {
        if task_group.is_hot {
            self.clear_hot(executor_id, task_group);
        }
    }

    fn clear_hot(&self, executor_id: &str, task_group: &TaskGroup) {
        let mut state = self.state.lock();
        if state.hot_map.get(executor_id) == Some(&task_group.index) {
            state.hot_map.remove(executor_id);
        }
    }

    pub fn terminate(&self) {
        self.state.lock().terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    /// `ct == NONE ? allExecutors : byType[ct]`, per spec.
    fn candidates_snapshot(&self, container_type: &ContainerType) -> Vec<String> {
        let state = self.state.lock();
        if container_type.is_none() {
            state.all.candidates.clone()
        } else {
            state
                .by_container_type
                .get(container_type)
                .map(|e| e.candidates.clone())
                .unwrap_or_default()
        }
    }

    /// Attempt to place `task_group`. Returns the chosen executor id on
    /// success.
    pub fn schedule_task_group(&self, task_group: &TaskGroup) -> Option<String> {
        let candidates = self.candidates_snapshot(&task_group.container_type);
        if candidates.is_empty() {
            return None;
        }

        if task_group.is_hot {
            if let Some(chosen) = self.schedule_hot(task_group, &candidates) {
                return Some(chosen);
            }
        }
        self.schedule_round_robin(task_group, &candidates)
    }

    fn schedule_hot(&self, task_group: &TaskGroup, candidates: &[String]) -> Option<String> {
        let light: Vec<&String> = {
            let state = self.state.lock();
            candidates
                .iter()
                .filter(|id| !state.hot_map.contains_key(id.as_str()))
                .collect()
        };
        for executor_id in light {
            if self.registry.has_free_slot(executor_id) {
                if let Err(e) = self.registry.mark_running(executor_id, &task_group.id) {
                    warn!("schedule_hot: {}", e);
                    continue;
                }
                let mut state = self.state.lock();
                state
                    .hot_map
                    .insert(executor_id.clone(), task_group.index);
                debug!(
                    "placed hot task group {} on light executor {}",
                    task_group.id, executor_id
                );
                return Some(executor_id.clone());
            }
        }
        None
    }

    /// Advance the cursor tracking `container_type` (or the cross-type union
    /// list when `container_type` is `NONE`) one past `idx`.
    fn advance_cursor(&self, container_type: &ContainerType, len: usize, idx: usize) {
        let mut state = self.state.lock();
        if container_type.is_none() {
            state.all.cursor = (idx + 1) % len;
        } else if let Some(entry) = state.by_container_type.get_mut(container_type) {
            entry.cursor = (idx + 1) % len;
        }
    }

    fn schedule_round_robin(&self, task_group: &TaskGroup, candidates: &[String]) -> Option<String> {
        let len = candidates.len();
        let start = {
            let state = self.state.lock();
            if task_group.container_type.is_none() {
                state.all.cursor % len
            } else {
                state
                    .by_container_type
                    .get(&task_group.container_type)
                    .map(|e| e.cursor % len)
                    .unwrap_or(0)
            }
        };

        for offset in 0..len {
            let idx = (start + offset) % len;
            let executor_id = &candidates[idx];
            if self.registry.has_free_slot(executor_id) {
                if let Err(e) = self.registry.mark_running(executor_id, &task_group.id) {
                    warn!("schedule_round_robin: {}", e);
                    continue;
                }
                self.advance_cursor(&task_group.container_type, len, idx);
                debug!(
                    "placed task group {} on executor {} via round-robin",
                    task_group.id, executor_id
                );
                return Some(executor_id.clone());
            }
        }
        None
    }
}
