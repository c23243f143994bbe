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

//! The single owner of executor state. All mutation of an [`Executor`] goes
//! through this registry so the Scheduling Policy and Scheduler Runner only
//! ever see a consistent view.

use std::collections::HashSet;

use dashmap::DashMap;
use log::{debug, warn};
use strata_core::model::{ContainerType, Executor, ExecutorState};

use crate::error::SchedulerError;

#[derive(Default)]
pub struct ExecutorRegistry {
    executors: DashMap<String, Executor>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new executor. Fails if `executor.id` is already present.
    pub fn register(&self, executor: Executor) -> Result<(), SchedulerError> {
        if self.executors.contains_key(&executor.id) {
            return Err(SchedulerError::AlreadyRegistered {
                executor_id: executor.id,
            });
        }
        debug!(
            "registering executor {} (container_type={}, capacity={})",
            executor.id, executor.container_type, executor.capacity
        );
        self.executors.insert(executor.id.clone(), executor);
        Ok(())
    }

    pub fn deregister(&self, executor_id: &str) -> Option<Executor> {
        self.executors.remove(executor_id).map(|(_, e)| e)
    }

    /// `any(id)`: is there a record for this executor id at all, regardless
    /// of its state.
    pub fn any(&self, executor_id: &str) -> bool {
        self.executors.contains_key(executor_id)
    }

    pub fn contains(&self, executor_id: &str) -> bool {
        self.any(executor_id)
    }

    /// `running(id)`: is this executor currently in the `Running` state.
    pub fn running(&self, executor_id: &str) -> bool {
        self.state_of(executor_id) == Some(ExecutorState::Running)
    }

    /// `failed(id)`: is this executor currently in the `Failed` state.
    pub fn failed(&self, executor_id: &str) -> bool {
        self.state_of(executor_id) == Some(ExecutorState::Failed)
    }

    /// Executor ids with the given container type (or `ContainerType::none()`
    /// for "any") that are still `Running`, in the registry's own iteration
    /// order — the Scheduling Policy imposes its own fairness ordering on
    /// top of this list.
    pub fn candidates_for(&self, container_type: &ContainerType) -> Vec<String> {
        self.executors
            .iter()
            .filter(|entry| {
                entry.state == ExecutorState::Running
                    && (container_type.is_none() || &entry.container_type == container_type)
            })
            .map(|entry| entry.id.clone())
            .collect()
    }

    pub fn has_free_slot(&self, executor_id: &str) -> bool {
        self.executors
            .get(executor_id)
            .map(|e| e.has_free_slot())
            .unwrap_or(false)
    }

    pub fn mark_small(&self, executor_id: &str, task_group_id: &str) {
        if let Some(mut executor) = self.executors.get_mut(executor_id) {
            executor.small_task_groups.insert(task_group_id.to_string());
        }
    }

    fn unknown(executor_id: &str) -> SchedulerError {
        SchedulerError::UnknownExecutor {
            executor_id: executor_id.to_string(),
        }
    }

    pub fn mark_running(&self, executor_id: &str, task_group_id: &str) -> Result<(), SchedulerError> {
        let mut executor = self
            .executors
            .get_mut(executor_id)
            .ok_or_else(|| Self::unknown(executor_id))?;
        executor.running.insert(task_group_id.to_string());
        Ok(())
    }

    /// Move a task group from `running` to `complete`.
    pub fn mark_complete(&self, executor_id: &str, task_group_id: &str) -> Result<(), SchedulerError> {
        let mut executor = self
            .executors
            .get_mut(executor_id)
            .ok_or_else(|| Self::unknown(executor_id))?;
        executor.running.remove(task_group_id);
        executor.complete.insert(task_group_id.to_string());
        Ok(())
    }

    /// Transition the executor itself to `Failed`, snapshot its running task
    /// groups into its failed set, and return that snapshot so the caller
    /// can resubmit them.
    pub fn mark_failed(&self, executor_id: &str) -> Result<HashSet<String>, SchedulerError> {
        let mut executor = self
            .executors
            .get_mut(executor_id)
            .ok_or_else(|| Self::unknown(executor_id))?;
        warn!("executor {} marked failed", executor_id);
        executor.state = ExecutorState::Failed;
        let running = std::mem::take(&mut executor.running);
        executor.failed.extend(running.iter().cloned());
        Ok(running)
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.executors
            .iter()
            .filter(|e| e.state == ExecutorState::Running)
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn state_of(&self, executor_id: &str) -> Option<ExecutorState> {
        self.executors.get(executor_id).map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn executor(id: &str, capacity: u32) -> Executor {
        Executor::new(id, ContainerType::none(), capacity)
    }

    #[test]
    fn candidates_for_excludes_non_running_executors() {
        let registry = ExecutorRegistry::new();
        registry.register(executor("e1", 1)).unwrap();
        registry.register(executor("e2", 1)).unwrap();
        registry.mark_failed("e2").unwrap();

        let candidates = registry.candidates_for(&ContainerType::none());
        assert_eq!(candidates, vec!["e1".to_string()]);
    }

    #[test]
    fn mark_failed_returns_its_running_task_groups_and_records_them_as_failed() {
        let registry = ExecutorRegistry::new();
        registry.register(executor("e1", 2)).unwrap();
        registry.mark_running("e1", "tg-1").unwrap();
        registry.mark_running("e1", "tg-2").unwrap();

        let mut resubmit: Vec<_> = registry.mark_failed("e1").unwrap().into_iter().collect();
        resubmit.sort();
        assert_eq!(resubmit, vec!["tg-1".to_string(), "tg-2".to_string()]);
        assert_eq!(registry.state_of("e1"), Some(ExecutorState::Failed));
        assert!(registry.failed("e1"));
        assert!(!registry.running("e1"));

        let failed = registry.deregister("e1").unwrap().failed;
        let mut failed: Vec<_> = failed.into_iter().collect();
        failed.sort();
        assert_eq!(failed, vec!["tg-1".to_string(), "tg-2".to_string()]);
    }

    #[test]
    fn mark_complete_moves_task_group_out_of_running() {
        let registry = ExecutorRegistry::new();
        registry.register(executor("e1", 1)).unwrap();
        registry.mark_running("e1", "tg-1").unwrap();
        registry.mark_complete("e1", "tg-1").unwrap();

        assert!(registry.has_free_slot("e1"));
    }

    #[test]
    fn container_type_filter_excludes_mismatched_executors() {
        let registry = ExecutorRegistry::new();
        registry
            .register(Executor::new("e1", ContainerType::new("gpu"), 1))
            .unwrap();
        registry
            .register(Executor::new("e2", ContainerType::new("cpu"), 1))
            .unwrap();

        let candidates = registry.candidates_for(&ContainerType::new("gpu"));
        assert_eq!(candidates, vec!["e1".to_string()]);
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = ExecutorRegistry::new();
        registry.register(executor("e1", 1)).unwrap();
        let err = registry.register(executor("e1", 2)).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::AlreadyRegistered {
                executor_id: "e1".to_string()
            }
        );
    }

    #[test]
    fn mutating_an_unknown_executor_is_rejected() {
        let registry = ExecutorRegistry::new();
        assert_eq!(
            registry.mark_running("ghost", "tg-1").unwrap_err(),
            SchedulerError::UnknownExecutor {
                executor_id: "ghost".to_string()
            }
        );
        assert_eq!(
            registry.mark_complete("ghost", "tg-1").unwrap_err(),
            SchedulerError::UnknownExecutor {
                executor_id: "ghost".to_string()
            }
        );
        assert!(registry.mark_failed("ghost").is_err());
        assert!(!registry.any("ghost"));
    }
}
