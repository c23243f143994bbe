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

//! Couples the [`PendingQueue`] and [`SchedulingPolicy`] on a dedicated
//! worker thread via a [`SignalQueuingCondition`], so the thread sleeps
//! whenever neither an executor nor a task group is available.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info};
use strata_core::model::TaskGroup;

use crate::pending_queue::PendingQueue;
use crate::policy::SchedulingPolicy;
use crate::signal::SignalQueuingCondition;

pub struct SchedulerRunner {
    queue: Arc<PendingQueue>,
    policy: Arc<SchedulingPolicy>,
    condition: Arc<SignalQueuingCondition>,
    terminated: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SchedulerRunner {
    pub fn start(queue: Arc<PendingQueue>, policy: Arc<SchedulingPolicy>) -> Self {
        let condition = Arc::new(SignalQueuingCondition::new());
        let terminated = Arc::new(AtomicBool::new(false));

        let loop_queue = queue.clone();
        let loop_policy = policy.clone();
        let loop_condition = condition.clone();
        let loop_terminated = terminated.clone();

        let handle = thread::Builder::new()
            .name("strata-scheduler-runner".to_string())
            .spawn(move || run_loop(loop_queue, loop_policy, loop_condition, loop_terminated))
            .expect("failed to spawn scheduler runner thread");

        Self {
            queue,
            policy,
            condition,
            terminated,
            handle: Some(handle),
        }
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    pub fn on_a_task_group_available(&self) {
        self.condition.signal();
    }

    pub fn on_an_executor_available(&self) {
        self.condition.signal();
    }

    /// Marks the policy terminated (which shuts down all running
    /// executors from the scheduler's point of view) and wakes the loop so
    /// it exits at its next checkpoint. Jobs enqueued after this call are
    /// never scheduled.
    pub fn terminate(&mut self) {
        self.policy.terminate();
        self.terminated.store(true, Ordering::SeqCst);
        self.condition.signal();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    queue: Arc<PendingQueue>,
    policy: Arc<SchedulingPolicy>,
    condition: Arc<SignalQueuingCondition>,
    terminated: Arc<AtomicBool>,
) {
    info!("scheduler runner starting");
    loop {
        if terminated.load(Ordering::SeqCst) {
            break;
        }

        let task_group = match dequeue_blocking(&queue, &condition, &terminated) {
            Some(tg) => tg,
            None => break,
        };

        attempt_schedule(&queue, &policy, &condition, task_group);
    }
    info!("scheduler runner stopped");
}

fn dequeue_blocking(
    queue: &PendingQueue,
    condition: &SignalQueuingCondition,
    terminated: &AtomicBool,
) -> Option<TaskGroup> {
    loop {
        if let Some(tg) = queue.dequeue() {
            return Some(tg);
        }
        if terminated.load(Ordering::SeqCst) {
            return None;
        }
        condition.await_signal();
    }
}

fn attempt_schedule(
    queue: &PendingQueue,
    policy: &SchedulingPolicy,
    condition: &SignalQueuingCondition,
    task_group: TaskGroup,
) {
    match policy.schedule_task_group(&task_group) {
        Some(executor_id) => {
            debug!(
                "scheduled task group {} onto executor {}",
                task_group.id, executor_id
            );
            condition.signal();
        }
        None => {
            queue.enqueue(task_group);
            condition.await_signal();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::executor_registry::ExecutorRegistry;
    use std::time::Duration;
    use strata_core::model::{ContainerType, Executor};

    fn tg(id: &str) -> TaskGroup {
        TaskGroup {
            id: id.to_string(),
            stage_id: 0,
            index: 0,
            container_type: ContainerType::none(),
            is_hot: false,
        }
    }

    #[test]
    fn liveness_every_enqueued_task_group_is_eventually_scheduled() {
        let registry = Arc::new(ExecutorRegistry::new());
        registry
            .register(Executor::new("e1", ContainerType::none(), 4))
            .unwrap();
        let policy = Arc::new(SchedulingPolicy::new(registry.clone()));
        policy.on_executor_added("e1", ContainerType::none());

        let queue = Arc::new(PendingQueue::new());
        let mut runner = SchedulerRunner::start(queue.clone(), policy.clone());

        for i in 0..4 {
            queue.enqueue(tg(&format!("tg-{i}")));
            runner.on_a_task_group_available();
        }

        // Give the worker thread a chance to drain the queue.
        let mut waited = Duration::ZERO;
        while !queue.is_empty() && waited < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(10));
            waited += Duration::from_millis(10);
        }

        assert!(queue.is_empty());
        runner.terminate();
    }

    #[test]
    fn terminate_stops_the_worker_thread() {
        let registry = Arc::new(ExecutorRegistry::new());
        let policy = Arc::new(SchedulingPolicy::new(registry));
        let queue = Arc::new(PendingQueue::new());
        let mut runner = SchedulerRunner::start(queue, policy.clone());

        runner.terminate();
        assert!(policy.is_terminated());
    }
}
