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

//! FIFO of task groups awaiting placement. Operations here are
//! non-blocking; blocking is the [`crate::runner::SchedulerRunner`]'s job via
//! the [`crate::signal::SignalQueuingCondition`].

use std::collections::VecDeque;

use parking_lot::Mutex;
use strata_core::model::TaskGroup;

#[derive(Default)]
pub struct PendingQueue {
    inner: Mutex<VecDeque<TaskGroup>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task_group: TaskGroup) {
        self.inner.lock().push_back(task_group);
    }

    pub fn dequeue(&self) -> Option<TaskGroup> {
        self.inner.lock().pop_front()
    }

    /// Non-blocking peek at whether the queue currently holds anything.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strata_core::model::ContainerType;

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
    fn fifo_order_is_preserved() {
        let queue = PendingQueue::new();
        queue.enqueue(tg("a"));
        queue.enqueue(tg("b"));
        queue.enqueue(tg("c"));

        assert_eq!(queue.dequeue().unwrap().id, "a");
        assert_eq!(queue.dequeue().unwrap().id, "b");
        assert_eq!(queue.dequeue().unwrap().id, "c");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn dequeue_on_empty_queue_returns_none() {
        let queue = PendingQueue::new();
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }
}
