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

//! Reacts to a metric-collection-barrier completion: rebalances a shuffle
//! edge's key ranges from observed sizes and pushes the edge's downstream
//! task groups into the Pending Queue under the revised distribution.

use std::hash::Hash;
use std::sync::Arc;

use log::info;
use strata_core::config::RuntimeConfig;
use strata_core::error::PlannerError;
use strata_core::model::{ContainerType, PhysicalPlan, ShuffleDistribution};
use strata_core::planner;

use crate::pending_queue::PendingQueue;

pub struct DynamicOptimizationCoordinator {
    queue: Arc<PendingQueue>,
    config: RuntimeConfig,
}

impl DynamicOptimizationCoordinator {
    pub fn new(queue: Arc<PendingQueue>, config: RuntimeConfig) -> Self {
        Self { queue, config }
    }

    /// Rebalance the shuffle edge `edge_id` from `src_stage` to `dst_stage`
    /// using the observed `key -> bytes` sizes, overwrite the plan's
    /// distribution for that edge, and enqueue the destination stage's
    /// task groups under the new ranges.
    pub fn on_metric_barrier_complete<K: Hash + Clone>(
        &self,
        plan: &mut PhysicalPlan,
        src_stage: u32,
        dst_stage: u32,
        edge_id: &str,
        sizes: impl IntoIterator<Item = (K, u64)>,
        container_type: ContainerType,
    ) -> Result<(), PlannerError> {
        let dst_parallelism = plan
            .stage(dst_stage)
            .map(|s| s.parallelism)
            .ok_or(PlannerError::ZeroParallelism)?;

        let hash_range = planner::hash_range_for(dst_parallelism);
        let ranges = planner::plan(
            sizes,
            dst_parallelism,
            hash_range,
            self.config.skewed_key_count,
        )?;

        info!(
            "rebalancing shuffle edge {} (stage {} -> {}): hash_range={}, dst_parallelism={}",
            edge_id, src_stage, dst_stage, hash_range, dst_parallelism
        );

        let distribution = ShuffleDistribution::new(hash_range, ranges);
        plan.set_shuffle_distribution(src_stage, dst_stage, edge_id, distribution);

        if let Some(stage) = plan.stage(dst_stage) {
            for task_group in stage.task_groups(container_type) {
                self.queue.enqueue(task_group);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strata_core::model::{DataCommunicationPattern, Partitioner, Stage, StageEdge};

    fn plan_with_shuffle_edge(dst_parallelism: u32) -> PhysicalPlan {
        let mut plan = PhysicalPlan::new();
        plan.add_stage(Stage {
            id: 0,
            parallelism: 1,
            incoming_edges: vec![],
            outgoing_edges: vec![StageEdge {
                id: "e0".to_string(),
                src_stage: 0,
                dst_stage: 1,
                pattern: DataCommunicationPattern::Shuffle,
                partitioner: Partitioner::Hash,
                distribution: None,
            }],
        });
        plan.add_stage(Stage {
            id: 1,
            parallelism: dst_parallelism,
            incoming_edges: vec![StageEdge {
                id: "e0".to_string(),
                src_stage: 0,
                dst_stage: 1,
                pattern: DataCommunicationPattern::Shuffle,
                partitioner: Partitioner::Hash,
                distribution: None,
            }],
            outgoing_edges: vec![],
        });
        plan
    }

    #[test]
    fn end_to_end_rebalance_produces_one_hot_range_and_enqueues_downstream_task_groups() {
        let mut plan = plan_with_shuffle_edge(2);
        let queue = Arc::new(PendingQueue::new());
        let coordinator = DynamicOptimizationCoordinator::new(queue.clone(), RuntimeConfig::default());

        let sizes = vec![
            ("A".to_string(), 1000u64),
            ("B".to_string(), 10),
            ("C".to_string(), 10),
            ("D".to_string(), 10),
            ("E".to_string(), 10),
        ];

        coordinator
            .on_metric_barrier_complete(&mut plan, 0, 1, "e0", sizes, ContainerType::none())
            .unwrap();

        let edge = &plan.stage(1).unwrap().incoming_edges[0];
        let distribution = edge.distribution.as_ref().unwrap();
        assert_eq!(distribution.hash_range, 11);
        assert_eq!(distribution.ranges.len(), 2);
        assert_eq!(distribution.ranges[0].begin, 0);
        assert_eq!(distribution.ranges.last().unwrap().end, 11);
        assert_eq!(distribution.ranges.iter().filter(|r| r.is_hot).count(), 1);

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn zero_parallelism_destination_is_rejected() {
        let mut plan = plan_with_shuffle_edge(0);
        let queue = Arc::new(PendingQueue::new());
        let coordinator = DynamicOptimizationCoordinator::new(queue, RuntimeConfig::default());

        let result = coordinator.on_metric_barrier_complete(
            &mut plan,
            0,
            1,
            "e0",
            vec![("A".to_string(), 1u64)],
            ContainerType::none(),
        );
        assert!(result.is_err());
    }
}
