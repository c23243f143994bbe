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

//! The physical-plan data model: stages, stage edges, task groups and key
//! ranges. The compiler/optimizer that produces a [`PhysicalPlan`] is an
//! external collaborator; this module only describes the shape it hands us.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Sentinel container-type value meaning "any container type is acceptable".
pub const CONTAINER_TYPE_NONE: &str = "NONE";

/// A coarse executor class used as a scheduling constraint. The concrete set
/// of values (beyond the `NONE` sentinel) is a deployment concern; this type
/// only guarantees stable equality/hashing within a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerType(String);

impl ContainerType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn none() -> Self {
        Self(CONTAINER_TYPE_NONE.to_string())
    }

    pub fn is_none(&self) -> bool {
        self.0 == CONTAINER_TYPE_NONE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ContainerType {
    fn default() -> Self {
        Self::none()
    }
}

/// How data moves across a [`StageEdge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCommunicationPattern {
    OneToOne,
    Broadcast,
    Shuffle,
}

/// How a shuffle edge's keys are distributed into buckets. The concrete hash
/// function used to assign a user key to one of `[0, hash_range)` buckets is
/// an implementation detail of [`crate::planner`]; the physical plan only
/// records which partitioner kind produced the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioner {
    Hash,
    RoundRobin,
}

/// `[begin, end)` over hash values in `[0, hash_range)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub begin: u32,
    pub end: u32,
    pub is_hot: bool,
}

impl KeyRange {
    pub fn new(begin: u32, end: u32, is_hot: bool) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end, is_hot }
    }

    pub fn width(&self) -> u32 {
        self.end - self.begin
    }

    pub fn contains(&self, bucket: u32) -> bool {
        bucket >= self.begin && bucket < self.end
    }
}

/// `(hashRange, taskIdx -> KeyRange)`, length-equal to downstream
/// parallelism. This is what the Dynamic Optimization Coordinator rewrites
/// on a shuffle edge after a metric-collection barrier completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleDistribution {
    pub hash_range: u32,
    pub ranges: Vec<KeyRange>,
}

impl ShuffleDistribution {
    pub fn new(hash_range: u32, ranges: Vec<KeyRange>) -> Self {
        Self { hash_range, ranges }
    }

    pub fn range_for(&self, task_idx: usize) -> Option<&KeyRange> {
        self.ranges.get(task_idx)
    }
}

/// Execution properties relevant to the scheduling/shuffle core. A real
/// `StageEdge` carries more (schema, ordering hints, ...) but those are owned
/// by the compiler and irrelevant here.
#[derive(Debug, Clone)]
pub struct StageEdge {
    pub id: String,
    pub src_stage: u32,
    pub dst_stage: u32,
    pub pattern: DataCommunicationPattern,
    pub partitioner: Partitioner,
    /// Only populated for `Shuffle` edges, and only after the Dynamic
    /// Optimization Coordinator (or the initial compile-time estimate) has
    /// assigned a distribution.
    pub distribution: Option<ShuffleDistribution>,
}

impl StageEdge {
    /// The `KeyRange` a given downstream task index must read from this
    /// edge, if it carries a shuffle distribution.
    pub fn key_range_for(&self, dst_task_idx: usize) -> Option<&KeyRange> {
        self.distribution
            .as_ref()
            .and_then(|d| d.range_for(dst_task_idx))
    }
}

/// A maximal group of vertices connected by intra-stage (non-shuffle) edges,
/// decomposed into `parallelism` task groups indexed `0..parallelism`.
#[derive(Debug, Clone)]
pub struct Stage {
    pub id: u32,
    pub parallelism: u32,
    pub incoming_edges: Vec<StageEdge>,
    pub outgoing_edges: Vec<StageEdge>,
}

impl Stage {
    /// Materialize this stage's task groups, deriving `is_hot` for each from
    /// the incoming edges' key ranges.
    pub fn task_groups(&self, container_type: ContainerType) -> Vec<TaskGroup> {
        (0..self.parallelism)
            .map(|idx| {
                let is_hot = self
                    .incoming_edges
                    .iter()
                    .any(|e| e.key_range_for(idx as usize).map(|r| r.is_hot).unwrap_or(false));
                TaskGroup {
                    id: format!("stage-{}-task-{}", self.id, idx),
                    stage_id: self.id,
                    index: idx,
                    container_type: container_type.clone(),
                    is_hot,
                }
            })
            .collect()
    }
}

/// A directed acyclic graph of [`Stage`]s connected by [`StageEdge`]s.
#[derive(Debug, Clone, Default)]
pub struct PhysicalPlan {
    pub stages: HashMap<u32, Stage>,
}

impl PhysicalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(&mut self, stage: Stage) {
        self.stages.insert(stage.id, stage);
    }

    pub fn stage(&self, id: u32) -> Option<&Stage> {
        self.stages.get(&id)
    }

    pub fn stage_mut(&mut self, id: u32) -> Option<&mut Stage> {
        self.stages.get_mut(&id)
    }

    /// Overwrite the `ShuffleDistributionProperty` of a single edge
    /// identified by its `(stage_id, edge_id)`, on both that edge's owning
    /// stage outgoing list and the matching incoming list on the
    /// destination stage. The replacement is permanent: it only affects
    /// task groups materialized after this call, never ones already
    /// scheduled.
    pub fn set_shuffle_distribution(
        &mut self,
        src_stage: u32,
        dst_stage: u32,
        edge_id: &str,
        distribution: ShuffleDistribution,
    ) {
        if let Some(stage) = self.stages.get_mut(&src_stage) {
            for edge in stage.outgoing_edges.iter_mut() {
                if edge.id == edge_id {
                    edge.distribution = Some(distribution.clone());
                }
            }
        }
        if let Some(stage) = self.stages.get_mut(&dst_stage) {
            for edge in stage.incoming_edges.iter_mut() {
                if edge.id == edge_id {
                    edge.distribution = Some(distribution.clone());
                }
            }
        }
    }
}

/// A scheduling unit: one per stage index. Identified by a stable id,
/// carries a container-type constraint and a derived `is_hot` flag (true iff
/// any incoming edge's key range for this index is flagged hot).
#[derive(Debug, Clone)]
pub struct TaskGroup {
    pub id: String,
    pub stage_id: u32,
    pub index: u32,
    pub container_type: ContainerType,
    pub is_hot: bool,
}

/// `{running, failed, complete}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Running,
    Failed,
    Complete,
}

/// A process in the fleet available to run task groups. Owned exclusively
/// by the Executor Registry; the Scheduler Runner and Scheduling Policy
/// only ever hold read references or go through registry methods to mutate
/// it.
#[derive(Debug, Clone)]
pub struct Executor {
    pub id: String,
    pub container_type: ContainerType,
    pub capacity: u32,
    pub running: HashSet<String>,
    pub complete: HashSet<String>,
    pub failed: HashSet<String>,
    pub state: ExecutorState,
    /// Task-group ids hinted as "small" by the scheduler; these do not
    /// count against `capacity` when computing free slots.
    pub small_task_groups: HashSet<String>,
}

impl Executor {
    pub fn new(id: impl Into<String>, container_type: ContainerType, capacity: u32) -> Self {
        Self {
            id: id.into(),
            container_type,
            capacity,
            running: HashSet::new(),
            complete: HashSet::new(),
            failed: HashSet::new(),
            state: ExecutorState::Running,
            small_task_groups: HashSet::new(),
        }
    }

    /// `runningCount - smallTaskGroupCount < capacity`.
    pub fn has_free_slot(&self) -> bool {
        let small_running = self.running.intersection(&self.small_task_groups).count();
        (self.running.len() - small_running) < self.capacity as usize
    }
}
