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

//! Executor registry, pending queue, scheduling policy, scheduler runner and
//! dynamic optimization coordinator for the Strata dataflow runtime. Builds
//! on the data model and Key-Range Planner in `strata-core`.

pub mod coordinator;
pub mod error;
pub mod executor_registry;
pub mod pending_queue;
pub mod policy;
pub mod runner;
pub mod signal;

pub use coordinator::DynamicOptimizationCoordinator;
pub use error::SchedulerError;
pub use executor_registry::ExecutorRegistry;
pub use pending_queue::PendingQueue;
pub use policy::SchedulingPolicy;
pub use runner::SchedulerRunner;
pub use signal::SignalQueuingCondition;
