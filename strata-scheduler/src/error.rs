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

//! Registry/policy misuse: operating on an executor id the registry does
//! not know about, or double-registering one it already does. These are
//! programmer errors, fail-fast like the block store's contract violations.

use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum SchedulerError {
    UnknownExecutor { executor_id: String },
    AlreadyRegistered { executor_id: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::UnknownExecutor { executor_id } => {
                write!(f, "no executor registered with id {}", executor_id)
            }
            SchedulerError::AlreadyRegistered { executor_id } => {
                write!(f, "executor {} is already registered", executor_id)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}
