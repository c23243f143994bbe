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

//! Error types for the block store and planner.
//!
//! Contract violations (commit-after-commit, read-before-commit, over-read)
//! are programmer errors and are reported through the same error types but
//! are expected to be fail-fast rather than retried by callers.

use std::fmt;
use std::io;

/// Surfaced by the runtime when a task group's failure is recoverable by
/// resubmission, and the reason is worth reporting to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    InputReadFailure,
    OutputWriteFailure,
    Unrecoverable,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCause::InputReadFailure => "INPUT_READ_FAILURE",
            FailureCause::OutputWriteFailure => "OUTPUT_WRITE_FAILURE",
            FailureCause::Unrecoverable => "UNRECOVERABLE",
        };
        write!(f, "{}", s)
    }
}

/// Error produced while writing to or committing a [`crate::block::Block`].
///
/// The block remains in whatever state it was in before the failing call;
/// callers must treat the block's backing storage as potentially
/// inconsistent and should not attempt further writes against it.
#[derive(Debug)]
pub enum BlockWriteError {
    /// `write`/`writePartitions`/`commit` called on an already-committed block.
    AlreadyCommitted { block_id: String },
    /// The underlying storage file could not be written to.
    Io { block_id: String, source: io::Error },
}

impl fmt::Display for BlockWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockWriteError::AlreadyCommitted { block_id } => {
                write!(f, "block {} is already committed", block_id)
            }
            BlockWriteError::Io { block_id, source } => {
                write!(f, "I/O error writing block {}: {}", block_id, source)
            }
        }
    }
}

impl std::error::Error for BlockWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlockWriteError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Error produced while reading a [`crate::block::Block`].
///
/// Read errors never mutate block state.
#[derive(Debug)]
pub enum BlockFetchError {
    /// `readPartitions`/`readSerializedPartitions`/`asFileAreas` called on a
    /// block that has not been committed yet.
    NotCommitted { block_id: String },
    /// A reader consumed more or fewer bytes than a partition's recorded
    /// length while skipping past an excluded partition.
    LengthMismatch {
        block_id: String,
        expected: u32,
        actual: u64,
    },
    /// The underlying storage file could not be read.
    Io { block_id: String, source: io::Error },
}

impl fmt::Display for BlockFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockFetchError::NotCommitted { block_id } => {
                write!(f, "block {} has not been committed", block_id)
            }
            BlockFetchError::LengthMismatch {
                block_id,
                expected,
                actual,
            } => write!(
                f,
                "block {} partition read skipped {} bytes, expected {}",
                block_id, actual, expected
            ),
            BlockFetchError::Io { block_id, source } => {
                write!(f, "I/O error reading block {}: {}", block_id, source)
            }
        }
    }
}

impl std::error::Error for BlockFetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlockFetchError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Contract violation raised by the [`crate::planner`] when called with
/// parameters that make a valid ranging impossible to produce, as opposed to
/// the degenerate-but-valid zero-total-size case which is handled gracefully.
#[derive(Debug, PartialEq, Eq)]
pub enum PlannerError {
    ZeroParallelism,
    HashRangeTooSmall { hash_range: u32, dst_parallelism: u32 },
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::ZeroParallelism => {
                write!(f, "destination parallelism must be at least 1")
            }
            PlannerError::HashRangeTooSmall {
                hash_range,
                dst_parallelism,
            } => write!(
                f,
                "hash range {} is smaller than destination parallelism {}",
                hash_range, dst_parallelism
            ),
        }
    }
}

impl std::error::Error for PlannerError {}
