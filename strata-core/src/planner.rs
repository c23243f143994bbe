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

//! Key-Range Planner: given observed per-key sizes for a shuffle edge,
//! produces one contiguous, possibly-hot [`KeyRange`] per downstream task.
//!
//! Bucket assignment uses `ahash`, the same hashing crate
//! `ShuffleWriterExec::execute_shuffle_write` uses to bucket rows by hash
//! partition, with the same fixed-seed `ahash::RandomState`.

use std::collections::HashSet;
use std::hash::{BuildHasher, Hash};

use crate::config::HASH_RANGE_MULTIPLIER;
use crate::error::PlannerError;
use crate::model::KeyRange;

/// Smallest prime `>= n`. Used to derive a shuffle edge's `hashRange` from
/// its destination parallelism.
pub fn next_prime(n: u32) -> u32 {
    let mut candidate = n.max(2);
    loop {
        if is_prime(candidate) {
            return candidate;
        }
        candidate += 1;
    }
}

fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut i = 3u32;
    while i.saturating_mul(i) <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

/// `hashRange = nextPrime(HASH_RANGE_MULTIPLIER * dstParallelism)`, per
/// the destination stage's shuffle edge.
pub fn hash_range_for(dst_parallelism: u32) -> u32 {
    next_prime(HASH_RANGE_MULTIPLIER * dst_parallelism)
}

/// Bucketize `sizes` into `hash_range` buckets via `hash(k) mod hash_range`.
pub fn bucketize<K: Hash, I: IntoIterator<Item = (K, u64)>>(
    sizes: I,
    hash_range: u32,
) -> Vec<u64> {
    let mut buckets = vec![0u64; hash_range as usize];
    let build_hasher = ahash::RandomState::with_seeds(0, 0, 0, 0);
    for (key, size) in sizes {
        let h = build_hasher.hash_one(&key);
        let bucket = (h % hash_range as u64) as usize;
        buckets[bucket] += size;
    }
    buckets
}

/// Indices of the `k` largest bucket sizes. Ties are broken by lower index
/// first so the result is deterministic.
fn skewed_bucket_indices(bucket_sizes: &[u64], k: usize) -> HashSet<usize> {
    let mut by_size: Vec<usize> = (0..bucket_sizes.len()).collect();
    by_size.sort_by(|&a, &b| bucket_sizes[b].cmp(&bucket_sizes[a]).then(a.cmp(&b)));
    by_size.into_iter().take(k).collect()
}

fn equal_ranges(hash_range: u32, dst_parallelism: u32) -> Vec<KeyRange> {
    let width = hash_range / dst_parallelism;
    let mut ranges = Vec::with_capacity(dst_parallelism as usize);
    for i in 0..(dst_parallelism - 1) {
        ranges.push(KeyRange::new(i * width, (i + 1) * width, false));
    }
    ranges.push(KeyRange::new((dst_parallelism - 1) * width, hash_range, false));
    ranges
}

/// Produce one contiguous [`KeyRange`] per downstream task, balancing total
/// weight per task and flagging ranges containing a skewed bucket as hot.
///
/// `bucket_sizes` must have exactly `hash_range` entries (see [`bucketize`]).
pub fn plan_from_buckets(
    bucket_sizes: &[u64],
    dst_parallelism: u32,
    skewed_key_count: usize,
) -> Result<Vec<KeyRange>, PlannerError> {
    let hash_range = bucket_sizes.len() as u32;
    if dst_parallelism == 0 {
        return Err(PlannerError::ZeroParallelism);
    }
    if hash_range < dst_parallelism {
        return Err(PlannerError::HashRangeTooSmall {
            hash_range,
            dst_parallelism,
        });
    }

    let total: u64 = bucket_sizes.iter().sum();
    if total == 0 {
        return Ok(equal_ranges(hash_range, dst_parallelism));
    }

    let skewed = skewed_bucket_indices(bucket_sizes, skewed_key_count);
    let ideal = total as f64 / dst_parallelism as f64;

    let mut ranges = Vec::with_capacity(dst_parallelism as usize);
    let mut start: u32 = 0;
    let mut finish: u32 = 0;
    let mut cur: u64 = 0;

    for i in 0..(dst_parallelism - 1) {
        let target = (i as f64 + 1.0) * ideal;
        while (cur as f64) < target && (hash_range - finish) >= (dst_parallelism - i) {
            cur += bucket_sizes[finish as usize];
            finish += 1;
        }

        if finish > start {
            let cur_minus = cur - bucket_sizes[(finish - 1) as usize];
            let dist_cur = (cur as f64 - target).abs();
            let dist_minus = (cur_minus as f64 - target).abs();
            if dist_minus < dist_cur {
                finish -= 1;
                cur = cur_minus;
            }
        }

        let is_hot = (start..finish).any(|b| skewed.contains(&(b as usize)));
        ranges.push(KeyRange::new(start, finish, is_hot));
        start = finish;
    }

    let is_hot = (start..hash_range).any(|b| skewed.contains(&(b as usize)));
    ranges.push(KeyRange::new(start, hash_range, is_hot));

    Ok(ranges)
}

/// Convenience wrapper: bucketize `sizes` then plan.
pub fn plan<K: Hash, I: IntoIterator<Item = (K, u64)>>(
    sizes: I,
    dst_parallelism: u32,
    hash_range: u32,
    skewed_key_count: usize,
) -> Result<Vec<KeyRange>, PlannerError> {
    let buckets = bucketize(sizes, hash_range);
    plan_from_buckets(&buckets, dst_parallelism, skewed_key_count)
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_partitions_contiguously(ranges: &[KeyRange], hash_range: u32) {
        assert_eq!(ranges[0].begin, 0);
        assert_eq!(ranges.last().unwrap().end, hash_range);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].begin);
            assert!(pair[0].begin <= pair[1].begin);
        }
    }

    #[test]
    fn zero_total_emits_equal_ranges() {
        let buckets = vec![0u64; 23];
        let ranges = plan_from_buckets(&buckets, 4, 10).unwrap();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0], KeyRange::new(0, 5, false));
        assert_eq!(ranges[1], KeyRange::new(5, 10, false));
        assert_eq!(ranges[2], KeyRange::new(10, 15, false));
        assert_eq!(ranges[3], KeyRange::new(15, 23, false));
        assert!(ranges.iter().all(|r| !r.is_hot));
    }

    #[test]
    fn uniform_sizes_produce_no_hot_ranges_and_near_equal_widths() {
        let buckets = vec![4u64; 11];
        let ranges = plan_from_buckets(&buckets, 3, 10).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_partitions_contiguously(&ranges, 11);
        assert!(ranges.iter().all(|r| !r.is_hot));
        let widths: Vec<u32> = ranges.iter().map(|r| r.width()).collect();
        assert!(widths.iter().max().unwrap() - widths.iter().min().unwrap() <= 1);
    }

    #[test]
    fn skewed_bucket_is_isolated_into_its_own_hot_range() {
        // Force k0 into bucket 0 by construction: put an overwhelmingly
        // large size directly into bucket_sizes[0] rather than relying on
        // a particular hash outcome.
        let mut buckets = vec![1u64; 11];
        buckets[0] = 100;
        let ranges = plan_from_buckets(&buckets, 2, 1).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_partitions_contiguously(&ranges, 11);
        assert_eq!(ranges[0].begin, 0);
        assert_eq!(ranges[0].end, 1);
        assert!(ranges[0].is_hot);
        assert!(!ranges[1].is_hot);
    }

    #[test]
    fn returned_list_length_matches_parallelism_for_arbitrary_sizes() {
        for n in 1..=6u32 {
            let h = next_prime(5 * n).max(n);
            let buckets: Vec<u64> = (0..h).map(|i| (i as u64 * 7) % 13).collect();
            let ranges = plan_from_buckets(&buckets, n, 10).unwrap();
            assert_eq!(ranges.len(), n as usize);
            assert_partitions_contiguously(&ranges, h);
        }
    }

    #[test]
    fn hash_range_too_small_is_rejected() {
        let buckets = vec![1u64; 3];
        let err = plan_from_buckets(&buckets, 4, 10).unwrap_err();
        assert_eq!(
            err,
            PlannerError::HashRangeTooSmall {
                hash_range: 3,
                dst_parallelism: 4
            }
        );
    }

    #[test]
    fn next_prime_matches_known_values() {
        assert_eq!(next_prime(10), 11);
        assert_eq!(next_prime(1), 2);
        assert_eq!(next_prime(2), 2);
        assert_eq!(next_prime(20), 23);
    }

    #[test]
    fn hash_range_for_dst_parallelism_two_is_eleven() {
        assert_eq!(hash_range_for(2), 11);
    }
}
