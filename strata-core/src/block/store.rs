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

//! Per-executor storage of immutable, committed blocks composed of keyed
//! partitions. A block enforces a single logical writer by construction:
//! the write path takes `&mut Block`, so two writers can never hold it at
//! once without external `unsafe`; once committed, reads only need `&Block`
//! and each reader opens its own file handle, giving the "independent
//! stream handles" concurrent-read semantics for free from the borrow
//! checker rather than from a runtime flag.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::hash::{BuildHasher, Hash};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::block::serde::PartitionSerializer;
use crate::error::{BlockFetchError, BlockWriteError};
use crate::model::KeyRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Open,
    Committed,
}

/// `{key, offsetBytes, lengthBytes, elementCount}`, appended in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata<K> {
    pub key: K,
    pub offset: u64,
    pub length: u32,
    pub element_count: u32,
}

/// Zero-copy descriptor for forwarding a byte range to a remote reader
/// without deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArea {
    pub path: PathBuf,
    pub offset: u64,
    pub length: u64,
}

fn bucket_of<K: Hash>(key: &K, hash_range: u32) -> u32 {
    let build_hasher = ahash::RandomState::with_seeds(0, 0, 0, 0);
    (build_hasher.hash_one(key) % hash_range as u64) as u32
}

/// A single block: an ordered list of partition metadata plus the backing
/// byte file, owned exclusively by the executor that created it.
pub struct Block<K, T, S: PartitionSerializer<T>> {
    id: String,
    path: PathBuf,
    hash_range: u32,
    state: BlockState,
    metadata: Vec<PartitionMetadata<K>>,
    bytes_written: u64,
    file: File,
    serializer: S,
    buffer_order: Vec<K>,
    buffer: HashMap<K, Vec<T>>,
}

impl<K, T, S> Block<K, T, S>
where
    K: Eq + Hash + Clone,
    S: PartitionSerializer<T>,
{
    /// Create a new block, in state `open`, backed by `path`.
    pub fn create(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        hash_range: u32,
        serializer: S,
    ) -> std::io::Result<Self> {
        let id = id.into();
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        debug!("created block {} at {}", id, path.display());
        Ok(Self {
            id,
            path,
            hash_range,
            state: BlockState::Open,
            metadata: Vec::new(),
            bytes_written: 0,
            file,
            serializer,
            buffer_order: Vec::new(),
            buffer: HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<(), BlockWriteError> {
        if self.state == BlockState::Committed {
            return Err(BlockWriteError::AlreadyCommitted {
                block_id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn ensure_committed(&self) -> Result<(), BlockFetchError> {
        if self.state != BlockState::Committed {
            return Err(BlockFetchError::NotCommitted {
                block_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Buffer `element` into the in-memory partition for `key`. Fails if
    /// the block is already committed.
    pub fn write(&mut self, key: K, element: T) -> Result<(), BlockWriteError> {
        self.ensure_open()?;
        if !self.buffer.contains_key(&key) {
            self.buffer_order.push(key.clone());
        }
        self.buffer.entry(key).or_default().push(element);
        Ok(())
    }

    /// Serialize (via the configured serializer) and append `partitions`
    /// to storage immediately, updating metadata. Not buffered.
    pub fn write_partitions<I>(&mut self, partitions: I) -> Result<(), BlockWriteError>
    where
        I: IntoIterator<Item = (K, Vec<T>)>,
    {
        self.ensure_open()?;
        for (key, elements) in partitions {
            let element_count = elements.len() as u32;
            let bytes = self.serializer.serialize(&elements);
            self.append_raw(key, &bytes, element_count)?;
        }
        Ok(())
    }

    /// Append already-serialized partitions directly, bypassing the
    /// element-level serializer.
    pub fn write_serialized_partitions<I>(&mut self, partitions: I) -> Result<(), BlockWriteError>
    where
        I: IntoIterator<Item = (K, Vec<u8>, u32)>,
    {
        self.ensure_open()?;
        for (key, bytes, element_count) in partitions {
            self.append_raw(key, &bytes, element_count)?;
        }
        Ok(())
    }

    fn append_raw(
        &mut self,
        key: K,
        bytes: &[u8],
        element_count: u32,
    ) -> Result<(), BlockWriteError> {
        self.file.write_all(bytes).map_err(|e| BlockWriteError::Io {
            block_id: self.id.clone(),
            source: e,
        })?;
        let offset = self.bytes_written;
        let length = bytes.len() as u32;
        self.bytes_written += length as u64;
        self.metadata.push(PartitionMetadata {
            key,
            offset,
            length,
            element_count,
        });
        Ok(())
    }

    /// Flush any buffered partitions, in the order keys were first written,
    /// then clear the buffer.
    pub fn commit_partitions(&mut self) -> Result<(), BlockWriteError> {
        self.ensure_open()?;
        let order = std::mem::take(&mut self.buffer_order);
        let mut buffer = std::mem::take(&mut self.buffer);
        for key in order {
            if let Some(elements) = buffer.remove(&key) {
                let element_count = elements.len() as u32;
                let bytes = self.serializer.serialize(&elements);
                self.append_raw(key, &bytes, element_count)?;
            }
        }
        Ok(())
    }

    /// Flush buffered partitions, seal the block, and return per-key total
    /// bytes written. Calling `commit` a second time is a no-op that
    /// returns the same map.
    pub fn commit(&mut self) -> Result<HashMap<K, u64>, BlockWriteError> {
        if self.state == BlockState::Open {
            self.commit_partitions()?;
            self.state = BlockState::Committed;
            self.file.flush().map_err(|e| BlockWriteError::Io {
                block_id: self.id.clone(),
                source: e,
            })?;
            info!(
                "committed block {} with {} partitions, {} bytes",
                self.id,
                self.metadata.len(),
                self.bytes_written
            );
        }
        Ok(self.per_key_totals())
    }

    fn per_key_totals(&self) -> HashMap<K, u64> {
        let mut totals: HashMap<K, u64> = HashMap::new();
        for entry in &self.metadata {
            *totals.entry(entry.key.clone()).or_insert(0) += entry.length as u64;
        }
        totals
    }

    /// Stream deserialized partitions whose key's bucket falls in `range`.
    /// Fails unless the block has been committed.
    pub fn read_partitions(&self, range: KeyRange) -> Result<PartitionIter<'_, K, T, S>, BlockFetchError> {
        self.ensure_committed()?;
        let reader = File::open(&self.path).map_err(|e| BlockFetchError::Io {
            block_id: self.id.clone(),
            source: e,
        })?;
        Ok(PartitionIter {
            block_id: self.id.clone(),
            hash_range: self.hash_range,
            range,
            metadata: self.metadata.iter(),
            reader,
            serializer: &self.serializer,
        })
    }

    /// Zero-copy descriptor for every partition whose key's bucket falls in
    /// `range`. Fails unless the block has been committed.
    pub fn as_file_areas(&self, range: KeyRange) -> Result<Vec<FileArea>, BlockFetchError> {
        self.ensure_committed()?;
        Ok(self
            .metadata
            .iter()
            .filter(|entry| range.contains(bucket_of(&entry.key, self.hash_range)))
            .map(|entry| FileArea {
                path: self.path.clone(),
                offset: entry.offset,
                length: entry.length as u64,
            })
            .collect())
    }

    /// Remove the file and metadata. Callers must ensure every outstanding
    /// reader has finished before calling this.
    pub fn delete(self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// Lazily reads partitions whose key falls within a [`KeyRange`], exclusively
/// owning its own file handle (independent of the writer's) and seeking past
/// excluded partitions rather than reading them.
pub struct PartitionIter<'a, K, T, S: PartitionSerializer<T>> {
    block_id: String,
    hash_range: u32,
    range: KeyRange,
    metadata: std::slice::Iter<'a, PartitionMetadata<K>>,
    reader: File,
    serializer: &'a S,
}

impl<'a, K: Hash + Clone, T, S: PartitionSerializer<T>> Iterator for PartitionIter<'a, K, T, S> {
    type Item = Result<(K, Vec<T>), BlockFetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.metadata.by_ref() {
            if !self.range.contains(bucket_of(&entry.key, self.hash_range)) {
                continue;
            }
            if let Err(e) = self.reader.seek(SeekFrom::Start(entry.offset)) {
                return Some(Err(BlockFetchError::Io {
                    block_id: self.block_id.clone(),
                    source: e,
                }));
            }
            let mut buf = vec![0u8; entry.length as usize];
            if self.reader.read_exact(&mut buf).is_err() {
                let actual = self
                    .reader
                    .metadata()
                    .map(|m| m.len().saturating_sub(entry.offset))
                    .unwrap_or(0);
                return Some(Err(BlockFetchError::LengthMismatch {
                    block_id: self.block_id.clone(),
                    expected: entry.length,
                    actual,
                }));
            }
            let elements = self.serializer.deserialize(&buf);
            return Some(Ok((entry.key.clone(), elements)));
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::serde::RawBytesSerializer;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn round_trip_preserves_elements_and_per_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-1.data");
        let mut block = Block::create("block-1", &path, 11, RawBytesSerializer).unwrap();

        block.write(1u32, b"a".to_vec()).unwrap();
        block.write(1u32, b"b".to_vec()).unwrap();
        block
            .write_partitions(vec![(2u32, vec![b"c".to_vec(), b"d".to_vec()])])
            .unwrap();
        block.write(1u32, b"e".to_vec()).unwrap();

        let totals = block.commit().unwrap();
        assert_eq!(totals.len(), 2);

        let universal = KeyRange::new(0, 11, false);
        let mut seen: HashMap<u32, Vec<Vec<u8>>> = HashMap::new();
        for item in block.read_partitions(universal).unwrap() {
            let (key, elements) = item.unwrap();
            seen.entry(key).or_default().extend(elements);
        }
        assert_eq!(
            seen.get(&1u32).unwrap(),
            &vec![b"a".to_vec(), b"b".to_vec(), b"e".to_vec()]
        );
        assert_eq!(seen.get(&2u32).unwrap(), &vec![b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn partial_read_yields_only_keys_whose_bucket_is_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-2.data");
        let hash_range = 11;
        let mut block = Block::create("block-2", &path, hash_range, RawBytesSerializer).unwrap();

        for key in 0u32..11 {
            block.write(key, key.to_le_bytes().to_vec()).unwrap();
        }
        block.commit().unwrap();

        let range = KeyRange::new(0, 5, false);
        let read_keys: Vec<u32> = block
            .read_partitions(range)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();

        let expected: Vec<u32> = (0u32..11)
            .filter(|k| bucket_of(k, hash_range) < 5)
            .collect();

        let mut read_sorted = read_keys.clone();
        read_sorted.sort_unstable();
        let mut expected_sorted = expected.clone();
        expected_sorted.sort_unstable();
        assert_eq!(read_sorted, expected_sorted);
    }

    #[test]
    fn commit_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-3.data");
        let mut block = Block::create("block-3", &path, 11, RawBytesSerializer).unwrap();
        block.write(1u32, b"x".to_vec()).unwrap();

        let first = block.commit().unwrap();
        let second = block.commit().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn write_after_commit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-4.data");
        let mut block = Block::create("block-4", &path, 11, RawBytesSerializer).unwrap();
        block.commit().unwrap();

        let err = block.write(1u32, b"late".to_vec()).unwrap_err();
        assert!(matches!(err, BlockWriteError::AlreadyCommitted { .. }));
    }

    #[test]
    fn read_before_commit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-5.data");
        let block = Block::<u32, Vec<u8>, _>::create("block-5", &path, 11, RawBytesSerializer).unwrap();

        let err = block.read_partitions(KeyRange::new(0, 11, false)).unwrap_err();
        assert!(matches!(err, BlockFetchError::NotCommitted { .. }));
    }

    #[test]
    fn file_areas_cover_every_partition_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-6.data");
        let mut block = Block::create("block-6", &path, 11, RawBytesSerializer).unwrap();
        block.write(3u32, b"abc".to_vec()).unwrap();
        block.commit().unwrap();

        let areas = block.as_file_areas(KeyRange::new(0, 11, false)).unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].path, path);
    }

    #[test]
    fn delete_removes_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "block-7.data");
        let mut block = Block::create("block-7", &path, 11, RawBytesSerializer).unwrap();
        block.write(1u32, b"x".to_vec()).unwrap();
        block.commit().unwrap();

        block.delete().unwrap();
        assert!(!path.exists());
    }
}
