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

//! The on-disk codec for user elements is an external collaborator: the
//! Block Store is generic over a [`PartitionSerializer`] rather than
//! knowing anything about a concrete wire format.

/// Encodes/decodes the elements of one partition to/from the block's backing
/// byte storage. Implementations need not be self-describing about element
/// count; the block store tracks `elementCount` separately in
/// [`super::PartitionMetadata`].
pub trait PartitionSerializer<T>: Send + Sync {
    fn serialize(&self, elements: &[T]) -> Vec<u8>;
    fn deserialize(&self, bytes: &[u8]) -> Vec<T>;
}

/// Trivial length-prefixed passthrough serializer over raw byte elements.
/// Used by tests and as the default when callers have no real codec to
/// plug in.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBytesSerializer;

impl PartitionSerializer<Vec<u8>> for RawBytesSerializer {
    fn serialize(&self, elements: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for elem in elements {
            out.extend_from_slice(&(elem.len() as u32).to_le_bytes());
            out.extend_from_slice(elem);
        }
        out
    }

    fn deserialize(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut pos = 0usize;
        while pos + 4 <= bytes.len() {
            let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            out.push(bytes[pos..pos + len].to_vec());
            pos += len;
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raw_bytes_round_trip_preserves_element_order() {
        let ser = RawBytesSerializer;
        let elements = vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()];
        let bytes = ser.serialize(&elements);
        assert_eq!(ser.deserialize(&bytes), elements);
    }
}
