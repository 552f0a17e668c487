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

//! Compact theta sketch.
//!
//! A [`CompactThetaSketch`] is the immutable snapshot form of a theta
//! sketch: theta, the retained hashes (usually in ascending order) and the
//! seed tag. It is the exchange format produced by update sketches and set
//! operations, and the shape that serializes smallest.

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::common::binomial_bounds;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::serialization::FLAG_HAS_SINGLE_ITEM;
use crate::theta::serialization::FLAG_IS_COMPACT;
use crate::theta::serialization::FLAG_IS_EMPTY;
use crate::theta::serialization::FLAG_IS_ORDERED;
use crate::theta::serialization::FLAG_IS_READ_ONLY;
use crate::theta::serialization::HASH_SIZE_BYTES;
use crate::theta::serialization::PREAMBLE_LONGS_EMPTY;
use crate::theta::serialization::PREAMBLE_LONGS_FULL;
use crate::theta::serialization::PREAMBLE_LONGS_SINGLE;
use crate::theta::serialization::Preamble;
use crate::theta::serialization::SERIAL_VERSION;

/// An immutable, compact theta sketch.
///
/// Unlike [`UpdateSketch`](super::UpdateSketch) it cannot take new items; it
/// answers estimates, participates in set operations and round-trips through
/// its serialized form byte for byte.
///
/// # Examples
///
/// ```
/// use thetasketch::theta::CompactThetaSketch;
/// use thetasketch::theta::UpdateSketch;
///
/// let mut sketch = UpdateSketch::builder().build();
/// sketch.update_str("apple");
/// sketch.update_str("banana");
///
/// let compact = sketch.compact();
/// let bytes = compact.serialize();
/// let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
/// assert_eq!(compact.estimate(), restored.estimate());
/// ```
#[derive(Debug, Clone)]
pub struct CompactThetaSketch {
    theta: u64,
    entries: Vec<u64>,
    seed_hash: u16,
    is_empty: bool,
    is_ordered: bool,
}

impl CompactThetaSketch {
    pub(crate) fn from_parts(
        theta: u64,
        entries: Vec<u64>,
        seed_hash: u16,
        is_empty: bool,
        is_ordered: bool,
    ) -> Self {
        Self {
            theta,
            entries,
            seed_hash,
            is_empty,
            is_ordered,
        }
    }

    /// Returns the cardinality estimate.
    pub fn estimate(&self) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        let retained = self.entries.len() as f64;
        if !self.is_estimation_mode() {
            return retained;
        }
        retained / self.theta()
    }

    /// Returns theta as a fraction in `(0.0, 1.0]`.
    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// Returns theta as the raw 64-bit cutoff.
    pub fn theta64(&self) -> u64 {
        self.theta
    }

    /// Returns true iff the source sketch never processed an admissible
    /// update.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Returns true iff the entries are in ascending order.
    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    /// Returns true iff the estimate is a projection rather than an exact
    /// count.
    pub fn is_estimation_mode(&self) -> bool {
        self.theta < MAX_THETA
    }

    /// Returns the number of retained entries.
    pub fn num_retained(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Returns the 16-bit tag of the source sketch's seed.
    pub fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    /// Iterates the retained hash values.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }

    /// Returns the approximate lower error bound given the specified number
    /// of standard deviations.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        binomial_bounds::lower_bound(self.entries.len() as u64, self.theta(), num_std_dev)
    }

    /// Returns the approximate upper error bound given the specified number
    /// of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        binomial_bounds::upper_bound(
            self.entries.len() as u64,
            self.theta(),
            num_std_dev,
            self.is_empty,
        )
    }

    /// Returns the exact size of the serialized form in bytes.
    pub fn serialized_size_bytes(&self) -> usize {
        usize::from(self.preamble_longs()) * 8 + self.entries.len() * HASH_SIZE_BYTES
    }

    fn preamble_longs(&self) -> u8 {
        if self.is_empty {
            PREAMBLE_LONGS_EMPTY
        } else if self.entries.len() == 1 && !self.is_estimation_mode() {
            PREAMBLE_LONGS_SINGLE
        } else {
            PREAMBLE_LONGS_FULL
        }
    }

    /// Serializes the sketch in the compact format.
    pub fn serialize(&self) -> Vec<u8> {
        let preamble_longs = self.preamble_longs();

        let mut flags = FLAG_IS_READ_ONLY | FLAG_IS_COMPACT;
        if self.is_ordered {
            flags |= FLAG_IS_ORDERED;
        }
        if self.is_empty {
            flags |= FLAG_IS_EMPTY;
        }
        if preamble_longs == PREAMBLE_LONGS_SINGLE {
            flags |= FLAG_HAS_SINGLE_ITEM;
        }

        let preamble = Preamble {
            preamble_longs,
            lg_resize_factor: 0,
            serial_version: SERIAL_VERSION,
            family_id: Family::COMPACT.id,
            lg_nom: 0,
            lg_arr: 0,
            flags,
            seed_hash: self.seed_hash,
            cur_count: self.entries.len() as u32,
            p: 1.0,
            theta: self.theta,
        };

        let mut bytes = SketchBytes::with_capacity(self.serialized_size_bytes());
        preamble.write(&mut bytes);
        for &entry in &self.entries {
            bytes.write_u64_le(entry);
        }
        bytes.into_bytes()
    }

    /// Serializes into a caller-provided buffer, returning the written size.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityExceeded`](crate::error::ErrorKind) when
    /// the destination is smaller than
    /// [`serialized_size_bytes`](Self::serialized_size_bytes).
    pub fn serialize_into(&self, dst: &mut [u8]) -> Result<usize, Error> {
        let bytes = self.serialize();
        if dst.len() < bytes.len() {
            return Err(Error::capacity_exceeded(bytes.len(), dst.len()));
        }
        dst[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Deserializes a compact sketch using the default seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is truncated, corrupted, not compact,
    /// or was built with a different seed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserializes a compact sketch with a specific seed.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;
        preamble.validate_family(&Family::COMPACT)?;
        preamble.validate_seed_hash(seed)?;
        if !preamble.is_compact() {
            return Err(Error::deserial("compact flag not set on a compact image"));
        }

        if preamble.is_empty() {
            return Ok(Self {
                theta: MAX_THETA,
                entries: Vec::new(),
                seed_hash: preamble.seed_hash,
                is_empty: true,
                is_ordered: preamble.is_ordered(),
            });
        }

        let mut entries = Vec::with_capacity(preamble.cur_count as usize);
        for _ in 0..preamble.cur_count {
            let entry = cursor
                .read_u64_le()
                .map_err(|e| Error::insufficient_data("hash entry", e))?;
            entries.push(entry);
        }

        Ok(Self {
            theta: preamble.theta,
            entries,
            seed_hash: preamble.seed_hash,
            is_empty: false,
            is_ordered: preamble.is_ordered(),
        })
    }
}

impl ThetaSketchView for CompactThetaSketch {
    fn num_retained(&self) -> u32 {
        self.entries.len() as u32
    }

    fn theta64(&self) -> u64 {
        self.theta
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        CompactThetaSketch::iter(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::compute_seed_hash;

    fn seed_hash() -> u16 {
        compute_seed_hash(DEFAULT_UPDATE_SEED)
    }

    #[test]
    fn test_empty_compact_sketch() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, Vec::new(), seed_hash(), true, true);
        assert!(sketch.is_empty());
        assert_eq!(sketch.estimate(), 0.0);
        assert_eq!(sketch.num_retained(), 0);
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.lower_bound(NumStdDev::Two), 0.0);
        assert_eq!(sketch.upper_bound(NumStdDev::Two), 0.0);
    }

    #[test]
    fn test_exact_mode_estimate() {
        let sketch =
            CompactThetaSketch::from_parts(MAX_THETA, vec![100, 200, 300], seed_hash(), false, true);
        assert_eq!(sketch.estimate(), 3.0);
        assert!(!sketch.is_estimation_mode());
    }

    #[test]
    fn test_estimation_mode_estimate() {
        let sketch = CompactThetaSketch::from_parts(
            MAX_THETA / 2,
            vec![100, 200, 300],
            seed_hash(),
            false,
            true,
        );
        assert!(sketch.is_estimation_mode());
        assert!((sketch.estimate() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_serialize_deserialize_empty() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, Vec::new(), seed_hash(), true, true);
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 8);

        let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.theta64(), MAX_THETA);
        assert_eq!(bytes, restored.serialize());
    }

    #[test]
    fn test_serialize_deserialize_single_item() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, vec![12345], seed_hash(), false, true);
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 24);
        assert_ne!(bytes[5] & FLAG_HAS_SINGLE_ITEM, 0);

        let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored.num_retained(), 1);
        assert_eq!(restored.estimate(), 1.0);
        assert_eq!(bytes, restored.serialize());
    }

    #[test]
    fn test_serialize_deserialize_estimation_mode() {
        let entries: Vec<u64> = (1..=50).map(|i| i * 1000).collect();
        let sketch =
            CompactThetaSketch::from_parts(MAX_THETA / 4, entries.clone(), seed_hash(), false, true);
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 24 + 50 * 8);

        let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
        assert!(restored.is_estimation_mode());
        assert_eq!(restored.theta64(), MAX_THETA / 4);
        assert_eq!(restored.iter().collect::<Vec<_>>(), entries);
        assert_eq!(bytes, restored.serialize());
    }

    #[test]
    fn test_serialize_into() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, vec![1, 2, 3], seed_hash(), false, true);
        let size = sketch.serialized_size_bytes();

        let mut exact = vec![0u8; size];
        assert_eq!(sketch.serialize_into(&mut exact).unwrap(), size);
        assert_eq!(exact, sketch.serialize());

        let mut small = vec![0u8; size - 1];
        let error = sketch.serialize_into(&mut small).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn test_deserialize_rejects_wrong_family() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, vec![1], seed_hash(), false, true);
        let mut bytes = sketch.serialize();
        bytes[2] = 99;
        assert!(CompactThetaSketch::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_rejects_wrong_seed() {
        let sketch = CompactThetaSketch::from_parts(MAX_THETA, vec![1], seed_hash(), false, true);
        let bytes = sketch.serialize();
        assert!(CompactThetaSketch::deserialize_with_seed(&bytes, 777).is_err());
    }

    #[test]
    fn test_deserialize_rejects_truncated_entries() {
        let sketch =
            CompactThetaSketch::from_parts(MAX_THETA / 2, vec![10, 20, 30], seed_hash(), false, true);
        let bytes = sketch.serialize();
        assert!(CompactThetaSketch::deserialize(&bytes[..bytes.len() - 8]).is_err());
    }
}
