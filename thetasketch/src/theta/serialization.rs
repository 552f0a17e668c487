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

//! Binary serialization format for theta sketches.
//!
//! Every serialized form starts with the same fixed-offset little-endian
//! preamble:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 1    | preamble longs (low 6 bits), lg resize factor (bits 6-7) |
//! | 1      | 1    | serial version |
//! | 2      | 1    | family id |
//! | 3      | 1    | lg nominal entries |
//! | 4      | 1    | lg slot array length |
//! | 5      | 1    | flags |
//! | 6      | 2    | seed hash |
//! | 8      | 4    | retained count (preamble longs >= 2) |
//! | 12     | 4    | sampling probability as f32 (preamble longs >= 2) |
//! | 16     | 8    | theta (preamble longs >= 3) |
//!
//! The body that follows is either the full slot array image (update forms)
//! or the retained entries in ascending order (compact form).

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hash::compute_seed_hash;
use crate::theta::hash_table::MAX_THETA;

/// Current serialization version.
pub(crate) const SERIAL_VERSION: u8 = 3;

/// Preamble size in longs for an empty compact sketch.
pub(crate) const PREAMBLE_LONGS_EMPTY: u8 = 1;

/// Preamble size in longs for a non-empty exact single-item compact sketch.
pub(crate) const PREAMBLE_LONGS_SINGLE: u8 = 2;

/// Preamble size in longs for the general compact form and all update forms.
pub(crate) const PREAMBLE_LONGS_FULL: u8 = 3;

// Flags (byte 5) - bit masks.
/// Flag: data is in big-endian format (we always write little-endian).
#[allow(dead_code)]
pub(crate) const FLAG_IS_BIG_ENDIAN: u8 = 1 << 0;
/// Flag: sketch is read-only.
pub(crate) const FLAG_IS_READ_ONLY: u8 = 1 << 1;
/// Flag: sketch is empty.
pub(crate) const FLAG_IS_EMPTY: u8 = 1 << 2;
/// Flag: sketch is in compact format.
pub(crate) const FLAG_IS_COMPACT: u8 = 1 << 3;
/// Flag: hash values are ordered.
pub(crate) const FLAG_IS_ORDERED: u8 = 1 << 4;
/// Flag: sketch contains a single item.
pub(crate) const FLAG_HAS_SINGLE_ITEM: u8 = 1 << 5;

/// Size of a single hash entry in bytes.
pub(crate) const HASH_SIZE_BYTES: usize = 8;

/// The fixed-offset header shared by every serialized sketch form.
///
/// Fields absent from short preambles read back as their defaults: a zero
/// count, `p = 1` and `theta` at its maximum.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Preamble {
    pub preamble_longs: u8,
    pub lg_resize_factor: u8,
    pub serial_version: u8,
    pub family_id: u8,
    pub lg_nom: u8,
    pub lg_arr: u8,
    pub flags: u8,
    pub seed_hash: u16,
    pub cur_count: u32,
    pub p: f32,
    pub theta: u64,
}

impl Preamble {
    pub fn write(&self, out: &mut SketchBytes) {
        out.write_u8((self.lg_resize_factor << 6) | (self.preamble_longs & 0x3F));
        out.write_u8(self.serial_version);
        out.write_u8(self.family_id);
        out.write_u8(self.lg_nom);
        out.write_u8(self.lg_arr);
        out.write_u8(self.flags);
        out.write_u16_le(self.seed_hash);
        if self.preamble_longs >= PREAMBLE_LONGS_SINGLE {
            out.write_u32_le(self.cur_count);
            out.write_f32_le(self.p);
        }
        if self.preamble_longs >= PREAMBLE_LONGS_FULL {
            out.write_u64_le(self.theta);
        }
    }

    pub fn read(cursor: &mut SketchSlice<'_>) -> Result<Self, Error> {
        let byte0 = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble_longs", e))?;
        let preamble_longs = byte0 & 0x3F;
        let lg_resize_factor = byte0 >> 6;
        let serial_version = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("serial_version", e))?;
        let family_id = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("family_id", e))?;
        let lg_nom = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("lg_nom", e))?;
        let lg_arr = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("lg_arr", e))?;
        let flags = cursor
            .read_u8()
            .map_err(|e| Error::insufficient_data("flags", e))?;
        let seed_hash = cursor
            .read_u16_le()
            .map_err(|e| Error::insufficient_data("seed_hash", e))?;

        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        if !(PREAMBLE_LONGS_EMPTY..=PREAMBLE_LONGS_FULL).contains(&preamble_longs) {
            return Err(Error::deserial(format!(
                "preamble longs out of range: {preamble_longs}"
            )));
        }

        let (cur_count, p) = if preamble_longs >= PREAMBLE_LONGS_SINGLE {
            let cur_count = cursor
                .read_u32_le()
                .map_err(|e| Error::insufficient_data("cur_count", e))?;
            let p = cursor
                .read_f32_le()
                .map_err(|e| Error::insufficient_data("p", e))?;
            (cur_count, p)
        } else {
            (0, 1.0)
        };
        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::deserial(format!(
                "sampling probability out of range: {p}"
            )));
        }

        let theta = if preamble_longs >= PREAMBLE_LONGS_FULL {
            cursor
                .read_u64_le()
                .map_err(|e| Error::insufficient_data("theta", e))?
        } else {
            MAX_THETA
        };
        if theta == 0 || theta > MAX_THETA {
            return Err(Error::deserial(format!("theta out of range: {theta}")));
        }

        Ok(Self {
            preamble_longs,
            lg_resize_factor,
            serial_version,
            family_id,
            lg_nom,
            lg_arr,
            flags,
            seed_hash,
            cur_count,
            p,
            theta,
        })
    }

    pub fn validate_family(&self, family: &Family) -> Result<(), Error> {
        family.validate_id(self.family_id)?;
        family.validate_pre_longs(self.preamble_longs)
    }

    pub fn validate_seed_hash(&self, seed: u64) -> Result<(), Error> {
        let expected = compute_seed_hash(seed);
        if self.seed_hash != expected {
            return Err(Error::seed_hash_mismatch(expected, self.seed_hash));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.flags & FLAG_IS_EMPTY != 0
    }

    pub fn is_compact(&self) -> bool {
        self.flags & FLAG_IS_COMPACT != 0
    }

    pub fn is_ordered(&self) -> bool {
        self.flags & FLAG_IS_ORDERED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DEFAULT_UPDATE_SEED;

    fn sample_preamble() -> Preamble {
        Preamble {
            preamble_longs: PREAMBLE_LONGS_FULL,
            lg_resize_factor: 3,
            serial_version: SERIAL_VERSION,
            family_id: Family::QUICK_SELECT.id,
            lg_nom: 12,
            lg_arr: 13,
            flags: FLAG_IS_EMPTY,
            seed_hash: compute_seed_hash(DEFAULT_UPDATE_SEED),
            cur_count: 42,
            p: 0.5,
            theta: MAX_THETA / 2,
        }
    }

    fn write_to_bytes(preamble: &Preamble) -> Vec<u8> {
        let mut out = SketchBytes::with_capacity(24);
        preamble.write(&mut out);
        out.into_bytes()
    }

    #[test]
    fn test_flag_masks() {
        assert_eq!(FLAG_IS_BIG_ENDIAN, 1);
        assert_eq!(FLAG_IS_READ_ONLY, 2);
        assert_eq!(FLAG_IS_EMPTY, 4);
        assert_eq!(FLAG_IS_COMPACT, 8);
        assert_eq!(FLAG_IS_ORDERED, 16);
        assert_eq!(FLAG_HAS_SINGLE_ITEM, 32);
    }

    #[test]
    fn test_full_round_trip() {
        let preamble = sample_preamble();
        let bytes = write_to_bytes(&preamble);
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[0], (3 << 6) | 3);

        let restored = Preamble::read(&mut SketchSlice::new(&bytes)).unwrap();
        assert_eq!(restored.preamble_longs, PREAMBLE_LONGS_FULL);
        assert_eq!(restored.lg_resize_factor, 3);
        assert_eq!(restored.family_id, Family::QUICK_SELECT.id);
        assert_eq!(restored.lg_nom, 12);
        assert_eq!(restored.lg_arr, 13);
        assert!(restored.is_empty());
        assert_eq!(restored.cur_count, 42);
        assert_eq!(restored.p, 0.5);
        assert_eq!(restored.theta, MAX_THETA / 2);
        assert!(restored.validate_seed_hash(DEFAULT_UPDATE_SEED).is_ok());
        assert!(restored.validate_seed_hash(7).is_err());
    }

    #[test]
    fn test_short_preamble_defaults() {
        let mut preamble = sample_preamble();
        preamble.preamble_longs = PREAMBLE_LONGS_EMPTY;
        preamble.lg_resize_factor = 0;
        let bytes = write_to_bytes(&preamble);
        assert_eq!(bytes.len(), 8);

        let restored = Preamble::read(&mut SketchSlice::new(&bytes)).unwrap();
        assert_eq!(restored.cur_count, 0);
        assert_eq!(restored.p, 1.0);
        assert_eq!(restored.theta, MAX_THETA);
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut preamble = sample_preamble();
        preamble.serial_version = 2;
        let bytes = write_to_bytes(&preamble);
        assert!(Preamble::read(&mut SketchSlice::new(&bytes)).is_err());
    }

    #[test]
    fn test_rejects_bad_preamble_longs() {
        let mut bytes = write_to_bytes(&sample_preamble());
        bytes[0] = 9;
        assert!(Preamble::read(&mut SketchSlice::new(&bytes)).is_err());
    }

    #[test]
    fn test_rejects_bad_theta() {
        let mut bytes = write_to_bytes(&sample_preamble());
        bytes[16..24].copy_from_slice(&0u64.to_le_bytes());
        assert!(Preamble::read(&mut SketchSlice::new(&bytes)).is_err());
        bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(Preamble::read(&mut SketchSlice::new(&bytes)).is_err());
    }

    #[test]
    fn test_rejects_truncated_input() {
        let bytes = write_to_bytes(&sample_preamble());
        for len in [0, 4, 8, 12, 20] {
            assert!(Preamble::read(&mut SketchSlice::new(&bytes[..len])).is_err());
        }
    }

    #[test]
    fn test_rejects_bad_sampling_probability() {
        let mut bytes = write_to_bytes(&sample_preamble());
        bytes[12..16].copy_from_slice(&2.0f32.to_le_bytes());
        assert!(Preamble::read(&mut SketchSlice::new(&bytes)).is_err());
        bytes[12..16].copy_from_slice(&0.0f32.to_le_bytes());
        assert!(Preamble::read(&mut SketchSlice::new(&bytes)).is_err());
    }
}
