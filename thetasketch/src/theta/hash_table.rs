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

//! Open-addressed hash table operations over `u64` slot arrays.
//!
//! Slot value zero is the empty sentinel. Probing is double hashing: the
//! start index comes from the low bits of the hash and the stride from the
//! bits just above the table index. The stride is always odd, so on a
//! power-of-two table every slot is visited before the probe wraps.

/// Maximum theta (the unsigned value of `i64::MAX`; hashes keep the top bit
/// clear).
pub(crate) const MAX_THETA: u64 = i64::MAX as u64;

/// Minimum log2 of the slot array length.
pub(crate) const MIN_LG_ARR: u8 = 5;

/// Minimum log2 of nominal entries for the QuickSelect sketch.
pub(crate) const MIN_LG_NOM: u8 = 4;

/// Maximum log2 of nominal entries.
pub(crate) const MAX_LG_NOM: u8 = 26;

/// Default log2 of nominal entries.
pub(crate) const DEFAULT_LG_NOM: u8 = 12;

/// Fill fraction that triggers a resize or rebuild (15/16).
pub(crate) const REBUILD_THRESHOLD: f64 = 15.0 / 16.0;

const STRIDE_HASH_BITS: u8 = 6;
const STRIDE_MASK: u64 = (1 << STRIDE_HASH_BITS) - 1;

/// Probe stride for a hash; always odd.
pub(crate) fn stride(hash: u64, lg_arr: u8) -> usize {
    (2 * ((hash >> lg_arr) & STRIDE_MASK) + 1) as usize
}

/// Inserts `hash` unless it is already present.
///
/// Returns true iff `hash` was newly written, false iff the exact value was
/// already stored.
///
/// # Panics
///
/// Panics if the table is full. Callers keep the fill below
/// [`REBUILD_THRESHOLD`], which makes a full table unreachable.
pub(crate) fn hash_search_or_insert(table: &mut [u64], lg_arr: u8, hash: u64) -> bool {
    let mask = table.len() - 1;
    let stride = stride(hash, lg_arr);
    let start = (hash as usize) & mask;
    let mut probe = start;
    loop {
        let slot = table[probe];
        if slot == 0 {
            table[probe] = hash;
            return true;
        }
        if slot == hash {
            return false;
        }
        probe = (probe + stride) & mask;
        assert_ne!(probe, start, "hash table is full");
    }
}

/// Returns true iff `hash` is present in the table.
pub(crate) fn hash_search(table: &[u64], lg_arr: u8, hash: u64) -> bool {
    if table.is_empty() {
        return false;
    }
    let mask = table.len() - 1;
    let stride = stride(hash, lg_arr);
    let start = (hash as usize) & mask;
    let mut probe = start;
    loop {
        let slot = table[probe];
        if slot == hash {
            return true;
        }
        if slot == 0 {
            return false;
        }
        probe = (probe + stride) & mask;
        if probe == start {
            return false;
        }
    }
}

/// Counts the slots strictly inside `(0, theta)`.
pub(crate) fn count_below(table: &[u64], theta: u64) -> u32 {
    table.iter().filter(|&&slot| slot != 0 && slot < theta).count() as u32
}

/// Rehashes every value of `src` inside `(0, theta)` into `dst`.
///
/// Returns the number of entries in `dst` afterwards. This is the one bulk
/// move used by resize, rebuild, dirty cleanup and merge ingestion.
pub(crate) fn hash_array_insert(src: &[u64], dst: &mut [u64], lg_dst: u8, theta: u64) -> u32 {
    let mut count = 0;
    for &value in src {
        if value != 0 && value < theta && hash_search_or_insert(dst, lg_dst, value) {
            count += 1;
        }
    }
    count
}

/// Smallest lg table size that keeps `count` entries under `fraction` fill.
pub(crate) fn lg_size_for_count(count: u32, fraction: f64) -> u8 {
    let mut lg_size = MIN_LG_ARR;
    while f64::from(count) > fraction * (1u64 << lg_size) as f64 {
        lg_size += 1;
    }
    lg_size
}

/// Initial slot array size for a sketch with the given resize factor.
pub(crate) fn starting_lg_arr(lg_nom: u8, lg_resize_factor: u8) -> u8 {
    (lg_nom + 1).saturating_sub(lg_resize_factor).max(MIN_LG_ARR)
}

/// Initial theta for a sampling probability.
pub(crate) fn starting_theta(p: f32) -> u64 {
    if p < 1.0 {
        (MAX_THETA as f64 * f64::from(p)) as u64
    } else {
        MAX_THETA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_is_odd() {
        for hash in [0u64, 1, 0xdead_beef, u64::MAX >> 1] {
            for lg_arr in [MIN_LG_ARR, 10, 20] {
                assert_eq!(stride(hash, lg_arr) % 2, 1);
            }
        }
    }

    #[test]
    fn test_insert_and_search() {
        let mut table = vec![0u64; 32];
        assert!(hash_search_or_insert(&mut table, 5, 12345));
        assert!(!hash_search_or_insert(&mut table, 5, 12345));
        assert!(hash_search(&table, 5, 12345));
        assert!(!hash_search(&table, 5, 54321));
        assert_eq!(count_below(&table, u64::MAX), 1);
    }

    #[test]
    fn test_search_empty_table() {
        assert!(!hash_search(&[], 5, 1));
    }

    #[test]
    fn test_colliding_inserts_all_land() {
        // Values sharing the low bits all start at the same slot and must
        // walk the stride instead of clobbering each other.
        let mut table = vec![0u64; 32];
        let values: Vec<u64> = (0..8).map(|i| (i << 40) | 7).collect();
        for &value in &values {
            assert!(hash_search_or_insert(&mut table, 5, value));
        }
        for &value in &values {
            assert!(hash_search(&table, 5, value));
        }
        assert_eq!(count_below(&table, u64::MAX), 8);
    }

    #[test]
    #[should_panic(expected = "hash table is full")]
    fn test_insert_into_full_table_panics() {
        let mut table = vec![1u64; 32];
        hash_search_or_insert(&mut table, 5, 2);
    }

    #[test]
    fn test_count_below_excludes_theta_and_zero() {
        let table = [0u64, 10, 20, 30, 0];
        assert_eq!(count_below(&table, 20), 1);
        assert_eq!(count_below(&table, 21), 2);
        assert_eq!(count_below(&table, u64::MAX), 3);
    }

    #[test]
    fn test_hash_array_insert_filters_and_dedups() {
        let src = [0u64, 5, 10, 15, 20, 5];
        let mut dst = vec![0u64; 32];
        let count = hash_array_insert(&src, &mut dst, 5, 16);
        assert_eq!(count, 3);
        assert!(hash_search(&dst, 5, 5));
        assert!(hash_search(&dst, 5, 15));
        assert!(!hash_search(&dst, 5, 20));
    }

    #[test]
    fn test_lg_size_for_count() {
        assert_eq!(lg_size_for_count(0, REBUILD_THRESHOLD), MIN_LG_ARR);
        assert_eq!(lg_size_for_count(30, REBUILD_THRESHOLD), 5);
        assert_eq!(lg_size_for_count(31, REBUILD_THRESHOLD), 6);
        assert_eq!(lg_size_for_count(1000, REBUILD_THRESHOLD), 11);
    }

    #[test]
    fn test_starting_lg_arr_never_below_minimum() {
        // rf = x1 at the minimum nominal size starts at the target size.
        assert_eq!(starting_lg_arr(MIN_LG_NOM, 0), MIN_LG_NOM + 1);
        // rf = x8 backs off three steps but stays at the floor.
        assert_eq!(starting_lg_arr(MIN_LG_NOM, 3), MIN_LG_ARR);
        assert_eq!(starting_lg_arr(12, 3), 10);
        assert_eq!(starting_lg_arr(12, 0), 13);
    }

    #[test]
    fn test_starting_theta() {
        assert_eq!(starting_theta(1.0), MAX_THETA);
        assert_eq!(starting_theta(0.5), (MAX_THETA as f64 * 0.5) as u64);
        assert!(starting_theta(0.001) > 0);
    }
}
