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

use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::REBUILD_THRESHOLD;

/// Stateful intersection operator for theta sketches.
///
/// The intersection starts from the notional universe set; every update
/// narrows the candidate set to the entries present in all inputs so far.
/// Before the first [`update`](Self::update) the result is undefined; use
/// [`has_result`](Self::has_result) to check.
///
/// # Examples
///
/// ```
/// use thetasketch::theta::ThetaIntersection;
/// use thetasketch::theta::UpdateSketch;
///
/// let mut a = UpdateSketch::builder().build();
/// let mut b = UpdateSketch::builder().build();
/// for i in 0..100i64 {
///     a.update_i64(i);
///     b.update_i64(i + 60);
/// }
///
/// let mut intersection = ThetaIntersection::new_with_default_seed();
/// intersection.update(&a).unwrap();
/// intersection.update(&b).unwrap();
/// assert_eq!(intersection.result().estimate(), 40.0);
/// ```
#[derive(Debug)]
pub struct ThetaIntersection {
    seed_hash: u16,
    is_valid: bool,
    is_empty: bool,
    theta: u64,
    lg_arr: u8,
    table: Vec<u64>,
    cur_count: u32,
}

impl ThetaIntersection {
    /// Creates a new intersection operator for the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed_hash: compute_seed_hash(seed),
            is_valid: false,
            is_empty: false,
            theta: MAX_THETA,
            lg_arr: 0,
            table: Vec::new(),
            cur_count: 0,
        }
    }

    /// Creates a new intersection operator with the default seed.
    pub fn new_with_default_seed() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }

    /// Narrows the intersection with a given sketch.
    ///
    /// # Errors
    ///
    /// Fails without mutating the state when a non-empty input was built
    /// with a different seed.
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        if !sketch.is_empty() && sketch.seed_hash() != self.seed_hash {
            return Err(Error::invalid_argument(format!(
                "incompatible seed hash: expected {}, got {}",
                self.seed_hash,
                sketch.seed_hash()
            )));
        }

        // An empty operand empties the intersection for good.
        self.is_empty = self.is_empty || sketch.is_empty();
        if self.is_empty {
            self.is_valid = true;
            self.theta = MAX_THETA;
            self.clear_candidates();
            return Ok(());
        }
        self.theta = self.theta.min(sketch.theta64());

        if !self.is_valid {
            self.is_valid = true;
            let seeds: Vec<u64> = sketch.iter().filter(|&hash| hash < self.theta).collect();
            self.rebuild_candidates(seeds);
            return Ok(());
        }

        if self.cur_count == 0 {
            // Candidates already drained; only theta keeps shrinking.
            return Ok(());
        }

        let mut matched = Vec::with_capacity(self.cur_count.min(sketch.num_retained()) as usize);
        for hash in sketch.iter() {
            if hash >= self.theta {
                if sketch.is_ordered() {
                    break;
                }
                continue;
            }
            if hash_table::hash_search(&self.table, self.lg_arr, hash) {
                matched.push(hash);
            }
        }
        if matched.is_empty() && self.theta == MAX_THETA {
            // Exact operands with nothing in common: provably empty.
            self.is_empty = true;
        }
        self.rebuild_candidates(matched);
        Ok(())
    }

    /// Returns whether this operator has received at least one update.
    pub fn has_result(&self) -> bool {
        self.is_valid
    }

    /// Returns the intersection as a compact sketch with ordered entries.
    ///
    /// # Panics
    ///
    /// Panics if called before the first [`update`](Self::update).
    pub fn result(&self) -> CompactThetaSketch {
        self.result_with_ordered(true)
    }

    /// Returns the intersection as a compact sketch.
    ///
    /// # Panics
    ///
    /// Panics if called before the first [`update`](Self::update).
    pub fn result_with_ordered(&self, ordered: bool) -> CompactThetaSketch {
        assert!(
            self.is_valid,
            "ThetaIntersection::result() called before first update()"
        );
        let mut entries: Vec<u64> = self.table.iter().copied().filter(|&slot| slot != 0).collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaSketch::from_parts(self.theta, entries, self.seed_hash, self.is_empty, ordered)
    }

    fn clear_candidates(&mut self) {
        self.table = Vec::new();
        self.lg_arr = 0;
        self.cur_count = 0;
    }

    fn rebuild_candidates(&mut self, entries: Vec<u64>) {
        if entries.is_empty() {
            self.clear_candidates();
            return;
        }
        let lg_arr = hash_table::lg_size_for_count(entries.len() as u32, REBUILD_THRESHOLD);
        let mut table = vec![0u64; 1 << lg_arr];
        let mut count = 0;
        for hash in entries {
            if hash_table::hash_search_or_insert(&mut table, lg_arr, hash) {
                count += 1;
            }
        }
        self.table = table;
        self.lg_arr = lg_arr;
        self.cur_count = count;
    }
}
