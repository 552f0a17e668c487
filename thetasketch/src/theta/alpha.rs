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

//! Alpha update sketch internals.
//!
//! The Alpha sketch trades the QuickSelect sketch's batch pruning for a
//! geometric theta decrement: once the first k+1 inserts are in, theta is
//! multiplied by `alpha = k/(k+1)` on every successful insert, which expires
//! one stored entry on average. Expired entries stay in the table until the
//! next insert overwrites one in place or a cleanup rehash sweeps them out;
//! while any remain the table is "dirty" and a cell at or above theta is a
//! tombstone.

use crate::common::NumStdDev;
use crate::theta::hash_table;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::sketch::UpdateResult;
use crate::theta::sketch::UpdateSketch;
use crate::theta::sketch::Variant;

/// Minimum log2 of nominal entries for the Alpha sketch.
pub(crate) const MIN_LG_NOM_ALPHA: u8 = 9;

/// Fill fraction during the Alpha growth phase.
pub(crate) const ALPHA_GROW_THRESHOLD: f64 = 0.5;

impl UpdateSketch {
    pub(crate) fn alpha_variant(lg_nom: u8, p: f32) -> Variant {
        let k = (1u64 << lg_nom) as f64;
        let alpha = k / (k + 1.0);
        let split1 = (f64::from(p) * (alpha + 1.0) / 2.0 * MAX_THETA as f64) as u64;
        Variant::Alpha {
            alpha,
            split1,
            dirty: false,
        }
    }

    fn alpha_params(&self) -> (f64, u64, bool) {
        match self.variant {
            Variant::Alpha {
                alpha,
                split1,
                dirty,
            } => (alpha, split1, dirty),
            Variant::QuickSelect => unreachable!("alpha path on a QuickSelect sketch"),
        }
    }

    /// Expires one stored entry on average and marks the table dirty.
    fn decrement_theta(&mut self, alpha: f64) {
        self.theta = (self.theta as f64 * alpha) as u64;
        if let Variant::Alpha { dirty, .. } = &mut self.variant {
            *dirty = true;
        }
    }

    pub(crate) fn alpha_insert(&mut self, hash: u64) -> UpdateResult {
        let (alpha, split1, dirty) = self.alpha_params();
        if dirty {
            return self.alpha_dirty_insert(hash, alpha);
        }

        if !hash_table::hash_search_or_insert(&mut self.table, self.lg_arr, hash) {
            return UpdateResult::RejectedDuplicate;
        }
        self.cur_count += 1;
        if self.theta <= split1 || self.cur_count > self.nominal_entries() {
            // In sketch mode (or entering it on the (k+1)-th admitted
            // insert), growth stops and theta starts moving.
            self.decrement_theta(alpha);
        } else if self.cur_count > self.capacity() {
            self.resize();
        }
        UpdateResult::InsertedCountIncremented
    }

    /// Insert into a table that may hold tombstones.
    ///
    /// Phase A probes for a duplicate, an empty slot or the first tombstone.
    /// A tombstone cannot be overwritten on sight: a duplicate of the new
    /// hash may live further along the probe sequence, so phase B keeps
    /// walking until a duplicate or an empty slot settles the question.
    fn alpha_dirty_insert(&mut self, hash: u64, alpha: f64) -> UpdateResult {
        let mask = self.table.len() - 1;
        let stride = hash_table::stride(hash, self.lg_arr);
        let mut probe = (hash as usize) & mask;

        let tombstone = loop {
            let slot = self.table[probe];
            if slot == hash {
                return UpdateResult::RejectedDuplicate;
            }
            if slot == 0 {
                self.table[probe] = hash;
                self.cur_count += 1;
                self.decrement_theta(alpha);
                if self.cur_count > self.capacity() {
                    self.rebuild_dirty();
                }
                return UpdateResult::InsertedCountIncremented;
            }
            if slot >= self.theta {
                break probe;
            }
            probe = (probe + stride) & mask;
        };

        probe = (probe + stride) & mask;
        loop {
            let slot = self.table[probe];
            if slot == hash {
                return UpdateResult::RejectedDuplicate;
            }
            if slot == 0 {
                break;
            }
            probe = (probe + stride) & mask;
        }
        self.table[tombstone] = hash;
        self.decrement_theta(alpha);
        UpdateResult::InsertedCountNotIncremented
    }

    /// Sweeps tombstones by rehashing the live entries into a fresh table.
    ///
    /// When the sweep removes nothing the table really is crowded with live
    /// entries, and the only way out is a doubling (very rare).
    pub(crate) fn rebuild_dirty(&mut self) {
        let mut fresh = vec![0u64; self.table.len()];
        let count = hash_table::hash_array_insert(&self.table, &mut fresh, self.lg_arr, self.theta);
        if count > self.capacity() {
            let new_lg_arr = self.lg_arr + 1;
            let mut bigger = vec![0u64; 1usize << new_lg_arr];
            self.cur_count =
                hash_table::hash_array_insert(&self.table, &mut bigger, new_lg_arr, self.theta);
            self.table = bigger;
            self.lg_arr = new_lg_arr;
        } else {
            self.table = fresh;
            self.cur_count = count;
        }
        if let Variant::Alpha { dirty, .. } = &mut self.variant {
            *dirty = false;
        }
    }

    pub(crate) fn alpha_lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if !self.is_estimation_mode() {
            return f64::from(self.retained_entries());
        }
        let spread = f64::from(num_std_dev.as_u8()) * self.alpha_variance().sqrt();
        (self.estimate() - spread).max(0.0)
    }

    pub(crate) fn alpha_upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if !self.is_estimation_mode() {
            return f64::from(self.retained_entries());
        }
        let spread = f64::from(num_std_dev.as_u8()) * self.alpha_variance().sqrt();
        self.estimate() + spread
    }

    /// Estimator variance for the current phase of the sketch.
    ///
    /// Three phases, told apart by where theta sits against `split1`: pure
    /// sampling (theta above `split1`), the first decrement window, and the
    /// steady state thereafter.
    pub(crate) fn alpha_variance(&self) -> f64 {
        let (alpha, split1, _) = self.alpha_params();
        let k = f64::from(self.nominal_entries());
        let p = f64::from(self.p);
        let y = 1.0 / p;
        let theta_hat = self.theta();
        let tail = (1.0 - theta_hat) / (theta_hat * theta_hat);

        if self.theta > split1 {
            return f64::from(self.retained_entries()) * (y * y - y) + tail;
        }
        let alpha_split = (split1 as f64 * alpha) as u64;
        if self.theta > alpha_split {
            return (k + 1.0) * (y * y - y) + tail;
        }
        let b = 1.0 / alpha;
        let x = p / theta_hat;
        (k + 1.0) * (y * y - y)
            + (y / (1.0 - b * b)) * (y * b * b - y * x * x - b - b * b + x + x * b)
            + tail
    }
}
