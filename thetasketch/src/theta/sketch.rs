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

//! Mutable theta sketches built from a stream of items.
//!
//! [`UpdateSketch`] carries the state shared by the whole update family: the
//! slot array, the moving cutoff theta, the retained count and the sampling
//! configuration. The insert policy is the variant-specific part; the
//! QuickSelect policy lives here, the Alpha policy in the sibling module.

use std::borrow::Cow;

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::common::ResizeFactor;
use crate::common::binomial_bounds;
use crate::common::canonical_double;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::hash::murmur_hash3_x64_128;
use crate::theta::ThetaSketchView;
use crate::theta::alpha::MIN_LG_NOM_ALPHA;
use crate::theta::compact::CompactThetaSketch;
use crate::theta::hash_table;
use crate::theta::hash_table::DEFAULT_LG_NOM;
use crate::theta::hash_table::MAX_LG_NOM;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::MIN_LG_ARR;
use crate::theta::hash_table::MIN_LG_NOM;
use crate::theta::hash_table::REBUILD_THRESHOLD;
use crate::theta::serialization::FLAG_IS_EMPTY;
use crate::theta::serialization::HASH_SIZE_BYTES;
use crate::theta::serialization::PREAMBLE_LONGS_FULL;
use crate::theta::serialization::Preamble;
use crate::theta::serialization::SERIAL_VERSION;

/// Outcome of a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// A new hash was stored and the retained count grew.
    InsertedCountIncremented,
    /// A new hash overwrote an expired entry; the retained count is
    /// unchanged. Only the Alpha sketch produces this.
    InsertedCountNotIncremented,
    /// The exact hash is already stored.
    RejectedDuplicate,
    /// The hash is at or above the admissibility cutoff.
    RejectedOverTheta,
    /// The input carries no data (empty text or byte sequence).
    Ignored,
}

/// The variant-specific half of an update sketch.
#[derive(Debug, Clone)]
pub(crate) enum Variant {
    QuickSelect,
    Alpha { alpha: f64, split1: u64, dirty: bool },
}

/// Mutable theta sketch for building from a stream of items.
///
/// # Examples
///
/// ```
/// use thetasketch::theta::UpdateSketch;
///
/// let mut sketch = UpdateSketch::builder().lg_nom(12).build();
/// for i in 0..1000i64 {
///     sketch.update_i64(i);
/// }
/// assert_eq!(sketch.estimate(), 1000.0);
/// ```
#[derive(Debug, Clone)]
pub struct UpdateSketch {
    pub(crate) lg_nom: u8,
    pub(crate) lg_arr: u8,
    pub(crate) resize_factor: ResizeFactor,
    pub(crate) p: f32,
    pub(crate) seed: u64,
    pub(crate) is_empty: bool,
    pub(crate) theta: u64,
    pub(crate) cur_count: u32,
    pub(crate) table: Vec<u64>,
    pub(crate) variant: Variant,
}

impl UpdateSketch {
    /// Create a new builder for [`UpdateSketch`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use thetasketch::theta::UpdateSketch;
    /// let sketch = UpdateSketch::builder().lg_nom(10).build();
    /// assert_eq!(sketch.lg_nom(), 10);
    /// ```
    pub fn builder() -> UpdateSketchBuilder {
        UpdateSketchBuilder::default()
    }

    fn new(
        lg_nom: u8,
        resize_factor: ResizeFactor,
        p: f32,
        seed: u64,
        variant: Variant,
    ) -> Self {
        let lg_arr = hash_table::starting_lg_arr(lg_nom, resize_factor.lg_value());
        Self {
            lg_nom,
            lg_arr,
            resize_factor,
            p,
            seed,
            is_empty: true,
            theta: hash_table::starting_theta(p),
            cur_count: 0,
            table: vec![0u64; 1 << lg_arr],
            variant,
        }
    }

    /// Updates the sketch with a signed 64-bit integer.
    pub fn update_i64(&mut self, value: i64) -> UpdateResult {
        self.update_data(&value.to_le_bytes())
    }

    /// Updates the sketch with an unsigned 64-bit integer.
    pub fn update_u64(&mut self, value: u64) -> UpdateResult {
        self.update_data(&value.to_le_bytes())
    }

    /// Updates the sketch with a signed 32-bit integer.
    ///
    /// The value is widened, so `update_i32(7)` and `update_i64(7)` count as
    /// the same item.
    pub fn update_i32(&mut self, value: i32) -> UpdateResult {
        self.update_i64(i64::from(value))
    }

    /// Updates the sketch with a double.
    ///
    /// `-0.0` counts as `0.0` and every NaN payload as the one canonical NaN.
    pub fn update_f64(&mut self, value: f64) -> UpdateResult {
        self.update_i64(canonical_double(value))
    }

    /// Updates the sketch with a float, widened to a double.
    pub fn update_f32(&mut self, value: f32) -> UpdateResult {
        self.update_f64(f64::from(value))
    }

    /// Updates the sketch with the UTF-8 bytes of `value`.
    ///
    /// Empty text is ignored.
    pub fn update_str(&mut self, value: &str) -> UpdateResult {
        self.update_data(value.as_bytes())
    }

    /// Updates the sketch with a raw byte sequence.
    ///
    /// An empty sequence is ignored.
    pub fn update_bytes(&mut self, value: &[u8]) -> UpdateResult {
        self.update_data(value)
    }

    fn update_data(&mut self, data: &[u8]) -> UpdateResult {
        if data.is_empty() {
            return UpdateResult::Ignored;
        }
        let (h1, _) = murmur_hash3_x64_128(data, self.seed);
        self.insert_hash(h1 >> 1)
    }

    /// Feeds an already positive hash; also the merge ingestion path.
    pub(crate) fn insert_hash(&mut self, hash: u64) -> UpdateResult {
        self.is_empty = false;
        if hash == 0 || hash >= self.theta {
            return UpdateResult::RejectedOverTheta;
        }
        match self.variant {
            Variant::QuickSelect => self.quick_select_insert(hash),
            Variant::Alpha { .. } => self.alpha_insert(hash),
        }
    }

    fn quick_select_insert(&mut self, hash: u64) -> UpdateResult {
        if !hash_table::hash_search_or_insert(&mut self.table, self.lg_arr, hash) {
            return UpdateResult::RejectedDuplicate;
        }
        self.cur_count += 1;
        if self.cur_count > self.capacity() {
            if self.lg_arr < self.lg_nom + 1 {
                self.resize();
            } else {
                self.quick_select_rebuild();
            }
        }
        UpdateResult::InsertedCountIncremented
    }

    /// Fill threshold of the current table.
    pub(crate) fn capacity(&self) -> u32 {
        let fraction = match self.variant {
            Variant::Alpha { .. } if self.lg_arr <= self.lg_nom => {
                crate::theta::alpha::ALPHA_GROW_THRESHOLD
            }
            _ => REBUILD_THRESHOLD,
        };
        (fraction * self.table.len() as f64) as u32
    }

    /// Grows the table one resize-factor step toward the target size.
    pub(crate) fn resize(&mut self) {
        let new_lg_arr = (self.lg_arr + self.resize_factor.lg_value()).min(self.lg_nom + 1);
        let mut new_table = vec![0u64; 1 << new_lg_arr];
        let count =
            hash_table::hash_array_insert(&self.table, &mut new_table, new_lg_arr, self.theta);
        debug_assert_eq!(count, self.cur_count);
        self.table = new_table;
        self.lg_arr = new_lg_arr;
        self.cur_count = count;
    }

    /// Prunes to k entries: theta becomes the (k+1)-th smallest retained
    /// value and everything at or above it is dropped.
    fn quick_select_rebuild(&mut self) {
        let k = self.nominal_entries();
        let mut scratch: Vec<u64> = self.table.iter().copied().filter(|&v| v != 0).collect();
        let (_, pivot, _) = scratch.select_nth_unstable(k as usize);
        self.theta = *pivot;
        self.table.fill(0);
        self.cur_count =
            hash_table::hash_array_insert(&scratch, &mut self.table, self.lg_arr, self.theta);
        debug_assert_eq!(self.cur_count, k);
    }

    /// Prunes the sketch back to at most k retained entries, lowering theta.
    ///
    /// A no-op when the sketch already retains at most k entries.
    pub fn rebuild(&mut self) {
        if let Variant::Alpha { dirty: true, .. } = self.variant {
            self.rebuild_dirty();
        }
        if self.cur_count > self.nominal_entries() {
            self.quick_select_rebuild();
        }
    }

    /// Resets the sketch to its initial empty state.
    pub fn reset(&mut self) {
        let lg_arr = hash_table::starting_lg_arr(self.lg_nom, self.resize_factor.lg_value());
        if self.table.len() == 1usize << lg_arr {
            self.table.fill(0);
        } else {
            self.table = vec![0u64; 1 << lg_arr];
        }
        self.lg_arr = lg_arr;
        self.cur_count = 0;
        self.theta = hash_table::starting_theta(self.p);
        self.is_empty = true;
        if let Variant::Alpha { dirty, .. } = &mut self.variant {
            *dirty = false;
        }
    }

    /// Returns the cardinality estimate.
    ///
    /// # Examples
    ///
    /// ```
    /// # use thetasketch::theta::UpdateSketch;
    /// let mut sketch = UpdateSketch::builder().build();
    /// sketch.update_str("apple");
    /// sketch.update_str("apple");
    /// assert_eq!(sketch.estimate(), 1.0);
    /// ```
    pub fn estimate(&self) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        let retained = f64::from(self.retained_entries());
        if !self.is_estimation_mode() {
            return retained;
        }
        retained / self.theta()
    }

    /// Returns the approximate lower error bound given the specified number
    /// of standard deviations.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        match self.variant {
            Variant::QuickSelect => {
                binomial_bounds::lower_bound(
                    u64::from(self.retained_entries()),
                    self.theta(),
                    num_std_dev,
                )
            }
            Variant::Alpha { .. } => self.alpha_lower_bound(num_std_dev),
        }
    }

    /// Returns the approximate upper error bound given the specified number
    /// of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        match self.variant {
            Variant::QuickSelect => binomial_bounds::upper_bound(
                u64::from(self.retained_entries()),
                self.theta(),
                num_std_dev,
                self.is_empty,
            ),
            Variant::Alpha { .. } => self.alpha_upper_bound(num_std_dev),
        }
    }

    /// Returns theta as a fraction in `(0.0, 1.0]`.
    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// Returns theta as the raw 64-bit cutoff.
    pub fn theta64(&self) -> u64 {
        self.theta
    }

    /// Returns true iff no admissible update was ever processed.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Returns true iff the estimate is a projection rather than an exact
    /// count.
    pub fn is_estimation_mode(&self) -> bool {
        self.theta < MAX_THETA
    }

    /// Returns the number of stored entries below theta.
    pub fn retained_entries(&self) -> u32 {
        match self.variant {
            Variant::Alpha { dirty: true, .. } => {
                hash_table::count_below(&self.table, self.theta)
            }
            _ => self.cur_count,
        }
    }

    /// Returns the log2 of the configured nominal entry count.
    pub fn lg_nom(&self) -> u8 {
        self.lg_nom
    }

    pub(crate) fn nominal_entries(&self) -> u32 {
        1 << self.lg_nom
    }

    /// Returns the 16-bit tag of this sketch's seed.
    pub fn seed_hash(&self) -> u16 {
        compute_seed_hash(self.seed)
    }

    /// Iterates the retained hash values below theta.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        let theta = self.theta;
        self.table
            .iter()
            .copied()
            .filter(move |&slot| slot != 0 && slot < theta)
    }

    /// Returns an immutable snapshot with ordered entries.
    pub fn compact(&self) -> CompactThetaSketch {
        self.compact_with_ordered(true)
    }

    /// Returns an immutable snapshot, optionally ordering the entries.
    pub fn compact_with_ordered(&self, ordered: bool) -> CompactThetaSketch {
        let mut entries: Vec<u64> = self.iter().collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaSketch::from_parts(self.theta, entries, self.seed_hash(), self.is_empty, ordered)
    }

    fn family(&self) -> &'static Family {
        match self.variant {
            Variant::QuickSelect => &Family::QUICK_SELECT,
            Variant::Alpha { .. } => &Family::ALPHA,
        }
    }

    /// Serializes the sketch in its update (slot array) form.
    ///
    /// The image is a pure function of the logical state: a dirty Alpha
    /// table is cleaned into a fresh array before writing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use thetasketch::theta::UpdateSketch;
    /// let mut sketch = UpdateSketch::builder().build();
    /// sketch.update_str("apple");
    /// let bytes = sketch.serialize();
    /// let restored = UpdateSketch::deserialize(&bytes).unwrap();
    /// assert_eq!(sketch.estimate(), restored.estimate());
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let (table_image, image_count): (Cow<'_, [u64]>, u32) = match self.variant {
            Variant::Alpha { dirty: true, .. } => {
                let mut fresh = vec![0u64; self.table.len()];
                let count =
                    hash_table::hash_array_insert(&self.table, &mut fresh, self.lg_arr, self.theta);
                (Cow::Owned(fresh), count)
            }
            _ => (Cow::Borrowed(&self.table[..]), self.cur_count),
        };

        let mut flags = 0u8;
        if self.is_empty {
            flags |= FLAG_IS_EMPTY;
        }
        let preamble = Preamble {
            preamble_longs: PREAMBLE_LONGS_FULL,
            lg_resize_factor: self.resize_factor.lg_value(),
            serial_version: SERIAL_VERSION,
            family_id: self.family().id,
            lg_nom: self.lg_nom,
            lg_arr: self.lg_arr,
            flags,
            seed_hash: self.seed_hash(),
            cur_count: image_count,
            p: self.p,
            theta: self.theta,
        };

        let mut bytes = SketchBytes::with_capacity(
            PREAMBLE_LONGS_FULL as usize * 8 + table_image.len() * HASH_SIZE_BYTES,
        );
        preamble.write(&mut bytes);
        for &slot in table_image.iter() {
            bytes.write_u64_le(slot);
        }
        bytes.into_bytes()
    }

    /// Deserializes an update sketch written by [`serialize`](Self::serialize),
    /// using the default seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is truncated, corrupted, from a
    /// non-update family, or was built with a different seed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserializes an update sketch with a specific seed.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;

        let is_alpha = preamble.family_id == Family::ALPHA.id;
        let family = if is_alpha {
            &Family::ALPHA
        } else {
            &Family::QUICK_SELECT
        };
        preamble.validate_family(family)?;
        preamble.validate_seed_hash(seed)?;

        let min_lg_nom = if is_alpha { MIN_LG_NOM_ALPHA } else { MIN_LG_NOM };
        if !(min_lg_nom..=MAX_LG_NOM).contains(&preamble.lg_nom) {
            return Err(Error::deserial(format!(
                "lg_nom {} out of range [{}, {}] for family {}",
                preamble.lg_nom, min_lg_nom, MAX_LG_NOM, family.name
            )));
        }
        // The rare forced resize can leave an Alpha table one step past the
        // target size.
        let max_lg_arr = if is_alpha {
            preamble.lg_nom + 2
        } else {
            preamble.lg_nom + 1
        };
        if !(MIN_LG_ARR..=max_lg_arr).contains(&preamble.lg_arr) {
            return Err(Error::deserial(format!(
                "lg_arr {} out of range [{}, {}]",
                preamble.lg_arr, MIN_LG_ARR, max_lg_arr
            )));
        }
        if preamble.lg_arr <= preamble.lg_nom
            && preamble.theta < hash_table::starting_theta(preamble.p)
        {
            return Err(Error::deserial(
                "theta below its initial value before the table reached target size",
            ));
        }

        let arr = 1usize << preamble.lg_arr;
        let mut table = vec![0u64; arr];
        for slot in table.iter_mut() {
            *slot = cursor
                .read_u64_le()
                .map_err(|e| Error::insufficient_data("table slot", e))?;
        }
        let count = hash_table::count_below(&table, preamble.theta);
        if count != preamble.cur_count {
            return Err(Error::deserial(format!(
                "retained count mismatch: preamble says {}, table holds {}",
                preamble.cur_count, count
            )));
        }
        if preamble.is_empty() && count != 0 {
            return Err(Error::deserial("empty sketch with retained entries"));
        }

        let variant = if is_alpha {
            Self::alpha_variant(preamble.lg_nom, preamble.p)
        } else {
            Variant::QuickSelect
        };

        Ok(Self {
            lg_nom: preamble.lg_nom,
            lg_arr: preamble.lg_arr,
            resize_factor: ResizeFactor::from_lg(preamble.lg_resize_factor),
            p: preamble.p,
            seed,
            is_empty: preamble.is_empty(),
            theta: preamble.theta,
            cur_count: count,
            table,
            variant,
        })
    }
}

impl ThetaSketchView for UpdateSketch {
    fn num_retained(&self) -> u32 {
        self.retained_entries()
    }

    fn theta64(&self) -> u64 {
        self.theta
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn seed_hash(&self) -> u16 {
        UpdateSketch::seed_hash(self)
    }

    fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        UpdateSketch::iter(self)
    }
}

/// Builder for [`UpdateSketch`].
#[derive(Debug)]
pub struct UpdateSketchBuilder {
    lg_nom: u8,
    resize_factor: ResizeFactor,
    p: f32,
    seed: u64,
}

impl Default for UpdateSketchBuilder {
    fn default() -> Self {
        Self {
            lg_nom: DEFAULT_LG_NOM,
            resize_factor: ResizeFactor::X8,
            p: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl UpdateSketchBuilder {
    /// Set the log2 of the nominal entry count k.
    pub fn lg_nom(mut self, lg_nom: u8) -> Self {
        self.lg_nom = lg_nom;
        self
    }

    /// Set the resize factor.
    pub fn resize_factor(mut self, factor: ResizeFactor) -> Self {
        self.resize_factor = factor;
        self
    }

    /// Set the sampling probability p.
    ///
    /// # Panics
    ///
    /// Panics if p is not in `(0.0, 1.0]`.
    pub fn sampling_probability(mut self, probability: f32) -> Self {
        assert!(
            probability > 0.0 && probability <= 1.0,
            "sampling probability must be in (0.0, 1.0], got {probability}"
        );
        self.p = probability;
        self
    }

    /// Set the hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds a QuickSelect sketch.
    ///
    /// # Panics
    ///
    /// Panics if `lg_nom` is not in `[4, 26]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use thetasketch::theta::UpdateSketch;
    /// let sketch = UpdateSketch::builder().lg_nom(12).build();
    /// assert!(sketch.is_empty());
    /// ```
    pub fn build(self) -> UpdateSketch {
        assert!(
            (MIN_LG_NOM..=MAX_LG_NOM).contains(&self.lg_nom),
            "lg_nom must be in [{MIN_LG_NOM}, {MAX_LG_NOM}], got {}",
            self.lg_nom
        );
        UpdateSketch::new(
            self.lg_nom,
            self.resize_factor,
            self.p,
            self.seed,
            Variant::QuickSelect,
        )
    }

    /// Builds an Alpha sketch.
    ///
    /// # Panics
    ///
    /// Panics if `lg_nom` is not in `[9, 26]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use thetasketch::theta::UpdateSketch;
    /// let sketch = UpdateSketch::builder().lg_nom(9).build_alpha();
    /// assert!(sketch.is_empty());
    /// ```
    pub fn build_alpha(self) -> UpdateSketch {
        assert!(
            (MIN_LG_NOM_ALPHA..=MAX_LG_NOM).contains(&self.lg_nom),
            "lg_nom must be in [{MIN_LG_NOM_ALPHA}, {MAX_LG_NOM}], got {}",
            self.lg_nom
        );
        let variant = UpdateSketch::alpha_variant(self.lg_nom, self.p);
        UpdateSketch::new(self.lg_nom, self.resize_factor, self.p, self.seed, variant)
    }
}
