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
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::UpdateSketch;
use crate::theta::hash_table::DEFAULT_LG_NOM;
use crate::theta::hash_table::MAX_LG_NOM;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::MIN_LG_NOM;

/// Stateful union operator for theta sketches.
///
/// Input hashes feed an internal QuickSelect sketch (the "gadget") while the
/// union's theta tracks the minimum over every input's theta. When merging
/// two sketches, size the gadget with the larger of the two `lg_nom`s to
/// avoid losing accuracy.
///
/// # Examples
///
/// ```
/// use thetasketch::theta::ThetaUnion;
/// use thetasketch::theta::UpdateSketch;
///
/// let mut a = UpdateSketch::builder().build();
/// let mut b = UpdateSketch::builder().build();
/// for i in 0..100i64 {
///     a.update_i64(i);
///     b.update_i64(i + 50);
/// }
///
/// let mut union = ThetaUnion::builder().build();
/// union.update(&a).unwrap();
/// union.update(&b).unwrap();
/// assert_eq!(union.result().estimate(), 150.0);
/// ```
#[derive(Debug)]
pub struct ThetaUnion {
    gadget: UpdateSketch,
    union_theta: u64,
    is_empty: bool,
}

impl ThetaUnion {
    /// Creates a new builder for [`ThetaUnion`].
    pub fn builder() -> ThetaUnionBuilder {
        ThetaUnionBuilder::default()
    }

    /// Folds a sketch into the union.
    ///
    /// # Errors
    ///
    /// Fails without mutating the union when a non-empty input was built
    /// with a different seed.
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        if sketch.is_empty() {
            return Ok(());
        }
        if sketch.seed_hash() != self.gadget.seed_hash() {
            return Err(Error::invalid_argument(format!(
                "incompatible seed hash: expected {}, got {}",
                self.gadget.seed_hash(),
                sketch.seed_hash()
            )));
        }
        self.is_empty = false;
        self.union_theta = self.union_theta.min(sketch.theta64());
        for hash in sketch.iter() {
            if hash >= self.union_theta {
                if sketch.is_ordered() {
                    break;
                }
                continue;
            }
            self.gadget.insert_hash(hash);
        }
        Ok(())
    }

    /// Returns the union as a compact sketch with ordered entries.
    pub fn result(&self) -> CompactThetaSketch {
        let theta = self.union_theta.min(self.gadget.theta64());
        let mut entries: Vec<u64> = self.gadget.iter().filter(|&hash| hash < theta).collect();
        entries.sort_unstable();
        let theta = if self.is_empty { MAX_THETA } else { theta };
        CompactThetaSketch::from_parts(
            theta,
            entries,
            self.gadget.seed_hash(),
            self.is_empty,
            true,
        )
    }

    /// Returns the union to its initial empty state.
    pub fn reset(&mut self) {
        self.gadget.reset();
        self.union_theta = MAX_THETA;
        self.is_empty = true;
    }
}

/// Builder for [`ThetaUnion`].
#[derive(Debug)]
pub struct ThetaUnionBuilder {
    lg_nom: u8,
    seed: u64,
}

impl Default for ThetaUnionBuilder {
    fn default() -> Self {
        Self {
            lg_nom: DEFAULT_LG_NOM,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaUnionBuilder {
    /// Set the log2 of the gadget's nominal entry count.
    pub fn lg_nom(mut self, lg_nom: u8) -> Self {
        self.lg_nom = lg_nom;
        self
    }

    /// Set the hash seed the inputs must share.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the union operator.
    ///
    /// # Panics
    ///
    /// Panics if `lg_nom` is not in `[4, 26]`.
    pub fn build(self) -> ThetaUnion {
        assert!(
            (MIN_LG_NOM..=MAX_LG_NOM).contains(&self.lg_nom),
            "lg_nom must be in [{MIN_LG_NOM}, {MAX_LG_NOM}], got {}",
            self.lg_nom
        );
        ThetaUnion {
            gadget: UpdateSketch::builder()
                .lg_nom(self.lg_nom)
                .seed(self.seed)
                .build(),
            union_theta: MAX_THETA,
            is_empty: true,
        }
    }
}
