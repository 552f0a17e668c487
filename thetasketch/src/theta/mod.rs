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

//! Theta sketches for streaming distinct counting.
//!
//! A theta sketch retains a uniform sample of the hashed input below a
//! moving cutoff theta; the estimate is the retained count divided by theta
//! as a fraction. Two update policies are provided behind one contract: the
//! space-tuned QuickSelect sketch and the variance-tuned Alpha sketch (see
//! [`UpdateSketch`]). Snapshots compact to [`CompactThetaSketch`], and
//! [`ThetaUnion`], [`ThetaIntersection`] and [`a_not_b`] merge snapshots
//! built with the same seed.

mod a_not_b;
mod alpha;
mod compact;
pub(crate) mod hash_table;
mod intersection;
mod serialization;
mod sketch;
mod union;

pub use a_not_b::a_not_b;
pub use compact::CompactThetaSketch;
pub use intersection::ThetaIntersection;
pub use sketch::UpdateResult;
pub use sketch::UpdateSketch;
pub use sketch::UpdateSketchBuilder;
pub use union::ThetaUnion;
pub use union::ThetaUnionBuilder;

/// Read surface shared by update and compact sketches.
///
/// Set operations consume any implementor, so unions and intersections mix
/// mutable sketches and deserialized snapshots freely.
pub trait ThetaSketchView {
    /// Returns the number of retained entries below theta.
    fn num_retained(&self) -> u32;

    /// Returns theta as the raw 64-bit cutoff.
    fn theta64(&self) -> u64;

    /// Returns true iff the source never processed an admissible update.
    fn is_empty(&self) -> bool;

    /// Returns true iff [`iter`](Self::iter) yields hashes in ascending
    /// order.
    fn is_ordered(&self) -> bool;

    /// Returns the 16-bit tag of the hash seed, for mismatch detection.
    fn seed_hash(&self) -> u16;

    /// Iterates the retained hash values.
    fn iter(&self) -> impl Iterator<Item = u64> + '_;
}
