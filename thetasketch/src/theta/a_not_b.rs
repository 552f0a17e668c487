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
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::REBUILD_THRESHOLD;

/// Returns a compact sketch of the entries of `a` that are absent from `b`.
///
/// A one-shot computation over two snapshots: theta is the minimum of the
/// operands' thetas, and `a`'s admissible entries are probed against a table
/// built from `b`'s.
///
/// # Errors
///
/// Fails when two non-empty operands were built with different seeds.
///
/// # Examples
///
/// ```
/// use thetasketch::theta::UpdateSketch;
/// use thetasketch::theta::a_not_b;
///
/// let mut a = UpdateSketch::builder().build();
/// let mut b = UpdateSketch::builder().build();
/// for i in 0..100i64 {
///     a.update_i64(i);
///     b.update_i64(i + 60);
/// }
///
/// let difference = a_not_b(&a, &b).unwrap();
/// assert_eq!(difference.estimate(), 60.0);
/// ```
pub fn a_not_b<A, B>(a: &A, b: &B) -> Result<CompactThetaSketch, Error>
where
    A: ThetaSketchView,
    B: ThetaSketchView,
{
    if !a.is_empty() && !b.is_empty() && a.seed_hash() != b.seed_hash() {
        return Err(Error::invalid_argument(format!(
            "incompatible seed hash: expected {}, got {}",
            a.seed_hash(),
            b.seed_hash()
        )));
    }
    if a.is_empty() {
        return Ok(CompactThetaSketch::from_parts(
            MAX_THETA,
            Vec::new(),
            a.seed_hash(),
            true,
            true,
        ));
    }

    let theta = a.theta64().min(b.theta64());

    let (b_table, b_lg_arr) = if b.num_retained() == 0 {
        (Vec::new(), 0)
    } else {
        let lg_arr = hash_table::lg_size_for_count(b.num_retained(), REBUILD_THRESHOLD);
        let mut table = vec![0u64; 1 << lg_arr];
        for hash in b.iter() {
            if hash >= theta {
                if b.is_ordered() {
                    break;
                }
                continue;
            }
            hash_table::hash_search_or_insert(&mut table, lg_arr, hash);
        }
        (table, lg_arr)
    };

    let mut entries: Vec<u64> = a
        .iter()
        .filter(|&hash| hash < theta && !hash_table::hash_search(&b_table, b_lg_arr, hash))
        .collect();
    entries.sort_unstable();

    Ok(CompactThetaSketch::from_parts(
        theta,
        entries,
        a.seed_hash(),
        false,
        true,
    ))
}
