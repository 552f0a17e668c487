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
use crate::error::ErrorKind;
use crate::hash::murmur_hash3_x64_128;

// Iteration cap for the rejection loop. With a power-of-two mask at least
// half of the candidate words land below `n`, so each round fails with
// probability at most 2^-4.
const REJECTION_BUDGET: u32 = 10_000;

const MAX_DOMAIN: u32 = 1 << 30;

/// Returns a deterministic uniform integer in `[0, n)` derived from the
/// 128-bit hash of `data` under `seed`.
///
/// The hash words are masked to the next power of two and rejected until one
/// lands below `n`; when all four words of a hash reject, the two 64-bit
/// words are themselves re-hashed.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidArgument`] if `n < 2` or `n > 2^30`, and
/// [`ErrorKind::BudgetExhausted`] if no candidate lands below `n` within the
/// iteration budget.
///
/// # Examples
///
/// ```
/// use thetasketch::hash::uniform_int;
///
/// let slot = uniform_int(b"item-17", 9001, 100).unwrap();
/// assert!(slot < 100);
/// assert_eq!(slot, uniform_int(b"item-17", 9001, 100).unwrap());
/// ```
pub fn uniform_int(data: &[u8], seed: u64, n: u32) -> Result<u32, Error> {
    if n < 2 {
        return Err(Error::invalid_argument(format!(
            "domain size must be at least 2, got {n}"
        )));
    }
    if n > MAX_DOMAIN {
        return Err(Error::invalid_argument(format!(
            "domain size must be at most 2^30, got {n}"
        )));
    }

    let mask = u64::from(n.next_power_of_two() - 1);
    let (mut h1, mut h2) = murmur_hash3_x64_128(data, seed);
    for _ in 0..REJECTION_BUDGET {
        for word in [h1 & mask, (h1 >> 33) & mask, h2 & mask, (h2 >> 33) & mask] {
            if word < u64::from(n) {
                return Ok(word as u32);
            }
        }
        let mut rehash = [0u8; 16];
        rehash[..8].copy_from_slice(&h1.to_le_bytes());
        rehash[8..].copy_from_slice(&h2.to_le_bytes());
        (h1, h2) = murmur_hash3_x64_128(&rehash, seed);
    }
    Err(Error::new(
        ErrorKind::BudgetExhausted,
        "no hash word landed below the domain size within the rejection budget",
    ))
}
