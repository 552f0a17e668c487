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

//! Hash primitives for sketches.
//!
//! All sketches key their tables off MurmurHash3 x64-128. The update seed is
//! part of a sketch's identity: two sketches can only be combined when they
//! were built with the same seed, which is verified through a 16-bit seed
//! hash carried in every serialized image.

mod adaptor;

pub use adaptor::uniform_int;

/// The seed used by default for all update sketches.
///
/// Sketches built with different seeds cannot be merged or compared.
pub const DEFAULT_UPDATE_SEED: u64 = 9001;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Computes the MurmurHash3 x64-128 hash of `data` under `seed`.
///
/// The two returned words match the reference implementation; sketches use
/// the first word only, with the top bit cleared by a right shift.
pub fn murmur_hash3_x64_128(data: &[u8], seed: u64) -> (u64, u64) {
    let mut h1 = seed;
    let mut h2 = seed;

    let mut blocks = data.chunks_exact(16);
    for block in blocks.by_ref() {
        let k1 = read_u64_le(&block[..8]);
        let k2 = read_u64_le(&block[8..]);
        h1 ^= mix_k1(k1);
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);
        h2 ^= mix_k2(k2);
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u64;
        for (i, &byte) in tail.iter().take(8).enumerate() {
            k1 |= u64::from(byte) << (8 * i);
        }
        if tail.len() > 8 {
            let mut k2 = 0u64;
            for (i, &byte) in tail[8..].iter().enumerate() {
                k2 |= u64::from(byte) << (8 * i);
            }
            h2 ^= mix_k2(k2);
        }
        h1 ^= mix_k1(k1);
    }

    h1 ^= data.len() as u64;
    h2 ^= data.len() as u64;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    (h1, h2)
}

/// Computes the 16-bit tag of an update seed.
///
/// The tag is the low 16 bits of the hash of the seed's 8-byte little-endian
/// encoding under seed zero. It is stored in serialized images and checked by
/// every operation that combines two sketches.
pub fn compute_seed_hash(seed: u64) -> u16 {
    let (h1, _) = murmur_hash3_x64_128(&seed.to_le_bytes(), 0);
    (h1 & 0xffff) as u16
}

fn mix_k1(mut k1: u64) -> u64 {
    k1 = k1.wrapping_mul(C1);
    k1 = k1.rotate_left(31);
    k1.wrapping_mul(C2)
}

fn mix_k2(mut k2: u64) -> u64 {
    k2 = k2.wrapping_mul(C2);
    k2 = k2.rotate_left(33);
    k2.wrapping_mul(C1)
}

fn fmix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

fn read_u64_le(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(bytes)
}
