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

use thetasketch::theta::CompactThetaSketch;
use thetasketch::theta::UpdateSketch;

const FLAG_IS_EMPTY: u8 = 1 << 2;
const FLAG_IS_COMPACT: u8 = 1 << 3;
const FLAG_IS_ORDERED: u8 = 1 << 4;

fn estimating_sketch() -> UpdateSketch {
    let mut sketch = UpdateSketch::builder().lg_nom(5).build();
    for i in 0..1000i64 {
        sketch.update_i64(i);
    }
    assert!(sketch.is_estimation_mode());
    sketch
}

#[test]
fn test_compact_empty_layout() {
    let sketch = UpdateSketch::builder().lg_nom(12).build();
    let bytes = sketch.compact().serialize();

    assert_eq!(bytes.len(), 8, "empty compact sketch is one preamble long");
    assert_eq!(bytes[0] & 0x3F, 1, "preamble longs");
    assert_eq!(bytes[1], 3, "serial version");
    assert_eq!(bytes[2], 3, "compact family id");
    assert_ne!(bytes[5] & FLAG_IS_EMPTY, 0);
    assert_ne!(bytes[5] & FLAG_IS_COMPACT, 0);
    assert_ne!(bytes[5] & FLAG_IS_ORDERED, 0);

    let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.estimate(), 0.0);
}

#[test]
fn test_compact_round_trip_is_byte_identical() {
    let sketch = estimating_sketch();
    let compact = sketch.compact();
    let bytes = compact.serialize();
    assert_eq!(bytes[0] & 0x3F, 3);
    assert_eq!(
        bytes.len(),
        24 + 8 * compact.num_retained() as usize
    );

    let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.estimate(), compact.estimate());
    assert_eq!(restored.theta64(), compact.theta64());
    assert_eq!(restored.num_retained(), compact.num_retained());
    assert!(restored.is_ordered());
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_compact_single_item_form() {
    let mut sketch = UpdateSketch::builder().build();
    sketch.update_str("only");
    let bytes = sketch.compact().serialize();

    assert_eq!(bytes.len(), 24, "two preamble longs plus one entry");
    assert_eq!(bytes[0] & 0x3F, 2);

    let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.num_retained(), 1);
    assert_eq!(restored.estimate(), 1.0);
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_update_form_round_trip_is_byte_identical() {
    let sketch = estimating_sketch();
    let bytes = sketch.serialize();

    assert_eq!(bytes[0] & 0x3F, 3);
    assert_eq!(bytes[0] >> 6, 3, "resize factor x8");
    assert_eq!(bytes[2], 2, "quick select family id");
    assert_eq!(bytes.len(), 24 + 8 * 64, "preamble plus the 64-slot table");

    let restored = UpdateSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.estimate(), sketch.estimate());
    assert_eq!(restored.theta64(), sketch.theta64());
    assert_eq!(restored.retained_entries(), sketch.retained_entries());
    assert_eq!(restored.lg_nom(), sketch.lg_nom());
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_update_form_empty_round_trip() {
    let sketch = UpdateSketch::builder().lg_nom(5).build();
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), 24 + 8 * 32);
    assert_ne!(bytes[5] & FLAG_IS_EMPTY, 0);

    let restored = UpdateSketch::deserialize(&bytes).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.estimate(), 0.0);
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_restored_update_sketch_keeps_updating() {
    let mut sketch = UpdateSketch::builder().lg_nom(12).build();
    for i in 0..500i64 {
        sketch.update_i64(i);
    }
    let mut restored = UpdateSketch::deserialize(&sketch.serialize()).unwrap();
    for i in 500..1000i64 {
        sketch.update_i64(i);
        restored.update_i64(i);
    }
    assert_eq!(sketch.estimate(), restored.estimate());
    assert_eq!(sketch.serialize(), restored.serialize());
}

#[test]
fn test_alpha_family_round_trips_through_update_form() {
    let mut sketch = UpdateSketch::builder().lg_nom(9).build_alpha();
    for i in 0..3000i64 {
        sketch.update_i64(i);
    }
    let bytes = sketch.serialize();
    assert_eq!(bytes[2], 1, "alpha family id");

    let restored = UpdateSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.estimate(), sketch.estimate());
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_sampling_probability_round_trips() {
    let mut sketch = UpdateSketch::builder()
        .lg_nom(10)
        .sampling_probability(0.5)
        .build();
    for i in 0..200i64 {
        sketch.update_i64(i);
    }
    let restored = UpdateSketch::deserialize(&sketch.serialize()).unwrap();
    assert_eq!(restored.theta64(), sketch.theta64());
    assert_eq!(restored.estimate(), sketch.estimate());
    assert!(restored.is_estimation_mode());
}

#[test]
fn test_custom_seed_round_trip_and_mismatch() {
    let mut sketch = UpdateSketch::builder().seed(42).build();
    sketch.update_str("x");

    let update_bytes = sketch.serialize();
    assert!(UpdateSketch::deserialize_with_seed(&update_bytes, 42).is_ok());
    assert!(UpdateSketch::deserialize(&update_bytes).is_err());

    let compact_bytes = sketch.compact().serialize();
    assert!(CompactThetaSketch::deserialize_with_seed(&compact_bytes, 42).is_ok());
    assert!(CompactThetaSketch::deserialize(&compact_bytes).is_err());
}

#[test]
fn test_update_rejects_compact_image_and_vice_versa() {
    let sketch = estimating_sketch();
    assert!(UpdateSketch::deserialize(&sketch.compact().serialize()).is_err());
    assert!(CompactThetaSketch::deserialize(&sketch.serialize()).is_err());
}

#[test]
fn test_rejects_unsupported_serial_version() {
    let sketch = estimating_sketch();
    let mut bytes = sketch.serialize();
    bytes[1] = 2;
    assert!(UpdateSketch::deserialize(&bytes).is_err());
}

#[test]
fn test_rejects_truncated_image() {
    let sketch = estimating_sketch();
    let bytes = sketch.serialize();
    for len in [0, 7, 23, bytes.len() - 8, bytes.len() - 1] {
        assert!(UpdateSketch::deserialize(&bytes[..len]).is_err());
    }
}

#[test]
fn test_rejects_count_mismatch() {
    let sketch = estimating_sketch();
    let mut bytes = sketch.serialize();
    let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    bytes[8..12].copy_from_slice(&(count + 1).to_le_bytes());
    assert!(UpdateSketch::deserialize(&bytes).is_err());
}

#[test]
fn test_rejects_theta_below_start_while_growing() {
    // A lowered theta is only legitimate once the table reached its target
    // size; claiming otherwise is a corrupt image.
    let sketch = estimating_sketch();
    let mut bytes = sketch.serialize();
    assert_eq!(bytes[3], 5, "lg_nom");
    assert_eq!(bytes[4], 6, "lg_arr");
    bytes[3] = 6; // now lg_arr <= lg_nom with theta below its start
    assert!(UpdateSketch::deserialize(&bytes).is_err());
}

#[test]
fn test_rejects_empty_flag_with_entries() {
    let sketch = estimating_sketch();
    let mut bytes = sketch.serialize();
    bytes[5] |= FLAG_IS_EMPTY;
    assert!(UpdateSketch::deserialize(&bytes).is_err());
}

#[test]
fn test_compact_of_alpha_matches_source_estimate() {
    let mut sketch = UpdateSketch::builder().lg_nom(9).build_alpha();
    for i in 0..5000i64 {
        sketch.update_i64(i);
    }
    let compact = sketch.compact();
    assert_eq!(compact.estimate(), sketch.estimate());
    assert_eq!(compact.num_retained(), sketch.retained_entries());

    let restored = CompactThetaSketch::deserialize(&compact.serialize()).unwrap();
    assert_eq!(restored.estimate(), sketch.estimate());
}
