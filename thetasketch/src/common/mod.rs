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

//! Shared support types for sketches.

pub mod binomial_bounds;

/// The number of standard deviations for confidence bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumStdDev {
    /// One standard deviation, roughly 68% confidence.
    One,
    /// Two standard deviations, roughly 95% confidence.
    Two,
    /// Three standard deviations, roughly 99.7% confidence.
    Three,
}

impl NumStdDev {
    /// Returns the number of standard deviations as an integer.
    pub fn as_u8(self) -> u8 {
        match self {
            NumStdDev::One => 1,
            NumStdDev::Two => 2,
            NumStdDev::Three => 3,
        }
    }
}

/// The factor by which a sketch hash table grows when it fills up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFactor {
    /// No growth; the table starts at its target size.
    X1,
    /// Double on each resize.
    X2,
    /// Quadruple on each resize.
    X4,
    /// Grow eightfold on each resize.
    X8,
}

impl ResizeFactor {
    /// Returns the log2 of the growth factor.
    pub fn lg_value(self) -> u8 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }

    /// Decodes the 2-bit serialized form.
    pub(crate) fn from_lg(lg: u8) -> Self {
        match lg & 0x3 {
            0 => ResizeFactor::X1,
            1 => ResizeFactor::X2,
            2 => ResizeFactor::X4,
            _ => ResizeFactor::X8,
        }
    }
}

/// Canonicalizes a double so that equal values hash identically.
///
/// `-0.0` folds to `+0.0` and every NaN maps to the single canonical NaN bit
/// pattern, so all NaN payloads count as one distinct item.
pub fn canonical_double(value: f64) -> i64 {
    if value.is_nan() {
        // The canonical quiet NaN, as produced by Java's Double.doubleToLongBits().
        0x7ff8000000000000i64
    } else {
        // -0.0 + 0.0 == +0.0 under IEEE754 roundTiesToEven rounding mode,
        // which Rust guarantees. Thus, by adding a positive zero we
        // canonicalize signed zero without any branches in one instruction.
        (value + 0.0).to_bits() as i64
    }
}
