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

//! Theta sketches: streaming distinct counting in bounded memory.
//!
//! A theta sketch consumes a stream of items and estimates how many of them
//! are distinct, retaining at most a few multiples of the configured nominal
//! entry count no matter how long the stream runs. Sketches built with the
//! same seed merge through union, intersection and set difference, and
//! serialize to a compact little-endian format.
//!
//! # Examples
//!
//! ```
//! use thetasketch::common::NumStdDev;
//! use thetasketch::theta::UpdateSketch;
//!
//! let mut sketch = UpdateSketch::builder().lg_nom(12).build();
//! for i in 0..100_000i64 {
//!     sketch.update_i64(i);
//! }
//!
//! let estimate = sketch.estimate();
//! assert!(sketch.lower_bound(NumStdDev::Two) <= estimate);
//! assert!(estimate <= sketch.upper_bound(NumStdDev::Two));
//! ```

mod codec;

pub mod common;
pub mod error;
pub mod hash;
pub mod theta;
