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

//! Internal byte-level plumbing for the serialized sketch formats.
//!
//! The theta formats are little-endian throughout.

mod family;

pub(crate) use family::Family;

use std::io;
use std::io::Cursor;

use byteorder::LE;
use byteorder::ReadBytesExt;

/// A growable byte buffer with typed little-endian writers.
pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    pub fn write_u16_le(&mut self, n: u16) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_f32_le(&mut self, n: f32) {
        self.write(&n.to_le_bytes());
    }
}

/// A cursor over a serialized image with typed little-endian readers.
pub(crate) struct SketchSlice<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    pub fn new(slice: &[u8]) -> SketchSlice<'_> {
        SketchSlice {
            cursor: Cursor::new(slice),
        }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.cursor.read_u8()
    }

    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        self.cursor.read_u16::<LE>()
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.cursor.read_u32::<LE>()
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        self.cursor.read_u64::<LE>()
    }

    pub fn read_f32_le(&mut self) -> io::Result<f32> {
        self.cursor.read_f32::<LE>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_round_trip() {
        let mut bytes = SketchBytes::with_capacity(32);
        bytes.write_u8(0x7f);
        bytes.write_u16_le(0xbeef);
        bytes.write_u32_le(0xdead_beef);
        bytes.write_u64_le(0x0123_4567_89ab_cdef);
        bytes.write_f32_le(0.5);
        let buf = bytes.into_bytes();

        let mut cursor = SketchSlice::new(&buf);
        assert_eq!(cursor.read_u8().unwrap(), 0x7f);
        assert_eq!(cursor.read_u16_le().unwrap(), 0xbeef);
        assert_eq!(cursor.read_u32_le().unwrap(), 0xdead_beef);
        assert_eq!(cursor.read_u64_le().unwrap(), 0x0123_4567_89ab_cdef);
        assert_eq!(cursor.read_f32_le().unwrap(), 0.5);
        assert!(cursor.read_u8().is_err());
    }
}
