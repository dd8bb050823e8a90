// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::store::io::{DataOutput, IndexOutput};
use crate::error::{ErrorKind, Result};

use std::io::{self, Write};

use flate2::Crc;

/// A memory-resident `IndexOutput`, reused as a scratch sink: filled,
/// flushed to another output with `write_to`, then `reset`.
pub struct RAMOutputStream {
    name: String,
    buffer: Vec<u8>,
    crc: Option<Crc>,
}

impl RAMOutputStream {
    pub fn new(checksum: bool) -> Self {
        let crc = if checksum { Some(Crc::new()) } else { None };
        RAMOutputStream {
            name: "noname".into(),
            buffer: vec![],
            crc,
        }
    }

    pub fn write_to(&self, out: &mut impl DataOutput) -> Result<()> {
        out.write_bytes(&self.buffer, 0, self.buffer.len())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        if let Some(ref mut crc) = self.crc {
            crc.reset();
        }
    }
}

impl Write for RAMOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if let Some(ref mut crc) = self.crc {
            crc.update(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMOutputStream {}

impl IndexOutput for RAMOutputStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.buffer.len() as i64
    }

    fn checksum(&self) -> Result<i64> {
        if let Some(ref crc) = self.crc {
            Ok((crc.sum() as i64) & 0xffff_ffffi64)
        } else {
            bail!(ErrorKind::IllegalState(
                "internal RAMOutputStream created with checksum disabled".into()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_to_and_reset() {
        let mut scratch = RAMOutputStream::new(false);
        scratch.write_vint(5).unwrap();
        scratch.write_bytes(b"hello", 0, 5).unwrap();
        assert_eq!(scratch.file_pointer(), 6);

        let mut out: Vec<u8> = vec![];
        scratch.write_to(&mut out).unwrap();
        assert_eq!(out, b"\x05hello");

        scratch.reset();
        assert_eq!(scratch.file_pointer(), 0);
        assert!(scratch.bytes().is_empty());
    }

    #[test]
    fn test_checksum_disabled() {
        let scratch = RAMOutputStream::new(false);
        assert!(scratch.checksum().is_err());
    }
}
