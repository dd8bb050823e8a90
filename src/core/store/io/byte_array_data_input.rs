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

use crate::core::store::io::DataInput;
use crate::error::Result;

use std::cmp::min;
use std::io::{self, Read};

/// `DataInput` backed by a byte array, with a settable read position.
pub struct ByteArrayDataInput<T: AsRef<[u8]>> {
    bytes: T,
    pos: usize,
}

impl<T: AsRef<[u8]>> ByteArrayDataInput<T> {
    pub fn new(bytes: T) -> ByteArrayDataInput<T> {
        ByteArrayDataInput { bytes, pos: 0usize }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn length(&self) -> usize {
        self.bytes.as_ref().len()
    }

    pub fn eof(&self) -> bool {
        self.pos == self.length()
    }
}

impl<T: AsRef<[u8]>> Read for ByteArrayDataInput<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = self.bytes.as_ref();
        let len = min(buf.len(), bytes.len() - self.pos);
        buf[..len].copy_from_slice(&bytes[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

impl<T: AsRef<[u8]>> DataInput for ByteArrayDataInput<T> {
    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.pos += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positioning() {
        let bytes = vec![1u8, 2, 3, 4];
        let mut input = ByteArrayDataInput::new(&bytes[..]);
        assert_eq!(input.read_byte().unwrap(), 1);
        input.set_position(3);
        assert_eq!(input.read_byte().unwrap(), 4);
        assert!(input.eof());
        assert!(input.read_byte().is_err());
    }
}
