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

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::ErrorKind::{IllegalState, UnexpectedEOF};
use crate::error::Result;

use std::io::Read;

/// Trait for reading the low-level data types written by `DataOutput`.
pub trait DataInput: Read {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        if self.read(&mut buffer)? != 1 {
            bail!(UnexpectedEOF(
                "Reached EOF when a single byte is expected".to_owned()
            ))
        } else {
            Ok(buffer[0])
        }
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, length: usize) -> Result<()> {
        if self
            .read_exact(&mut b[offset..offset + length])
            .is_err()
        {
            bail!(UnexpectedEOF(format!(
                "Reached EOF when {} bytes are expected",
                length
            )))
        }
        Ok(())
    }

    fn read_int(&mut self) -> Result<i32> {
        Ok(ReadBytesExt::read_i32::<BigEndian>(self)?)
    }

    fn read_long(&mut self) -> Result<i64> {
        Ok(ReadBytesExt::read_i64::<BigEndian>(self)?)
    }

    fn read_vint(&mut self) -> Result<i32> {
        let mut b = self.read_byte()?;
        let mut i = i32::from(b & 0x7f);
        let mut shift = 7;
        while (b & 0x80) != 0 {
            if shift > 28 {
                bail!(IllegalState("Invalid vInt detected".to_owned()));
            }
            b = self.read_byte()?;
            i |= i32::from(b & 0x7f) << shift;
            shift += 7;
        }
        Ok(i)
    }

    fn read_vlong(&mut self) -> Result<i64> {
        let mut b = self.read_byte()?;
        let mut i = i64::from(b & 0x7f);
        let mut shift = 7;
        while (b & 0x80) != 0 {
            if shift > 56 {
                bail!(IllegalState("Invalid vLong detected".to_owned()));
            }
            b = self.read_byte()?;
            i |= i64::from(b & 0x7f) << shift;
            shift += 7;
        }
        Ok(i)
    }

    fn read_string(&mut self) -> Result<String> {
        let length = self.read_vint()?;
        if length < 0 {
            bail!(IllegalState("Invalid String detected".to_owned()));
        }
        let mut buffer = vec![0u8; length as usize];
        self.read_bytes(&mut buffer, 0, length as usize)?;
        Ok(::std::str::from_utf8(&buffer)?.to_owned())
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        let mut buffer = [0u8; 64];
        let mut left = count;
        while left > 0 {
            let step = ::std::cmp::min(left, buffer.len());
            self.read_bytes(&mut buffer, 0, step)?;
            left -= step;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::io::{ByteArrayDataInput, DataOutput};

    #[test]
    fn test_varint_round_trip() {
        let mut out: Vec<u8> = vec![];
        for &v in &[0i32, 1, 127, 128, 300, i32::max_value()] {
            out.write_vint(v).unwrap();
        }
        for &v in &[0i64, 5, 1 << 20, (1i64 << 62) - 1] {
            out.write_vlong(v).unwrap();
        }
        out.write_string("block tree").unwrap();

        let mut input = ByteArrayDataInput::new(&out[..]);
        for &v in &[0i32, 1, 127, 128, 300, i32::max_value()] {
            assert_eq!(input.read_vint().unwrap(), v);
        }
        for &v in &[0i64, 5, 1 << 20, (1i64 << 62) - 1] {
            assert_eq!(input.read_vlong().unwrap(), v);
        }
        assert_eq!(input.read_string().unwrap(), "block tree");
        assert!(input.eof());
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut input = ByteArrayDataInput::new(&[0x80u8][..]);
        assert!(input.read_vint().is_err());
    }
}
