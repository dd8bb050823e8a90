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

use crate::core::store::io::{DataInput, DataOutput, IndexOutput};
use crate::error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use crate::error::Result;

use flate2::Crc;

pub const CODEC_MAGIC: i32 = 0x3FD7_6C17;
pub const FOOTER_MAGIC: i32 = !CODEC_MAGIC;

/// Length of the per-segment id stamped into index headers.
pub const ID_LENGTH: usize = 16;

pub fn write_header<T: DataOutput + ?Sized>(out: &mut T, codec: &str, version: i32) -> Result<()> {
    let clen = codec.len();
    if clen >= 128 {
        bail!(IllegalArgument(format!(
            "codec must be simple ASCII less than 128 characters, got {}[length={}]",
            codec, clen,
        )));
    }
    out.write_int(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_int(version)
}

pub fn write_index_header(
    out: &mut impl DataOutput,
    codec: &str,
    version: i32,
    id: &[u8],
    suffix: &str,
) -> Result<()> {
    if id.len() != ID_LENGTH {
        bail!(IllegalArgument(format!("Invalid id: {:?}", id)));
    }
    write_header(out, codec, version)?;
    out.write_bytes(id, 0, id.len())?;
    let slen = suffix.len();
    if slen >= 256 {
        bail!(IllegalArgument(format!(
            "suffix must be simple ASCII less than 256 characters, got {}[length={}]",
            suffix, slen
        )));
    }
    out.write_byte(slen as u8)?;
    out.write_bytes(suffix.as_bytes(), 0, slen)
}

/// Writes the codec footer: footer magic, checksum algorithm id, and the
/// CRC-32 of everything written to the output so far.
pub fn write_footer(output: &mut impl IndexOutput) -> Result<()> {
    output.write_int(FOOTER_MAGIC)?;
    output.write_int(0)?;
    let value = output.checksum()?;
    if value as u64 & 0xFFFF_FFFF_0000_0000 != 0 {
        bail!(IllegalState(format!("Illegal CRC-32 checksum: {}", value)));
    }
    output.write_long(value)
}

pub fn header_length(codec: &str) -> usize {
    9 + codec.len()
}

pub fn index_header_length(codec: &str, suffix: &str) -> usize {
    header_length(codec) + ID_LENGTH + 1 + suffix.len()
}

#[inline(always)]
pub fn footer_length() -> usize {
    16
}

pub fn check_header<T: DataInput + ?Sized>(
    data_input: &mut T,
    codec: &str,
    min_ver: i32,
    max_ver: i32,
) -> Result<i32> {
    let actual_header = data_input.read_int()?;
    if actual_header != CODEC_MAGIC {
        bail!(CorruptIndex(format!(
            "codec header mismatch: actual=0x{:X}, expected=0x{:X}",
            actual_header, CODEC_MAGIC
        )));
    }
    let actual_codec = data_input.read_string()?;
    if actual_codec != codec {
        bail!(CorruptIndex(format!(
            "codec mismatch: actual={}, expected={}",
            actual_codec, codec
        )));
    }
    let actual_ver = data_input.read_int()?;
    if actual_ver < min_ver || actual_ver > max_ver {
        bail!(CorruptIndex(format!(
            "index format either too new or too old: {} <= {} <= {} doesn't hold",
            min_ver, actual_ver, max_ver
        )));
    }
    Ok(actual_ver)
}

pub fn check_index_header<T: DataInput + ?Sized>(
    data_input: &mut T,
    codec: &str,
    min_ver: i32,
    max_ver: i32,
    expected_id: &[u8],
    expected_suffix: &str,
) -> Result<i32> {
    let version = check_header(data_input, codec, min_ver, max_ver)?;
    let mut actual_id = [0u8; ID_LENGTH];
    data_input.read_bytes(&mut actual_id, 0, ID_LENGTH)?;
    if actual_id != expected_id {
        bail!(CorruptIndex(format!(
            "file mismatch, expected id={:?}, got={:?}",
            expected_id, actual_id
        )));
    }
    let suffix_len = data_input.read_byte()? as usize;
    let mut suffix_bytes = vec![0u8; suffix_len];
    data_input.read_bytes(&mut suffix_bytes, 0, suffix_len)?;
    let suffix = ::std::str::from_utf8(&suffix_bytes)?;
    if suffix != expected_suffix {
        bail!(CorruptIndex(format!(
            "file mismatch, expected suffix={}, got={}",
            expected_suffix, suffix
        )));
    }
    Ok(version)
}

/// Validates the footer of a fully read file: magic, algorithm id, and the
/// stored CRC-32 against one recomputed over the file body.
pub fn check_footer(file: &[u8]) -> Result<i64> {
    use crate::core::store::io::ByteArrayDataInput;

    if file.len() < footer_length() {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): length={}, but footer_length={}",
            file.len(),
            footer_length()
        )));
    }
    let body_len = file.len() - footer_length();
    let mut input = ByteArrayDataInput::new(&file[body_len..]);
    let magic = input.read_int()?;
    if magic != FOOTER_MAGIC {
        bail!(CorruptIndex(format!(
            "codec footer mismatch: actual={} vs expected={}",
            magic, FOOTER_MAGIC
        )));
    }
    let algorithm_id = input.read_int()?;
    if algorithm_id != 0 {
        bail!(CorruptIndex(format!(
            "codec footer mismatch: unknown algorithm_id: {}",
            algorithm_id
        )));
    }
    let expected_checksum = input.read_long()?;
    if (expected_checksum as u64 & 0xFFFF_FFFF_0000_0000) != 0 {
        bail!(CorruptIndex(format!(
            "Illegal CRC-32 checksum: {}",
            expected_checksum
        )));
    }
    let mut crc = Crc::new();
    crc.update(&file[..body_len + 8]);
    let actual_checksum = (crc.sum() as i64) & 0xffff_ffffi64;
    if actual_checksum != expected_checksum {
        bail!(CorruptIndex(format!(
            "checksum failed (hardware problems?): expected=0x{:X}, actual=0x{:X}",
            expected_checksum, actual_checksum
        )));
    }
    Ok(actual_checksum)
}
