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

mod blocktree_writer;

pub use self::blocktree_writer::*;

/// Extension of the terms dictionary file.
pub const TERMS_EXTENSION: &str = "tim";
pub const TERMS_CODEC_NAME: &str = "BlockTreeTermsDict";

/// Initial terms format.
pub const VERSION_START: i32 = 0;

/// Records min/max term per field and per-file checksums.
pub const VERSION_MIN_MAX_TERMS: i32 = 1;

/// Current terms format.
pub const VERSION_CURRENT: i32 = VERSION_MIN_MAX_TERMS;

/// Extension of the terms index file.
pub const TERMS_INDEX_EXTENSION: &str = "tip";
pub const TERMS_INDEX_CODEC_NAME: &str = "BlockTreeTermsIndex";

pub const OUTPUT_FLAGS_NUM_BITS: usize = 2;
pub const OUTPUT_FLAGS_IS_FLOOR: i64 = 0x1;
pub const OUTPUT_FLAGS_HAS_TERMS: i64 = 0x2;

/// Packs a block file pointer plus its two flags into the FST output value.
pub fn encode_output(fp: i64, has_terms: bool, is_floor: bool) -> i64 {
    debug_assert!(fp < (1i64 << 62));
    let term_flag = if has_terms { OUTPUT_FLAGS_HAS_TERMS } else { 0 };
    let floor_flag = if is_floor { OUTPUT_FLAGS_IS_FLOOR } else { 0 };
    (fp << OUTPUT_FLAGS_NUM_BITS) | term_flag | floor_flag
}

/// Inverse of `encode_output`: `(fp, has_terms, is_floor)`.
pub fn decode_output(code: i64) -> (i64, bool, bool) {
    (
        code >> OUTPUT_FLAGS_NUM_BITS,
        (code & OUTPUT_FLAGS_HAS_TERMS) != 0,
        (code & OUTPUT_FLAGS_IS_FLOOR) != 0,
    )
}

/// Holds all per-term state the postings codec needs to locate and decode
/// one term's postings, plus the term's statistics.
#[derive(Clone, Debug)]
pub struct BlockTermState {
    /// How many docs have this term.
    pub doc_freq: i32,

    /// Total number of occurrences of this term, or -1 when the field
    /// omits frequencies.
    pub total_term_freq: i64,

    /// fp into the postings doc file where this term starts.
    pub doc_start_fp: i64,
    /// fp into the positions file, if positions are indexed.
    pub pos_start_fp: i64,
    /// fp into the payloads/offsets file, if stored.
    pub pay_start_fp: i64,
    pub skip_offset: i64,
    pub last_pos_block_offset: i64,
    // docid when there is a single pulsed posting, otherwise -1
    pub singleton_doc_id: i32,
}

impl BlockTermState {
    pub fn new() -> BlockTermState {
        BlockTermState {
            doc_freq: 0,
            total_term_freq: 0,
            doc_start_fp: 0,
            pos_start_fp: 0,
            pay_start_fp: 0,
            skip_offset: -1,
            last_pos_block_offset: -1,
            singleton_doc_id: -1,
        }
    }
}

impl Default for BlockTermState {
    fn default() -> Self {
        BlockTermState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_round_trip() {
        for &(fp, has_terms, is_floor) in &[
            (0i64, false, false),
            (1, true, false),
            (42, false, true),
            ((1i64 << 62) - 1, true, true),
        ] {
            let code = encode_output(fp, has_terms, is_floor);
            assert_eq!(decode_output(code), (fp, has_terms, is_floor));
        }
    }
}
