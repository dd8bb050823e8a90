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

pub mod blocktree;

use crate::core::codec::postings::blocktree::BlockTermState;
use crate::core::codec::FieldInfo;
use crate::core::store::io::{DataOutput, IndexOutput};
use crate::error::Result;

/// Collector-side statistics for a single term.
#[derive(Clone, Copy, Debug)]
pub struct TermStats {
    /// How many documents contain the term.
    pub doc_freq: i32,
    /// Total number of occurrences of the term, or -1 when the field omits
    /// frequencies.
    pub total_term_freq: i64,
}

impl TermStats {
    pub fn new(doc_freq: i32, total_term_freq: i64) -> TermStats {
        TermStats {
            doc_freq,
            total_term_freq,
        }
    }
}

/// The postings side of the terms dictionary: writes the postings files and
/// encodes an opaque per-term metadata record that the terms dictionary
/// stores column-strided inside its blocks.
pub trait PostingsWriterBase {
    /// Called once after startup, before any terms have been added.
    /// Implementations typically write a header to the provided terms
    /// dictionary output.
    fn init(&mut self, terms_out: &mut impl IndexOutput) -> Result<()>;

    /// Sets the current field for writing and returns the fixed number of
    /// metadata longs this codec records per term of that field.
    fn set_field(&mut self, field_info: &FieldInfo) -> i32;

    /// Called when a new term begins; postings for the term are appended
    /// through the consumer handle until `finish_term`.
    fn start_term(&mut self) -> Result<()>;

    /// Seals the current term, filling the codec-owned fields of `state`
    /// (file pointers into the postings files and the like).
    fn finish_term(&mut self, state: &mut BlockTermState) -> Result<()>;

    /// Encodes `state` as `longs` plus generic bytes appended to `out`.
    /// `absolute` controls whether the encoding is delta-coded against the
    /// previous term; it is true for the first term of each block so the
    /// codec can reset its bases at block boundaries.
    ///
    /// Elements of `longs` are usually file pointers, so each one must stay
    /// non-negative and monotonic within a block.
    fn encode_term(
        &mut self,
        longs: &mut [i64],
        out: &mut impl DataOutput,
        field_info: &FieldInfo,
        state: &BlockTermState,
        absolute: bool,
    ) -> Result<()>;

    /// Called by the terms dictionary writer during segment close.
    fn close(&mut self) -> Result<()>;
}
