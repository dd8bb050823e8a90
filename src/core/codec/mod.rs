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

pub mod codec_util;

mod field_infos;

pub use self::field_infos::*;

pub mod postings;

use crate::core::codec::codec_util::ID_LENGTH;
use crate::core::store::Directory;

/// Holds the state shared by the per-segment consumers while a segment is
/// being written: where files go and how they are named and stamped.
pub struct SegmentWriteState<'a, D: Directory> {
    pub directory: &'a D,
    pub segment_name: String,
    pub segment_suffix: String,
    pub segment_id: [u8; ID_LENGTH],
}

impl<'a, D: Directory> SegmentWriteState<'a, D> {
    pub fn new(
        directory: &'a D,
        segment_name: String,
        segment_suffix: String,
        segment_id: [u8; ID_LENGTH],
    ) -> Self {
        SegmentWriteState {
            directory,
            segment_name,
            segment_suffix,
            segment_id,
        }
    }
}
