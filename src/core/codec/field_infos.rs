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

/// Controls how much information is stored in the postings lists of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOptions {
    /// Only documents are indexed: term frequencies and positions are omitted.
    Docs,
    /// Documents and term frequencies are indexed.
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    pub fn has_freqs(self) -> bool {
        self != IndexOptions::Docs
    }
}

/// Describes one indexed field: its name, its number in the segment's field
/// directory, and how its postings are indexed.
#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub index_options: IndexOptions,
}

impl FieldInfo {
    pub fn new(name: String, number: u32, index_options: IndexOptions) -> FieldInfo {
        FieldInfo {
            name,
            number,
            index_options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_freqs() {
        assert!(!IndexOptions::Docs.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(IndexOptions::DocsAndFreqsAndPositions.has_freqs());
    }
}
