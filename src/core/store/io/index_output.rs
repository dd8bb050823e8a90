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

use crate::core::store::io::DataOutput;
use crate::error::Result;

/// Trait for output to a file in a `Directory`.
///
/// A sequential, append-only output stream that knows its current offset
/// and the running checksum of everything written so far.
pub trait IndexOutput: DataOutput {
    fn name(&self) -> &str;
    fn file_pointer(&self) -> i64;
    fn checksum(&self) -> Result<i64>;
}
