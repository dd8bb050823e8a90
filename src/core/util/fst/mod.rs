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

mod bytes_output;

pub use self::bytes_output::*;

mod fst_builder;

pub use self::fst_builder::*;

mod fst_iterator;

pub use self::fst_iterator::*;

mod fst_reader;

pub use self::fst_reader::*;

use crate::core::store::io::{DataInput, DataOutput};
use crate::error::Result;

use std::fmt::Debug;
use std::hash::Hash;

/// An output value attached to FST arcs. Outputs form a monoid with a
/// prefix operation so that common prefixes can be shared toward the root.
pub trait Output: Clone + Eq + Hash + Debug {
    fn cat(&self, other: &Self) -> Self;

    fn is_empty(&self) -> bool;
}

/// Creates and combines `Output` values for one FST.
pub trait OutputFactory: Clone {
    type Value: Output;

    /// Returns the empty output.
    fn empty(&self) -> Self::Value;

    /// Returns the longest common prefix of two outputs.
    fn common(&self, o1: &Self::Value, o2: &Self::Value) -> Self::Value;

    /// Removes `o2`, which must be a prefix of `o1`, from `o1`.
    fn subtract(&self, o1: &Self::Value, o2: &Self::Value) -> Self::Value;

    /// Prepends `prefix` to `output`.
    fn add(&self, prefix: &Self::Value, output: &Self::Value) -> Self::Value;

    /// Decodes an output previously written with `write`.
    fn read<T: DataInput + ?Sized>(&self, data_in: &mut T) -> Result<Self::Value>;

    /// Encodes an output into a `DataOutput`.
    fn write<T: DataOutput + ?Sized>(&self, output: &Self::Value, data_out: &mut T) -> Result<()>;

    /// Skips an output; defaults to reading and discarding it.
    fn skip_output<T: DataInput + ?Sized>(&self, data_in: &mut T) -> Result<()> {
        self.read(data_in).map(|_| ())
    }
}
