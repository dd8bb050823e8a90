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

//! Write-side of a block-tree terms dictionary and terms index.
//!
//! For each field of a segment the writer consumes a sorted stream of terms
//! (with per-term statistics and opaque postings metadata produced by a
//! pluggable postings codec) and emits a terms dictionary (`.tim`) made of
//! shared-prefix blocks plus a terms index (`.tip`) holding one FST per
//! field that maps term prefixes to block file pointers.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

extern crate byteorder;
extern crate flate2;

pub mod core;
pub mod error;
