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

use crate::core::store::io::{FSIndexOutput, IndexOutput};
use crate::error::Result;

use std::fs;
use std::path::PathBuf;

/// A place where index files are written.
pub trait Directory {
    type Output: IndexOutput;

    /// Creates a new, empty file for writing and returns an output over it.
    fn create_output(&self, name: &str) -> Result<Self::Output>;
}

/// `Directory` over a local filesystem path.
pub struct FsDirectory {
    path: PathBuf,
}

impl FsDirectory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<FsDirectory> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(FsDirectory { path })
    }
}

impl Directory for FsDirectory {
    type Output = FSIndexOutput;

    fn create_output(&self, name: &str) -> Result<FSIndexOutput> {
        FSIndexOutput::new(name.to_string(), self.path.join(name))
    }
}

/// Builds a per-segment file name of the form `name[_suffix].ext`.
pub fn segment_file_name(name: &str, suffix: &str, ext: &str) -> String {
    debug_assert!(!name.is_empty());
    let mut file_name = String::from(name);
    if !suffix.is_empty() {
        file_name.push('_');
        file_name.push_str(suffix);
    }
    if !ext.is_empty() {
        file_name.push('.');
        file_name.push_str(ext);
    }
    file_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_name() {
        assert_eq!(segment_file_name("_0", "", "tim"), "_0.tim");
        assert_eq!(segment_file_name("_3", "Postings_0", "tip"), "_3_Postings_0.tip");
    }
}
