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

use crate::core::util::fst::fst_reader::{Arc, END_LABEL};
use crate::core::util::fst::{OutputFactory, FST};
use crate::error::Result;

/// Enumerates all (input, output) pairs of an FST in input order.
pub struct BytesRefFSTIterator<F: OutputFactory> {
    fst: FST<F>,
    arcs: Vec<Arc<F::Value>>,
    output: Vec<F::Value>,
    current: Vec<u8>,
    upto: usize,
}

impl<F: OutputFactory> BytesRefFSTIterator<F> {
    pub fn new(fst: FST<F>) -> Self {
        let root = fst.root_arc();
        let no_output = fst.outputs().empty();
        BytesRefFSTIterator {
            arcs: vec![root],
            output: vec![no_output],
            current: vec![0],
            upto: 0,
            fst,
        }
    }

    pub fn next(&mut self) -> Result<Option<(&[u8], F::Value)>> {
        if self.upto == 0 {
            self.upto = 1;
            self.grow();
            let arc = self.fst.read_first_target_arc(&self.arcs[0])?;
            self.arcs[1] = arc;
        } else {
            // pop exhausted levels, then advance to the next sibling
            while self.arcs[self.upto].is_last() {
                self.upto -= 1;
                if self.upto == 0 {
                    return Ok(None);
                }
            }
            let mut arc = self.arcs[self.upto].clone();
            self.fst.read_next_arc(&mut arc)?;
            self.arcs[self.upto] = arc;
        }
        self.push_first()?;
        Ok(Some((
            &self.current[1..self.upto],
            self.output[self.upto].clone(),
        )))
    }

    // appends the current arc, then recurses from its target, appending the
    // first arc all the way to the final node
    fn push_first(&mut self) -> Result<()> {
        loop {
            let upto = self.upto;
            let accumulated = if let Some(ref out) = self.arcs[upto].output {
                self.fst.outputs().add(&self.output[upto - 1], out)
            } else {
                self.output[upto - 1].clone()
            };
            self.output[upto] = accumulated;
            let label = self.arcs[upto].label;
            if label == END_LABEL {
                break;
            }
            self.current[upto] = label as u8;
            self.upto += 1;
            self.grow();
            let arc = self.fst.read_first_target_arc(&self.arcs[upto])?;
            self.arcs[self.upto] = arc;
        }
        Ok(())
    }

    fn grow(&mut self) {
        while self.arcs.len() <= self.upto {
            self.arcs.push(Arc::empty());
        }
        while self.output.len() <= self.upto {
            self.output.push(self.fst.outputs().empty());
        }
        while self.current.len() <= self.upto {
            self.current.push(0);
        }
    }
}
