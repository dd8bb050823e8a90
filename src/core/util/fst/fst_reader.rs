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

use crate::core::codec::codec_util::{check_header, write_header};
use crate::core::store::io::{DataInput, DataOutput};
use crate::core::util::fst::fst_builder::{Node, UnCompiledNode};
use crate::core::util::fst::{Output, OutputFactory};
use crate::error::{ErrorKind, Result};

use std::io::{self, Read};

const BIT_FINAL_ARC: u8 = 1;
const BIT_LAST_ARC: u8 = 1 << 1;
const BIT_TARGET_NEXT: u8 = 1 << 2;
const BIT_STOP_NODE: u8 = 1 << 3;
const BIT_ARC_HAS_OUTPUT: u8 = 1 << 4;
const BIT_ARC_HAS_FINAL_OUTPUT: u8 = 1 << 5;

const FILE_FORMAT_NAME: &str = "FST";
const VERSION_CURRENT: i32 = 6;

const FINAL_END_NODE: CompiledAddress = -1;
const NON_FINAL_END_NODE: CompiledAddress = 0;

pub const END_LABEL: Label = -1;

pub type Label = i32;
pub type CompiledAddress = i64;

fn flag(flags: u8, bit: u8) -> bool {
    (flags & bit) != 0
}

/// One transition of the automaton, together with the read cursor needed to
/// reach its siblings and its target node.
#[derive(Clone, Debug)]
pub struct Arc<T: Output> {
    pub flags: u8,
    pub label: Label,
    pub output: Option<T>,
    pub next_final_output: Option<T>,
    pub next_arc: Option<CompiledAddress>,
    /// To node.
    pub target: CompiledAddress,
}

impl<T: Output> Arc<T> {
    pub fn empty() -> Arc<T> {
        Arc {
            flags: 0u8,
            label: 0,
            output: None,
            next_final_output: None,
            next_arc: None,
            target: 0,
        }
    }

    pub fn is_last(&self) -> bool {
        flag(self.flags, BIT_LAST_ARC)
    }

    pub fn is_final(&self) -> bool {
        flag(self.flags, BIT_FINAL_ARC)
    }
}

/// Reads the node bytes backwards. Nodes are serialized forward and then
/// reversed in place, so a descending scan from a node's address replays
/// its arcs in writing order.
struct ReverseBytesReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ReverseBytesReader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> ReverseBytesReader<'a> {
        ReverseBytesReader { bytes, pos }
    }

    fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Read for ReverseBytesReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(self.pos.wrapping_add(1));
        for v in buf.iter_mut().take(len) {
            *v = self.bytes[self.pos];
            self.pos = self.pos.wrapping_sub(1);
        }
        Ok(len)
    }
}

impl<'a> DataInput for ReverseBytesReader<'a> {
    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.pos = self.pos.wrapping_sub(count);
        Ok(())
    }
}

/// A minimal acyclic byte-input automaton with byte-sequence outputs,
/// serialized into a flat byte buffer as it is built.
///
/// The empty input is special-cased: its output is held out-of-band in
/// `empty_output` because finality lives on incoming arcs, which the empty
/// input does not have.
pub struct FST<F: OutputFactory> {
    pub empty_output: Option<F::Value>,
    bytes: Vec<u8>,
    start_node: CompiledAddress,
    output_factory: F,
}

impl<F: OutputFactory> FST<F> {
    pub fn new(output_factory: F) -> Self {
        FST {
            empty_output: None,
            // pad byte so that addresses of real nodes are > 0
            bytes: vec![0u8],
            start_node: -1,
            output_factory,
        }
    }

    pub fn from_input<I: DataInput + ?Sized>(data_in: &mut I, output_factory: F) -> Result<Self> {
        check_header(data_in, FILE_FORMAT_NAME, VERSION_CURRENT, VERSION_CURRENT)?;

        let empty_output = if data_in.read_byte()? == 1 {
            let num_bytes = data_in.read_vint()? as usize;
            let mut buffer = vec![0u8; num_bytes];
            data_in.read_bytes(&mut buffer, 0, num_bytes)?;
            let mut reader = ReverseBytesReader::new(&buffer, num_bytes.saturating_sub(1));
            Some(output_factory.read(&mut reader)?)
        } else {
            None
        };

        let start_node = data_in.read_vlong()?;
        let num_bytes = data_in.read_vlong()? as usize;
        let mut bytes = vec![0u8; num_bytes];
        data_in.read_bytes(&mut bytes, 0, num_bytes)?;

        Ok(FST {
            empty_output,
            bytes,
            start_node,
            output_factory,
        })
    }

    pub fn outputs(&self) -> &F {
        &self.output_factory
    }

    pub(crate) fn set_empty_output(&mut self, v: F::Value) {
        debug_assert!(self.empty_output.is_none());
        self.empty_output = Some(v);
    }

    pub(crate) fn num_bytes(&self) -> usize {
        self.bytes.len()
    }

    fn target_has_arcs(target: CompiledAddress) -> bool {
        target > 0
    }

    /// Serializes a new node by appending its arcs to the end of the byte
    /// buffer, then reversing the appended region so the node is readable
    /// backwards from the returned address.
    pub(crate) fn add_node(
        &mut self,
        node: &UnCompiledNode<F>,
        last_frozen_node: CompiledAddress,
    ) -> Result<CompiledAddress> {
        let no_output = self.output_factory.empty();

        if node.arcs.is_empty() {
            return Ok(if node.is_final {
                FINAL_END_NODE
            } else {
                NON_FINAL_END_NODE
            });
        }
        let start_address = self.bytes.len();

        let last_arc = node.arcs.len() - 1;
        for (idx, arc) in node.arcs.iter().enumerate() {
            let target = match arc.target {
                Node::Compiled(c) => c,
                Node::UnCompiled(_) => unreachable!(),
            };
            let mut flags = 0u8;
            if idx == last_arc {
                flags |= BIT_LAST_ARC;
            }
            if last_frozen_node == target && target > 0 {
                // the target node's bytes directly precede this node's
                flags |= BIT_TARGET_NEXT;
            }
            if arc.is_final {
                flags |= BIT_FINAL_ARC;
                if arc.next_final_output != no_output {
                    flags |= BIT_ARC_HAS_FINAL_OUTPUT;
                }
            } else {
                debug_assert!(arc.next_final_output == no_output);
            }
            let target_has_arcs = Self::target_has_arcs(target);
            if !target_has_arcs {
                flags |= BIT_STOP_NODE;
            }
            if arc.output != no_output {
                flags |= BIT_ARC_HAS_OUTPUT;
            }

            self.bytes.write_byte(flags)?;
            debug_assert!(arc.label >= 0 && arc.label <= 255);
            self.bytes.write_byte(arc.label as u8)?;
            if arc.output != no_output {
                self.output_factory.write(&arc.output, &mut self.bytes)?;
            }
            if arc.next_final_output != no_output {
                self.output_factory
                    .write(&arc.next_final_output, &mut self.bytes)?;
            }
            if target_has_arcs && (flags & BIT_TARGET_NEXT) == 0 {
                self.bytes.write_vlong(target)?;
            }
        }

        let this_node_address = self.bytes.len() - 1;
        self.bytes[start_address..].reverse();
        Ok(this_node_address as CompiledAddress)
    }

    pub(crate) fn finish(&mut self, new_start_node: CompiledAddress) -> Result<()> {
        if self.start_node != -1 {
            bail!(ErrorKind::IllegalState("already finished".into()));
        }
        debug_assert!(new_start_node < self.bytes.len() as i64);
        self.start_node = if new_start_node == FINAL_END_NODE {
            0
        } else {
            new_start_node
        };
        Ok(())
    }

    /// A virtual arc arriving at the root node.
    pub fn root_arc(&self) -> Arc<F::Value> {
        let mut arc = Arc::empty();
        if let Some(ref empty_output) = self.empty_output {
            arc.flags = BIT_FINAL_ARC | BIT_LAST_ARC;
            arc.next_final_output = Some(empty_output.clone());
            if !empty_output.is_empty() {
                arc.flags |= BIT_ARC_HAS_FINAL_OUTPUT;
            }
        } else {
            arc.flags = BIT_LAST_ARC;
            arc.next_final_output = Some(self.output_factory.empty());
        }
        arc.output = Some(self.output_factory.empty());
        // If there are no nodes, ie the FST only accepts the empty string,
        // then start_node is 0.
        arc.target = self.start_node;
        arc
    }

    pub fn read_first_real_arc(&self, node: CompiledAddress) -> Result<Arc<F::Value>> {
        let mut arc = Arc::empty();
        arc.next_arc = Some(node);
        self.read_next_real_arc(&mut arc)?;
        Ok(arc)
    }

    pub fn read_next_real_arc(&self, arc: &mut Arc<F::Value>) -> Result<()> {
        debug_assert!(arc.next_arc.is_some());
        let mut reader = ReverseBytesReader::new(&self.bytes, arc.next_arc.unwrap() as usize);

        arc.flags = reader.read_byte()?;
        arc.label = Label::from(reader.read_byte()?);
        arc.output = if flag(arc.flags, BIT_ARC_HAS_OUTPUT) {
            Some(self.output_factory.read(&mut reader)?)
        } else {
            None
        };
        arc.next_final_output = if flag(arc.flags, BIT_ARC_HAS_FINAL_OUTPUT) {
            Some(self.output_factory.read(&mut reader)?)
        } else {
            None
        };
        if flag(arc.flags, BIT_STOP_NODE) {
            arc.target = FINAL_END_NODE;
            arc.next_arc = Some(reader.position() as i64);
        } else if flag(arc.flags, BIT_TARGET_NEXT) {
            arc.next_arc = Some(reader.position() as i64);
            if !flag(arc.flags, BIT_LAST_ARC) {
                self.seek_to_next_node(&mut reader)?;
            }
            arc.target = reader.position() as CompiledAddress;
        } else {
            arc.target = reader.read_vlong()? as CompiledAddress;
            arc.next_arc = Some(reader.position() as i64);
        }
        Ok(())
    }

    /// Follows the `follow` arc and reads the first arc of its target; if
    /// the arc is final, a synthesized arc labelled `END_LABEL` comes first.
    pub fn read_first_target_arc(&self, follow: &Arc<F::Value>) -> Result<Arc<F::Value>> {
        if follow.is_final() {
            let mut arc = Arc::empty();
            arc.flags = BIT_FINAL_ARC;
            arc.label = END_LABEL;
            arc.target = FINAL_END_NODE;
            arc.output = follow.next_final_output.clone();
            if !Self::target_has_arcs(follow.target) {
                arc.flags |= BIT_LAST_ARC;
            } else {
                arc.next_arc = Some(follow.target);
            }
            Ok(arc)
        } else {
            self.read_first_real_arc(follow.target)
        }
    }

    pub fn read_next_arc(&self, arc: &mut Arc<F::Value>) -> Result<()> {
        if arc.label == END_LABEL {
            // this was a fake inserted "final" arc
            let next = arc.next_arc;
            match next {
                Some(addr) if addr > 0 => {
                    *arc = self.read_first_real_arc(addr)?;
                    Ok(())
                }
                _ => bail!(ErrorKind::IllegalArgument(
                    "cannot read_next_arc when arc.is_last()".into()
                )),
            }
        } else {
            self.read_next_real_arc(arc)
        }
    }

    pub fn find_target_arc(
        &self,
        label: Label,
        incoming_arc: &Arc<F::Value>,
    ) -> Result<Option<Arc<F::Value>>> {
        if !Self::target_has_arcs(incoming_arc.target) {
            return Ok(None);
        }
        let mut arc = self.read_first_real_arc(incoming_arc.target)?;
        loop {
            if arc.label == label {
                return Ok(Some(arc));
            } else if arc.label > label || arc.is_last() {
                return Ok(None);
            }
            self.read_next_real_arc(&mut arc)?;
        }
    }

    /// Looks up the output for an exact input, if the input is accepted.
    pub fn get(&self, bytes: &[u8]) -> Result<Option<F::Value>> {
        let mut arc = self.root_arc();
        let mut output = self.output_factory.empty();
        for &label in bytes {
            match self.find_target_arc(Label::from(label), &arc)? {
                Some(a) => {
                    arc = a;
                    if let Some(ref out) = arc.output {
                        if !out.is_empty() {
                            output = output.cat(out);
                        }
                    }
                }
                None => return Ok(None),
            }
        }
        if arc.is_final() {
            if let Some(ref out) = arc.next_final_output {
                if !out.is_empty() {
                    output = output.cat(out);
                }
            }
            Ok(Some(output))
        } else {
            Ok(None)
        }
    }

    fn seek_to_next_node(&self, reader: &mut ReverseBytesReader<'_>) -> Result<()> {
        loop {
            let flags = reader.read_byte()?;
            reader.read_byte()?; // label
            if flag(flags, BIT_ARC_HAS_OUTPUT) {
                self.output_factory.skip_output(reader)?;
            }
            if flag(flags, BIT_ARC_HAS_FINAL_OUTPUT) {
                self.output_factory.skip_output(reader)?;
            }
            if !flag(flags, BIT_STOP_NODE) && !flag(flags, BIT_TARGET_NEXT) {
                reader.read_vlong()?;
            }
            if flag(flags, BIT_LAST_ARC) {
                return Ok(());
            }
        }
    }

    pub fn save(&self, out: &mut impl DataOutput) -> Result<()> {
        if self.start_node == -1 {
            bail!(ErrorKind::IllegalState("call finish first!".into()));
        }
        write_header(out, FILE_FORMAT_NAME, VERSION_CURRENT)?;
        if let Some(ref empty_output) = self.empty_output {
            out.write_byte(1)?;
            // serialize the empty-input output reversed, the way node
            // regions are stored
            let mut empty_output_bytes: Vec<u8> = Vec::new();
            self.output_factory
                .write(empty_output, &mut empty_output_bytes)?;
            empty_output_bytes.reverse();
            out.write_vint(empty_output_bytes.len() as i32)?;
            out.write_bytes(&empty_output_bytes, 0, empty_output_bytes.len())?;
        } else {
            out.write_byte(0)?;
        }
        out.write_vlong(self.start_node)?;
        out.write_vlong(self.bytes.len() as i64)?;
        out.write_bytes(&self.bytes, 0, self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::io::ByteArrayDataInput;
    use crate::core::util::fst::{ByteSequenceOutput, ByteSequenceOutputFactory, FstBuilder};

    fn build_fst(entries: &[(&str, Vec<u8>)]) -> FST<ByteSequenceOutputFactory> {
        let mut builder = FstBuilder::new(ByteSequenceOutputFactory::new());
        for (input, output) in entries {
            builder
                .add(input.as_bytes(), ByteSequenceOutput::new(output.clone()))
                .unwrap();
        }
        builder.finish().unwrap().unwrap()
    }

    #[test]
    fn test_get() {
        let entries: Vec<(&str, Vec<u8>)> = vec![
            ("cat", vec![5]),
            ("dag", vec![7]),
            ("dbg", vec![12]),
            ("dcg", vec![13]),
            ("ddg", vec![14]),
            ("deg", vec![15]),
            ("dog", vec![16]),
            ("dogs", vec![17]),
        ];
        let fst = build_fst(&entries);
        for (input, output) in &entries {
            let found = fst.get(input.as_bytes()).unwrap().unwrap();
            assert_eq!(found.inner(), &output[..]);
        }
        assert!(fst.get(b"do").unwrap().is_none());
        assert!(fst.get(b"dogz").unwrap().is_none());
        assert!(fst.get(b"").unwrap().is_none());
    }

    #[test]
    fn test_empty_input_output() {
        let entries: Vec<(&str, Vec<u8>)> = vec![("", vec![9, 9]), ("a", vec![1]), ("ab", vec![2])];
        let fst = build_fst(&entries);
        assert_eq!(fst.get(b"").unwrap().unwrap().inner(), &[9, 9]);
        assert_eq!(fst.get(b"a").unwrap().unwrap().inner(), &[1]);
        assert_eq!(fst.get(b"ab").unwrap().unwrap().inner(), &[2]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let entries: Vec<(&str, Vec<u8>)> = vec![
            ("", vec![42]),
            ("apple", vec![1, 2]),
            ("apricot", vec![3]),
            ("banana", vec![4, 5, 6]),
        ];
        let fst = build_fst(&entries);
        let mut buf: Vec<u8> = vec![];
        fst.save(&mut buf).unwrap();

        let mut input = ByteArrayDataInput::new(&buf[..]);
        let loaded = FST::from_input(&mut input, ByteSequenceOutputFactory::new()).unwrap();
        for (text, output) in &entries {
            let found = loaded.get(text.as_bytes()).unwrap().unwrap();
            assert_eq!(found.inner(), &output[..]);
        }
        assert!(loaded.get(b"apples").unwrap().is_none());
    }

    #[test]
    fn test_shared_output_prefix() {
        // outputs with a common prefix share it on the first arc
        let entries: Vec<(&str, Vec<u8>)> =
            vec![("aa", vec![1, 2, 3]), ("ab", vec![1, 2, 4])];
        let fst = build_fst(&entries);
        assert_eq!(fst.get(b"aa").unwrap().unwrap().inner(), &[1, 2, 3]);
        assert_eq!(fst.get(b"ab").unwrap().unwrap().inner(), &[1, 2, 4]);
    }
}
