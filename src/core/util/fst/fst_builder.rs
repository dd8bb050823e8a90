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

use crate::core::util::fst::fst_reader::{CompiledAddress, Label};
use crate::core::util::fst::{OutputFactory, FST};
use crate::error::Result;

use std::cmp::min;
use std::collections::HashMap;
use std::mem;

/// Builds a minimal FST (maps byte-string inputs to arbitrary outputs) from
/// pre-sorted inputs. The FST is written on-the-fly into a compact
/// serialized byte array which can be saved to / loaded from a directory or
/// traversed directly. The FST is always finite (no cycles).
///
/// The algorithm is the classic incremental construction for sorted input:
/// a frontier of uncompiled nodes spans the current input; whenever the
/// next input diverges, the abandoned suffix is frozen bottom-up, and
/// already-frozen identical suffix nodes are shared.
pub struct FstBuilder<F: OutputFactory> {
    fst: FST<F>,
    no_output: F::Value,
    do_share_suffix: bool,
    // sharing non-singleton nodes trades build time for a smaller FST; the
    // terms index keeps this off
    do_share_non_singleton_nodes: bool,
    last_input: Vec<u8>,
    // current "frontier": frontier[d] is the uncompiled node entered after
    // consuming d bytes of the last input
    frontier: Vec<UnCompiledNode<F>>,
    // already-frozen node -> its address, for suffix sharing
    dedup_map: HashMap<NodeKey<F>, CompiledAddress>,
    // Used for the BIT_TARGET_NEXT optimization (whereby instead of storing
    // the address of the target node for a given arc, we mark a single bit
    // noting that the next node in the bytes is the target node)
    last_frozen_node: CompiledAddress,
}

type NodeKey<F> = Vec<(
    Label,
    CompiledAddress,
    <F as OutputFactory>::Value,
    <F as OutputFactory>::Value,
    bool,
)>;

impl<F: OutputFactory> FstBuilder<F> {
    pub fn new(outputs: F) -> Self {
        Self::build(true, false, outputs)
    }

    pub fn build(do_share_suffix: bool, do_share_non_singleton_nodes: bool, outputs: F) -> Self {
        let no_output = outputs.empty();
        let fst = FST::new(outputs);
        let mut frontier = Vec::with_capacity(10);
        frontier.push(UnCompiledNode::new(&no_output));
        FstBuilder {
            fst,
            no_output,
            do_share_suffix,
            do_share_non_singleton_nodes,
            last_input: vec![],
            frontier,
            dedup_map: HashMap::new(),
            last_frozen_node: 0,
        }
    }

    /// Adds the next input/output pair. The input must be strictly greater
    /// than the previous one in byte order; equal inputs are not allowed.
    pub fn add(&mut self, input: &[u8], output: F::Value) -> Result<()> {
        debug_assert!(self.last_input.is_empty() || input > &self.last_input[..]);

        if self.frontier.len() < input.len() + 1 {
            for _ in self.frontier.len()..input.len() + 1 {
                self.frontier.push(UnCompiledNode::new(&self.no_output));
            }
        }

        if input.is_empty() {
            // empty input: only allowed as the first input. finality is
            // stored on incoming arcs, which the empty input does not have,
            // so its output lives out-of-band on the FST itself
            self.frontier[0].is_final = true;
            self.fst.set_empty_output(output);
            return Ok(());
        }

        // longest common prefix with the previous input
        let mut pos = 0;
        let stop = min(self.last_input.len(), input.len());
        while pos < stop && self.last_input[pos] == input[pos] {
            pos += 1;
        }
        let prefix_len_plus1 = pos + 1;

        // compile the nodes of the previous input's abandoned suffix
        self.freeze_tail(prefix_len_plus1)?;

        // init tail states for the current input
        for i in prefix_len_plus1..=input.len() {
            let label = Label::from(input[i - 1]);
            let target = Node::UnCompiled(i);
            let no_output = self.no_output.clone();
            self.frontier[i - 1].add_arc(label, target, &no_output);
        }

        let last_idx = input.len();
        self.frontier[last_idx].is_final = true;
        self.frontier[last_idx].output = self.no_output.clone();

        // push conflicting outputs forward, only as far as needed
        let mut output = output;
        for i in 1..prefix_len_plus1 {
            let label = Label::from(input[i - 1]);
            let last_output = self.frontier[i - 1].last_output(label).clone();
            let common_output_prefix = if last_output != self.no_output {
                let common = self.fst.outputs().common(&output, &last_output);
                let word_suffix = self.fst.outputs().subtract(&last_output, &common);
                let outputs = self.fst.outputs().clone();
                self.frontier[i].prepend_output(&word_suffix, &outputs);
                common
            } else {
                self.no_output.clone()
            };
            output = self.fst.outputs().subtract(&output, &common_output_prefix);
            if last_output != self.no_output {
                self.frontier[i - 1].set_last_output(label, common_output_prefix);
            }
        }

        // the new arc is private to this input; it carries the leftover
        // output
        self.frontier[prefix_len_plus1 - 1]
            .set_last_output(Label::from(input[prefix_len_plus1 - 1]), output);

        self.last_input.clear();
        self.last_input.extend_from_slice(input);
        Ok(())
    }

    /// Returns the finished FST, or `None` if nothing was accepted.
    pub fn finish(mut self) -> Result<Option<FST<F>>> {
        // minimize nodes in the last input's suffix
        self.freeze_tail(0)?;
        if self.frontier[0].arcs.is_empty() && self.fst.empty_output.is_none() {
            return Ok(None);
        }
        let node = self.compile_node(0)?;
        self.fst.finish(node)?;
        Ok(Some(self.fst))
    }

    fn freeze_tail(&mut self, prefix_len_plus1: usize) -> Result<()> {
        let down_to = ::std::cmp::max(1, prefix_len_plus1);
        if self.last_input.len() < down_to {
            return Ok(());
        }
        let mut idx = self.last_input.len();
        while idx >= down_to {
            let next_final_output = self.frontier[idx].output.clone();
            // fake finality for dead-end states so traversal never strands
            let is_final = self.frontier[idx].is_final || self.frontier[idx].arcs.is_empty();
            let node = self.compile_node(idx)?;
            let label = Label::from(self.last_input[idx - 1]);
            self.frontier[idx - 1].replace_last(
                label,
                Node::Compiled(node),
                next_final_output,
                is_final,
            );
            idx -= 1;
        }
        Ok(())
    }

    fn compile_node(&mut self, node_index: usize) -> Result<CompiledAddress> {
        let node = mem::replace(
            &mut self.frontier[node_index],
            UnCompiledNode::new(&self.no_output),
        );
        if self.do_share_suffix
            && !node.arcs.is_empty()
            && (self.do_share_non_singleton_nodes || node.arcs.len() == 1)
        {
            let key = Self::node_key(&node);
            if let Some(&address) = self.dedup_map.get(&key) {
                return Ok(address);
            }
            let address = self.freeze_node(&node)?;
            self.dedup_map.insert(key, address);
            Ok(address)
        } else {
            self.freeze_node(&node)
        }
    }

    fn freeze_node(&mut self, node: &UnCompiledNode<F>) -> Result<CompiledAddress> {
        let bytes_pos_start = self.fst.num_bytes();
        let address = self.fst.add_node(node, self.last_frozen_node)?;
        if self.fst.num_bytes() != bytes_pos_start {
            // the fst appended a new node
            self.last_frozen_node = address;
        }
        Ok(address)
    }

    fn node_key(node: &UnCompiledNode<F>) -> NodeKey<F> {
        node.arcs
            .iter()
            .map(|arc| {
                let target = match arc.target {
                    Node::Compiled(c) => c,
                    Node::UnCompiled(_) => unreachable!(),
                };
                (
                    arc.label,
                    target,
                    arc.output.clone(),
                    arc.next_final_output.clone(),
                    arc.is_final,
                )
            })
            .collect()
    }
}

// NOTE: not many instances of Node or UnCompiledNode are in memory while the
// FST is being built; it's only the current "frontier":
#[derive(Clone)]
pub enum Node {
    Compiled(CompiledAddress),
    UnCompiled(usize), // index in builder.frontier
}

pub struct BuilderArc<F: OutputFactory> {
    pub label: Label,
    pub target: Node,
    pub is_final: bool,
    pub output: F::Value,
    pub next_final_output: F::Value,
}

/// Holds a pending (seen but not yet serialized) node.
pub struct UnCompiledNode<F: OutputFactory> {
    pub arcs: Vec<BuilderArc<F>>,
    /// Output attached to the finality of this node, pushed here when a
    /// shorter input's output could not stay on a shared arc.
    pub output: F::Value,
    pub is_final: bool,
}

impl<F: OutputFactory> UnCompiledNode<F> {
    pub fn new(no_output: &F::Value) -> Self {
        UnCompiledNode {
            arcs: vec![],
            output: no_output.clone(),
            is_final: false,
        }
    }

    fn last_output(&self, label_to_match: Label) -> &F::Value {
        debug_assert!(!self.arcs.is_empty());
        let arc = self.arcs.last().unwrap();
        debug_assert_eq!(arc.label, label_to_match);
        &arc.output
    }

    fn set_last_output(&mut self, label_to_match: Label, new_output: F::Value) {
        debug_assert!(!self.arcs.is_empty());
        let arc = self.arcs.last_mut().unwrap();
        debug_assert_eq!(arc.label, label_to_match);
        arc.output = new_output;
    }

    fn add_arc(&mut self, label: Label, target: Node, no_output: &F::Value) {
        debug_assert!(self.arcs.is_empty() || label > self.arcs.last().unwrap().label);
        self.arcs.push(BuilderArc {
            label,
            target,
            is_final: false,
            output: no_output.clone(),
            next_final_output: no_output.clone(),
        });
    }

    fn replace_last(
        &mut self,
        label_to_match: Label,
        target: Node,
        next_final_output: F::Value,
        is_final: bool,
    ) {
        debug_assert!(!self.arcs.is_empty());
        let arc = self.arcs.last_mut().unwrap();
        debug_assert_eq!(arc.label, label_to_match);
        arc.target = target;
        arc.next_final_output = next_final_output;
        arc.is_final = is_final;
    }

    fn prepend_output(&mut self, output_prefix: &F::Value, outputs: &F) {
        for arc in &mut self.arcs {
            arc.output = outputs.add(output_prefix, &arc.output);
        }
        if self.is_final {
            self.output = outputs.add(output_prefix, &self.output);
        }
    }
}
