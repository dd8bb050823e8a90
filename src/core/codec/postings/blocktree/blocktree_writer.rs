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

use crate::core::codec::codec_util::{write_footer, write_index_header};
use crate::core::codec::postings::blocktree::*;
use crate::core::codec::postings::{PostingsWriterBase, TermStats};
use crate::core::codec::{FieldInfo, SegmentWriteState};
use crate::core::store::io::{DataOutput, IndexOutput, RAMOutputStream};
use crate::core::store::{segment_file_name, Directory};
use crate::core::util::fst::{
    ByteSequenceOutput, ByteSequenceOutputFactory, BytesRefFSTIterator, FstBuilder, FST,
};
use crate::error::{ErrorKind, Result};

use std::cmp::min;
use std::mem;

/// Suggested default value for the minimum number of entries per block.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 25;

/// Suggested default value for the maximum number of entries per block.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 48;

/// Block-based terms index and dictionary writer.
///
/// Writes the terms dict and index, block-encoding (column stride) each
/// term's metadata for each set of terms between two index terms.
///
/// Files:
/// - .tim: Term Dictionary
/// - .tip: Term Index
///
/// ### Term Dictionary
///
/// The .tim file contains the list of terms in each field along with
/// per-term statistics (such as docfreq) and per-term metadata (typically
/// pointers to the postings list for that term in the inverted index).
///
/// The .tim is arranged in blocks: with blocks containing a variable number
/// of entries (by default 25-48), where each entry is either a term or a
/// reference to a sub-block.
///
/// NOTE: The term dictionary can plug into different postings
/// implementations: the postings writer/reader are actually responsible
/// for encoding and decoding the PostingsHeader and TermMetadata sections.
///
/// - TermsDict (.tim) --> Header, <i>PostingsHeader</i>,
///   NodeBlock<sup>NumBlocks</sup>, FieldSummary, DirOffset, Footer
/// - NodeBlock --> (OuterNode | InnerNode)
/// - OuterNode --> EntryCount, SuffixLength, Byte<sup>SuffixLength</sup>,
///   StatsLength, <TermStats><sup>EntryCount</sup>, MetaLength,
///   <<i>TermMetadata</i>><sup>EntryCount</sup>
/// - InnerNode --> EntryCount, SuffixLength[,Sub?],
///   Byte<sup>SuffixLength</sup>, StatsLength,
///   <TermStats?><sup>EntryCount</sup>, MetaLength,
///   <<i>TermMetadata?</i>><sup>EntryCount</sup>
/// - TermStats --> DocFreq, TotalTermFreq
/// - FieldSummary --> NumFields, <FieldNumber, NumTerms, RootCodeLength,
///   Byte<sup>RootCodeLength</sup>, SumTotalTermFreq?, SumDocFreq,
///   DocCount, LongsSize, MinTerm, MaxTerm><sup>NumFields</sup>
/// - DirOffset --> Uint64
/// - MinTerm,MaxTerm --> VInt length followed by the bytes
/// Notes:
///    - Header is a CodecHeader storing the version information for the
///      BlockTree implementation.
///    - DirOffset is a pointer to the FieldSummary section.
///    - DocFreq is the count of documents which contain the term.
///    - TotalTermFreq is the total number of occurrences of the term. This
///      is encoded as the difference between the total number of
///      occurrences and the DocFreq.
///    - FieldNumber is the field's number in the segment.
///    - NumTerms is the number of unique terms for the field.
///    - RootCode points to the root block for the field.
///    - SumDocFreq is the total number of postings, the number of
///      term-document pairs across the entire field.
///    - DocCount is the number of documents that have at least one posting
///      for this field.
///    - LongsSize records how many long values the postings writer/reader
///      record per term (e.g., to hold freq/prox/doc file offsets).
///    - MinTerm, MaxTerm are the lowest and highest term in this field.
///    - PostingsHeader and TermMetadata are plugged into by the specific
///      postings implementation: these contain arbitrary per-file data
///      (such as parameters or versioning information) and per-term data
///      (such as pointers to inverted files).
///    - For inner nodes of the tree, every entry will steal one bit to mark
///      whether it points to child nodes (sub-block). If so, the
///      corresponding TermStats and TermMetadata are omitted.
///
/// ### Term Index
///
/// The .tip file contains an index into the term dictionary, so that it can
/// be accessed randomly. The index is also used to determine when a given
/// term cannot exist on disk (in the .tim file), saving a disk seek.
/// - TermsIndex (.tip) --> Header, FSTIndex<sup>NumFields</sup>,
///   <IndexStartFP><sup>NumFields</sup>, DirOffset, Footer
/// - IndexStartFP --> VLong
/// - DirOffset --> Uint64
/// Notes:
///   - The .tip file contains a separate FST for each field. The FST maps
///     a term prefix to the on-disk block that holds all terms starting
///     with that prefix. Each field's IndexStartFP points to its FST.
///   - DirOffset is a pointer to the start of the IndexStartFPs for all
///     fields.
///   - It's possible that an on-disk block would contain too many terms
///     (more than the allowed maximum, default 48). When this happens, the
///     block is sub-divided into new blocks (called "floor blocks"), and
///     then the output in the FST for the block's prefix encodes the
///     leading byte of each sub-block, and its file pointer.
pub struct BlockTreeTermsWriter<T: PostingsWriterBase, O: IndexOutput> {
    terms_out: O,
    index_out: O,
    min_items_in_block: usize,
    max_items_in_block: usize,
    postings_writer: T,
    fields: Vec<FieldMetaData>,
    scratch_bytes: RAMOutputStream,
    closed: bool,
}

impl<T: PostingsWriterBase, O: IndexOutput> BlockTreeTermsWriter<T, O> {
    pub fn new<D: Directory<Output = O>>(
        state: &SegmentWriteState<'_, D>,
        postings_writer: T,
        min_items_in_block: usize,
        max_items_in_block: usize,
    ) -> Result<BlockTreeTermsWriter<T, O>> {
        Self::validate_settings(min_items_in_block, max_items_in_block)?;

        let terms_name = segment_file_name(
            &state.segment_name,
            &state.segment_suffix,
            TERMS_EXTENSION,
        );
        let mut terms_out = state.directory.create_output(&terms_name)?;
        write_index_header(
            &mut terms_out,
            TERMS_CODEC_NAME,
            VERSION_CURRENT,
            &state.segment_id,
            &state.segment_suffix,
        )?;

        let index_name = segment_file_name(
            &state.segment_name,
            &state.segment_suffix,
            TERMS_INDEX_EXTENSION,
        );
        let mut index_out = state.directory.create_output(&index_name)?;
        write_index_header(
            &mut index_out,
            TERMS_INDEX_CODEC_NAME,
            VERSION_CURRENT,
            &state.segment_id,
            &state.segment_suffix,
        )?;

        let mut postings_writer = postings_writer;
        postings_writer.init(&mut terms_out)?;

        Ok(BlockTreeTermsWriter {
            terms_out,
            index_out,
            min_items_in_block,
            max_items_in_block,
            postings_writer,
            fields: vec![],
            scratch_bytes: RAMOutputStream::new(false),
            closed: false,
        })
    }

    fn validate_settings(min_items_in_block: usize, max_items_in_block: usize) -> Result<()> {
        if min_items_in_block <= 1 {
            bail!(ErrorKind::IllegalArgument(format!(
                "min_items_in_block must be >= 2; got {}",
                min_items_in_block
            )));
        }
        if max_items_in_block < 1 {
            bail!(ErrorKind::IllegalArgument(format!(
                "max_items_in_block must be >= 1; got {}",
                max_items_in_block
            )));
        }
        if min_items_in_block > max_items_in_block {
            bail!(ErrorKind::IllegalArgument(format!(
                "max_items_in_block must be >= min_items_in_block; got min {} and max {}",
                min_items_in_block, max_items_in_block
            )));
        }
        if 2 * (min_items_in_block - 1) > max_items_in_block {
            bail!(ErrorKind::IllegalArgument(format!(
                "max_items_in_block must be at least 2 * (min_items_in_block - 1); got min {} \
                 and max {}",
                min_items_in_block, max_items_in_block
            )));
        }
        Ok(())
    }

    /// Starts consuming the sorted terms of one field. Fields must be
    /// handed over one at a time and in increasing field-name order if the
    /// segment is to be readable alongside other per-field structures.
    pub fn start_field(&mut self, field_info: FieldInfo) -> TermsWriter<'_, T, O> {
        TermsWriter::new(field_info, self)
    }

    /// Writes the trailing field directory into both files and closes the
    /// postings writer. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let dir_start = self.terms_out.file_pointer();
        let index_dir_start = self.index_out.file_pointer();

        self.terms_out.write_vint(self.fields.len() as i32)?;

        let fields = mem::replace(&mut self.fields, vec![]);
        for field in &fields {
            self.terms_out.write_vint(field.field_info.number as i32)?;
            debug_assert!(field.num_terms > 0);
            self.terms_out.write_vlong(field.num_terms)?;
            self.terms_out.write_vint(field.root_code.len() as i32)?;
            self.terms_out
                .write_bytes(&field.root_code, 0, field.root_code.len())?;
            if field.field_info.index_options.has_freqs() {
                self.terms_out.write_vlong(field.sum_total_term_freq)?;
            }
            self.terms_out.write_vlong(field.sum_doc_freq)?;
            self.terms_out.write_vint(field.doc_count)?;
            self.terms_out.write_vint(field.longs_size as i32)?;
            self.index_out.write_vlong(field.index_start_fp)?;
            Self::write_bytes_ref(&mut self.terms_out, &field.min_term)?;
            Self::write_bytes_ref(&mut self.terms_out, &field.max_term)?;
        }
        Self::write_trailer(&mut self.terms_out, dir_start)?;
        write_footer(&mut self.terms_out)?;
        Self::write_trailer(&mut self.index_out, index_dir_start)?;
        write_footer(&mut self.index_out)?;

        self.postings_writer.close()
    }

    fn write_trailer(out: &mut impl IndexOutput, dir_start: i64) -> Result<()> {
        out.write_long(dir_start)
    }

    fn write_bytes_ref(out: &mut impl IndexOutput, bytes: &[u8]) -> Result<()> {
        out.write_vint(bytes.len() as i32)?;
        out.write_bytes(bytes, 0, bytes.len())
    }
}

impl<T: PostingsWriterBase, O: IndexOutput> Drop for BlockTreeTermsWriter<T, O> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("drop BlockTreeTermsWriter failed by '{:?}'", e);
        }
    }
}

struct FieldMetaData {
    field_info: FieldInfo,
    root_code: Vec<u8>,
    num_terms: i64,
    index_start_fp: i64,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    doc_count: i32,
    longs_size: usize,
    min_term: Vec<u8>,
    max_term: Vec<u8>,
}

/// Consumes one field's sorted terms and forms its dictionary blocks and
/// index FST.
pub struct TermsWriter<'a, T: PostingsWriterBase, O: IndexOutput> {
    field_info: FieldInfo,
    num_terms: i64,
    index_start_fp: i64,
    last_term: Vec<u8>,
    prefix_starts: Vec<usize>,
    longs: Vec<i64>,
    longs_size: usize,
    // Pending stack of terms and blocks. As terms arrive (in sorted order)
    // we append to this stack, and once the top of the stack has enough
    // terms starting with a common prefix, we write a new block with those
    // terms and replace them in the stack with the new block:
    pending: Vec<PendingEntry>,
    // reused in write_blocks
    new_blocks: Vec<PendingBlock>,
    first_pending_term: Option<Vec<u8>>,
    last_pending_term: Option<Vec<u8>>,

    suffix_writer: RAMOutputStream,
    stats_writer: RAMOutputStream,
    meta_writer: RAMOutputStream,
    bytes_writer: RAMOutputStream,

    block_tree_writer: &'a mut BlockTreeTermsWriter<T, O>,
}

impl<'a, T: PostingsWriterBase, O: IndexOutput> TermsWriter<'a, T, O> {
    fn new(field_info: FieldInfo, block_tree_writer: &'a mut BlockTreeTermsWriter<T, O>) -> Self {
        let longs_size = block_tree_writer.postings_writer.set_field(&field_info) as usize;
        let longs = vec![0i64; longs_size];
        TermsWriter {
            field_info,
            longs_size,
            longs,
            num_terms: 0,
            index_start_fp: 0,
            last_term: vec![],
            prefix_starts: vec![0usize; 8],
            pending: vec![],
            new_blocks: vec![],
            first_pending_term: None,
            last_pending_term: None,
            suffix_writer: RAMOutputStream::new(false),
            stats_writer: RAMOutputStream::new(false),
            meta_writer: RAMOutputStream::new(false),
            bytes_writer: RAMOutputStream::new(false),
            block_tree_writer,
        }
    }

    /// Begins one term. `text` must be strictly greater than the previous
    /// term of this field. Returns the postings consumer the caller feeds
    /// the term's postings into before `finish_term`.
    pub fn start_term(&mut self, text: &[u8]) -> Result<&mut T> {
        if self.num_terms > 0 && text <= self.last_term.as_slice() {
            bail!(ErrorKind::IllegalArgument(format!(
                "terms out of order: {:?} <= {:?}",
                text, self.last_term
            )));
        }
        self.block_tree_writer.postings_writer.start_term()?;
        Ok(&mut self.block_tree_writer.postings_writer)
    }

    /// Seals one term: records its stats and metadata and pushes it onto
    /// the pending stack, forming blocks for any abandoned prefixes.
    pub fn finish_term(&mut self, text: &[u8], stats: &TermStats) -> Result<()> {
        if stats.doc_freq <= 0 {
            bail!(ErrorKind::IllegalArgument(format!(
                "doc_freq must be > 0; got {} for term {:?}",
                stats.doc_freq, text
            )));
        }
        let has_freqs = self.field_info.index_options.has_freqs();
        if has_freqs && stats.total_term_freq < i64::from(stats.doc_freq) {
            bail!(ErrorKind::IllegalArgument(format!(
                "total_term_freq {} is smaller than doc_freq {} for term {:?}",
                stats.total_term_freq, stats.doc_freq, text
            )));
        }

        self.push_term(text)?;

        let mut state = BlockTermState::new();
        state.doc_freq = stats.doc_freq;
        state.total_term_freq = if has_freqs { stats.total_term_freq } else { -1 };
        self.block_tree_writer.postings_writer.finish_term(&mut state)?;

        self.pending
            .push(PendingEntry::Term(PendingTerm::new(text.to_vec(), state)));
        self.num_terms += 1;
        if self.first_pending_term.is_none() {
            self.first_pending_term = Some(text.to_vec());
        }
        self.last_pending_term = Some(text.to_vec());
        Ok(())
    }

    /// Pushes the new term onto the prefix-run bookkeeping and writes new
    /// blocks for every abandoned prefix that accumulated enough entries.
    fn push_term(&mut self, text: &[u8]) -> Result<()> {
        let limit = min(self.last_term.len(), text.len());

        // find common prefix between last term and current term
        let mut pos = 0;
        while pos < limit && self.last_term[pos] == text[pos] {
            pos += 1;
        }

        // close the "abandoned" suffix now
        let last_term_len = self.last_term.len();
        for i in 0..last_term_len - pos {
            // how many items on top of the stack share the prefix we are
            // closing
            let idx = last_term_len - 1 - i;
            let prefix_top_size = self.pending.len() - self.prefix_starts[idx];
            if prefix_top_size >= self.block_tree_writer.min_items_in_block {
                self.write_blocks(idx + 1, prefix_top_size)?;
                self.prefix_starts[idx] =
                    self.prefix_starts[idx].wrapping_sub(prefix_top_size - 1);
            }
        }

        if self.prefix_starts.len() < text.len() {
            self.prefix_starts.resize(text.len(), 0usize);
        }

        // init new tail
        let pending_len = self.pending.len();
        for i in pos..text.len() {
            self.prefix_starts[i] = pending_len;
        }

        self.last_term.clear();
        self.last_term.extend_from_slice(text);
        Ok(())
    }

    /// Writes the top `count` entries of the pending stack as one block, or
    /// as several floor blocks when the slice does not fit `max_items`, and
    /// replaces them with a single pending block carrying the compiled
    /// index of the whole group.
    fn write_blocks(&mut self, prefix_length: usize, count: usize) -> Result<()> {
        debug_assert!(prefix_length > 0 || count == self.pending.len());

        let mut last_suffix_lead_label = -1;

        // true if we saw at least one term in this block (we record if a
        // block only points to sub-blocks in the terms index so a reader
        // can avoid seeking to it when it is looking for a term)
        let mut has_terms = false;
        let mut has_sub_blocks = false;

        let start = self.pending.len() - count;
        let end = self.pending.len();
        let mut next_block_start = start;
        let mut next_floor_lead_label = -1;

        for i in start..end {
            let is_term_entry: bool;
            let suffix_lead_label = match self.pending[i] {
                PendingEntry::Term(ref term) => {
                    is_term_entry = true;
                    if term.term_bytes.len() == prefix_length {
                        // suffix is 0, ie prefix 'foo' and term is 'foo' so
                        // the term has empty string suffix in this block
                        debug_assert_eq!(last_suffix_lead_label, -1);
                        -1
                    } else {
                        i32::from(term.term_bytes[prefix_length])
                    }
                }
                PendingEntry::Block(ref block) => {
                    is_term_entry = false;
                    debug_assert!(block.prefix.len() > prefix_length);
                    i32::from(block.prefix[prefix_length])
                }
            };

            if suffix_lead_label != last_suffix_lead_label {
                let items_in_block = i - next_block_start;
                if items_in_block >= self.block_tree_writer.min_items_in_block
                    && end - next_block_start > self.block_tree_writer.max_items_in_block
                {
                    // the count is too large for one block, so we must
                    // break it into "floor" blocks, where we record the
                    // leading label of the suffix of the first term in
                    // each floor block, so at search time we can jump to
                    // the right floor block. We just use a naive greedy
                    // segmenter here: make a new floor block as soon as we
                    // have at least min_items_in_block. This is not always
                    // best: it often produces a too-small block as the
                    // final block
                    let is_floor = items_in_block < count;
                    let new_block = self.write_block(
                        prefix_length,
                        is_floor,
                        next_floor_lead_label,
                        next_block_start,
                        i,
                        has_terms,
                        has_sub_blocks,
                    )?;
                    self.new_blocks.push(new_block);

                    has_terms = false;
                    has_sub_blocks = false;
                    next_floor_lead_label = suffix_lead_label;
                    next_block_start = i;
                }

                last_suffix_lead_label = suffix_lead_label;
            }

            if is_term_entry {
                has_terms = true;
            } else {
                has_sub_blocks = true;
            }
        }

        // write the last block, if any
        if next_block_start < end {
            let items_in_block = end - next_block_start;
            let is_floor = items_in_block < count;
            let new_block = self.write_block(
                prefix_length,
                is_floor,
                next_floor_lead_label,
                next_block_start,
                end,
                has_terms,
                has_sub_blocks,
            )?;
            self.new_blocks.push(new_block);
        }

        debug_assert!(!self.new_blocks.is_empty());
        debug_assert!(self.new_blocks[0].is_floor || self.new_blocks.len() == 1);
        let mut first_block = self.new_blocks.remove(0);
        first_block.compile_index(
            &mut self.new_blocks,
            &mut self.block_tree_writer.scratch_bytes,
        )?;

        // remove the slice we just wrote from the top of the pending stack
        // and replace it with the block carrying the group's index
        let new_size = self.pending.len() - count;
        self.pending.truncate(new_size);
        self.pending.push(PendingEntry::Block(first_block));

        self.new_blocks.clear();

        Ok(())
    }

    /// Writes the specified slice (start is inclusive, end is exclusive)
    /// from the pending stack as a new block. If is_floor is true, there
    /// were too many (more than max_items_in_block) entries sharing the
    /// same prefix, and so we broke it into multiple floor blocks where we
    /// record the starting label of the suffix of each floor block.
    #[allow(clippy::too_many_arguments)]
    fn write_block(
        &mut self,
        prefix_length: usize,
        is_floor: bool,
        floor_lead_label: i32,
        start: usize,
        end: usize,
        has_terms: bool,
        has_sub_blocks: bool,
    ) -> Result<PendingBlock> {
        debug_assert!(end > start);

        let start_fp = self.block_tree_writer.terms_out.file_pointer();
        let has_floor_lead_label = is_floor && floor_lead_label != -1;

        let mut prefix = self.last_term[0..prefix_length].to_vec();

        let num_entries = end - start;
        let mut code = num_entries << 1;
        if end == self.pending.len() {
            // last block of this group
            code |= 1;
        }
        self.block_tree_writer.terms_out.write_vint(code as i32)?;

        // 1st pass: pack the term suffix bytes into a blob
        // TODO: cut over to a bulk int codec for the suffix lengths

        // we optimize the leaf block case (block has only terms), writing
        // a more compact format in this case
        let is_leaf_block = !has_sub_blocks;
        let mut sub_indices = Vec::new();
        let mut absolute = true;

        if is_leaf_block {
            // block contains only ordinary terms
            for i in start..end {
                match self.pending[i] {
                    PendingEntry::Term(ref term) => {
                        debug_assert!(term.term_bytes.starts_with(&prefix));
                        let suffix = term.term_bytes.len() - prefix_length;
                        debug_assert!(
                            floor_lead_label == -1
                                || i32::from(term.term_bytes[prefix_length]) >= floor_lead_label
                        );

                        // for leaf blocks we write the suffix straight
                        self.suffix_writer.write_vint(suffix as i32)?;
                        self.suffix_writer
                            .write_bytes(&term.term_bytes, prefix_length, suffix)?;

                        // write term stats, to a separate blob
                        self.stats_writer.write_vint(term.state.doc_freq)?;
                        if self.field_info.index_options.has_freqs() {
                            debug_assert!(
                                term.state.total_term_freq >= i64::from(term.state.doc_freq)
                            );
                            self.stats_writer.write_vlong(
                                term.state.total_term_freq - i64::from(term.state.doc_freq),
                            )?;
                        }

                        // write term metadata
                        self.block_tree_writer.postings_writer.encode_term(
                            &mut self.longs,
                            &mut self.bytes_writer,
                            &self.field_info,
                            &term.state,
                            absolute,
                        )?;
                        for pos in 0..self.longs_size {
                            debug_assert!(self.longs[pos] >= 0);
                            self.meta_writer.write_vlong(self.longs[pos])?;
                        }
                        self.bytes_writer.write_to(&mut self.meta_writer)?;
                        self.bytes_writer.reset();
                        absolute = false;
                    }
                    PendingEntry::Block(_) => unreachable!(),
                }
            }
        } else {
            // block has at least one prefix term or a sub block
            for i in start..end {
                match self.pending[i] {
                    PendingEntry::Term(ref term) => {
                        debug_assert!(term.term_bytes.starts_with(&prefix));
                        let suffix = term.term_bytes.len() - prefix_length;

                        // for non-leaf blocks we steal one bit to record
                        // whether the entry is a term or a sub-block; terms
                        // cannot be larger than ~32 KB so we won't run out
                        // of bits
                        self.suffix_writer.write_vint((suffix << 1) as i32)?;
                        self.suffix_writer
                            .write_bytes(&term.term_bytes, prefix_length, suffix)?;

                        // write term stats, to a separate blob
                        self.stats_writer.write_vint(term.state.doc_freq)?;
                        if self.field_info.index_options.has_freqs() {
                            debug_assert!(
                                term.state.total_term_freq >= i64::from(term.state.doc_freq)
                            );
                            self.stats_writer.write_vlong(
                                term.state.total_term_freq - i64::from(term.state.doc_freq),
                            )?;
                        }

                        // TODO: now that the terms dict "sees" these longs,
                        // we could explore better column-stride encodings
                        // to encode all long[0]s for this block at once,
                        // all long[1]s, etc.

                        // write term metadata
                        self.block_tree_writer.postings_writer.encode_term(
                            &mut self.longs,
                            &mut self.bytes_writer,
                            &self.field_info,
                            &term.state,
                            absolute,
                        )?;
                        for pos in 0..self.longs_size {
                            debug_assert!(self.longs[pos] >= 0);
                            self.meta_writer.write_vlong(self.longs[pos])?;
                        }
                        self.bytes_writer.write_to(&mut self.meta_writer)?;
                        self.bytes_writer.reset();
                        absolute = false;
                    }
                    PendingEntry::Block(ref mut block) => {
                        debug_assert!(block.prefix.starts_with(&prefix));
                        let suffix = block.prefix.len() - prefix_length;
                        debug_assert!(suffix > 0);

                        self.suffix_writer.write_vint(((suffix << 1) | 1) as i32)?;
                        self.suffix_writer
                            .write_bytes(&block.prefix, prefix_length, suffix)?;

                        debug_assert!(
                            floor_lead_label == -1
                                || i32::from(block.prefix[prefix_length]) >= floor_lead_label
                        );
                        debug_assert!(block.fp < start_fp);

                        self.suffix_writer.write_vlong(start_fp - block.fp)?;
                        debug_assert!(block.index.is_some());
                        sub_indices.push(block.index.take().unwrap());
                    }
                }
            }
            debug_assert!(!sub_indices.is_empty());
        }

        // TODO: we could block-encode the suffix pointers; this would take
        // more space but would enable binary search on lookup

        // write the suffixes blob
        let suffix_header =
            ((self.suffix_writer.file_pointer() << 1) as i32) + if is_leaf_block { 1 } else { 0 };
        self.block_tree_writer.terms_out.write_vint(suffix_header)?;
        self.suffix_writer
            .write_to(&mut self.block_tree_writer.terms_out)?;
        self.suffix_writer.reset();

        // write the term stats blob
        self.block_tree_writer
            .terms_out
            .write_vint(self.stats_writer.file_pointer() as i32)?;
        self.stats_writer
            .write_to(&mut self.block_tree_writer.terms_out)?;
        self.stats_writer.reset();

        // write the term metadata blob
        self.block_tree_writer
            .terms_out
            .write_vint(self.meta_writer.file_pointer() as i32)?;
        self.meta_writer
            .write_to(&mut self.block_tree_writer.terms_out)?;
        self.meta_writer.reset();

        if has_floor_lead_label {
            prefix.push(floor_lead_label as u8);
        }

        Ok(PendingBlock::new(
            prefix,
            start_fp,
            has_terms,
            is_floor,
            floor_lead_label,
            sub_indices,
        ))
    }

    /// Finishes all terms of this field: closes every open suffix, writes
    /// the degenerate root block, saves the field's FST into the terms
    /// index and registers the field's summary.
    pub fn finish(
        mut self,
        sum_total_term_freq: i64,
        sum_doc_freq: i64,
        doc_count: i32,
    ) -> Result<()> {
        if self.num_terms > 0 {
            // add the empty term to force closing of all final blocks
            self.push_term(&[])?;

            // TODO: if pending.len() is already 1 with a non-zero prefix
            // length we could save writing a "degenerate" root block, but
            // we'd have to fix all the places that assume the root block's
            // prefix is the empty string
            self.push_term(&[])?;
            let pending_len = self.pending.len();
            self.write_blocks(0, pending_len)?;

            // we better have one final "root" block
            debug_assert_eq!(self.pending.len(), 1);
            let mut root = match self.pending.remove(0) {
                PendingEntry::Block(block) => block,
                PendingEntry::Term(_) => unreachable!(),
            };
            debug_assert!(root.prefix.is_empty());
            let root_index = match root.index.take() {
                Some(index) => index,
                None => unreachable!(),
            };
            debug_assert!(root_index.empty_output.is_some());

            let root_code = match root_index.empty_output {
                Some(ref output) => output.inner().to_vec(),
                None => unreachable!(),
            };

            // write the field's fst to the index
            self.index_start_fp = self.block_tree_writer.index_out.file_pointer();
            root_index.save(&mut self.block_tree_writer.index_out)?;

            debug_assert!(self.first_pending_term.is_some());
            let min_term = self.first_pending_term.take().unwrap();
            debug_assert!(self.last_pending_term.is_some());
            let max_term = self.last_pending_term.take().unwrap();

            let meta = FieldMetaData {
                field_info: self.field_info.clone(),
                root_code,
                num_terms: self.num_terms,
                index_start_fp: self.index_start_fp,
                sum_total_term_freq,
                sum_doc_freq,
                doc_count,
                longs_size: self.longs_size,
                min_term,
                max_term,
            };
            self.block_tree_writer.fields.push(meta);
        } else {
            debug_assert!(
                sum_total_term_freq == 0
                    || !self.field_info.index_options.has_freqs() && sum_total_term_freq == -1
            );
            debug_assert_eq!(sum_doc_freq, 0);
            debug_assert_eq!(doc_count, 0);
        }
        Ok(())
    }
}

enum PendingEntry {
    Term(PendingTerm),
    Block(PendingBlock),
}

struct PendingTerm {
    term_bytes: Vec<u8>,
    state: BlockTermState,
}

impl PendingTerm {
    fn new(term_bytes: Vec<u8>, state: BlockTermState) -> Self {
        PendingTerm { term_bytes, state }
    }
}

struct PendingBlock {
    prefix: Vec<u8>,
    fp: i64,
    has_terms: bool,
    is_floor: bool,
    floor_lead_byte: i32,
    index: Option<FST<ByteSequenceOutputFactory>>,
    sub_indices: Vec<FST<ByteSequenceOutputFactory>>,
}

impl PendingBlock {
    fn new(
        prefix: Vec<u8>,
        fp: i64,
        has_terms: bool,
        is_floor: bool,
        floor_lead_byte: i32,
        sub_indices: Vec<FST<ByteSequenceOutputFactory>>,
    ) -> Self {
        PendingBlock {
            prefix,
            fp,
            has_terms,
            is_floor,
            floor_lead_byte,
            index: None,
            sub_indices,
        }
    }

    /// Builds the index FST of this block group: a root entry mapping the
    /// shared prefix to the encoded (fp, has_terms, is_floor) output plus,
    /// for floor groups, the routing table of the non-first siblings; the
    /// indices of all child blocks are folded in below it.
    ///
    /// `blocks` holds the floor siblings of `self` (`self` is the first
    /// block of its group and is not repeated in the list).
    fn compile_index(
        &mut self,
        blocks: &mut [PendingBlock],
        scratch_bytes: &mut RAMOutputStream,
    ) -> Result<()> {
        debug_assert!(
            (self.is_floor && !blocks.is_empty()) || (!self.is_floor && blocks.is_empty())
        );
        debug_assert_eq!(scratch_bytes.file_pointer(), 0);

        // TODO: try writing the leading vLong in MSB order (opposite of
        // what is done today), for better output sharing in the FST
        scratch_bytes.write_vlong(encode_output(self.fp, self.has_terms, self.is_floor))?;
        if self.is_floor {
            scratch_bytes.write_vint(blocks.len() as i32)?;
            for sub in blocks.iter() {
                debug_assert_ne!(sub.floor_lead_byte, -1);
                scratch_bytes.write_byte(sub.floor_lead_byte as u8)?;
                debug_assert!(sub.fp > self.fp);
                let flag = if sub.has_terms { 1 } else { 0 };
                scratch_bytes.write_vlong(((sub.fp - self.fp) << 1) | flag)?;
            }
        }

        let mut index_builder = FstBuilder::new(ByteSequenceOutputFactory::new());
        let root_output = scratch_bytes.bytes().to_vec();
        debug_assert!(!root_output.is_empty());
        index_builder.add(&self.prefix, ByteSequenceOutput::new(root_output))?;
        scratch_bytes.reset();

        // copy over the index for our own children, then for the children
        // of all other floor siblings
        for sub_index in self.sub_indices.drain(..) {
            Self::append(&mut index_builder, sub_index)?;
        }
        for block in blocks {
            for sub_index in block.sub_indices.drain(..) {
                Self::append(&mut index_builder, sub_index)?;
            }
        }

        self.index = index_builder.finish()?;
        debug_assert!(self.sub_indices.is_empty());
        Ok(())
    }

    // TODO: maybe the FST builder could grow a bulk-add method that unions
    // a whole FST with the one under construction
    fn append(
        builder: &mut FstBuilder<ByteSequenceOutputFactory>,
        sub_index: FST<ByteSequenceOutputFactory>,
    ) -> Result<()> {
        let mut fst_iterator = BytesRefFSTIterator::new(sub_index);
        while let Some((input, output)) = fst_iterator.next()? {
            builder.add(input, output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::codec_util::{
        check_footer, check_header, check_index_header, footer_length, write_header, ID_LENGTH,
    };
    use crate::core::codec::IndexOptions;
    use crate::core::store::io::{ByteArrayDataInput, DataInput};
    use crate::core::store::FsDirectory;

    use std::fs;

    use tempfile::TempDir;

    const MOCK_POSTINGS_CODEC_NAME: &str = "MockPostings";

    /// Postings writer stub: pretends to write one byte of postings per
    /// document, records the resulting file pointer in one metadata long
    /// (delta-coded within a block) and echoes the doc freq as its generic
    /// metadata bytes.
    #[derive(Default)]
    struct MockPostingsWriter {
        next_fp: i64,
        last_fp: i64,
    }

    impl PostingsWriterBase for MockPostingsWriter {
        fn init(&mut self, terms_out: &mut impl IndexOutput) -> Result<()> {
            write_header(terms_out, MOCK_POSTINGS_CODEC_NAME, 0)
        }

        fn set_field(&mut self, _field_info: &FieldInfo) -> i32 {
            1
        }

        fn start_term(&mut self) -> Result<()> {
            Ok(())
        }

        fn finish_term(&mut self, state: &mut BlockTermState) -> Result<()> {
            state.doc_start_fp = self.next_fp;
            self.next_fp += i64::from(state.doc_freq);
            Ok(())
        }

        fn encode_term(
            &mut self,
            longs: &mut [i64],
            out: &mut impl DataOutput,
            _field_info: &FieldInfo,
            state: &BlockTermState,
            absolute: bool,
        ) -> Result<()> {
            if absolute {
                self.last_fp = 0;
            }
            longs[0] = state.doc_start_fp - self.last_fp;
            self.last_fp = state.doc_start_fp;
            out.write_vint(state.doc_freq)
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn segment_id() -> [u8; ID_LENGTH] {
        [11u8; ID_LENGTH]
    }

    fn field(name: &str, number: u32, options: IndexOptions) -> FieldInfo {
        FieldInfo::new(name.to_string(), number, options)
    }

    fn term(text: &str, doc_freq: i32, total_term_freq: i64) -> (Vec<u8>, TermStats) {
        (
            text.as_bytes().to_vec(),
            TermStats::new(doc_freq, total_term_freq),
        )
    }

    type FieldTerms = (FieldInfo, Vec<(Vec<u8>, TermStats)>);

    /// Writes one segment through the block-tree writer and returns the
    /// raw bytes of the .tim and .tip files.
    fn write_segment(
        fields: &[FieldTerms],
        min_items: usize,
        max_items: usize,
    ) -> (Vec<u8>, Vec<u8>) {
        let tmp = TempDir::new().unwrap();
        let directory = FsDirectory::new(tmp.path()).unwrap();
        {
            let state =
                SegmentWriteState::new(&directory, "_0".into(), "".into(), segment_id());
            let mut writer = BlockTreeTermsWriter::new(
                &state,
                MockPostingsWriter::default(),
                min_items,
                max_items,
            )
            .unwrap();
            for (field_info, terms) in fields {
                let has_freqs = field_info.index_options.has_freqs();
                let mut terms_writer = writer.start_field(field_info.clone());
                let mut sum_doc_freq = 0i64;
                let mut sum_total_term_freq = 0i64;
                for (bytes, stats) in terms {
                    terms_writer.start_term(bytes).unwrap();
                    terms_writer.finish_term(bytes, stats).unwrap();
                    sum_doc_freq += i64::from(stats.doc_freq);
                    sum_total_term_freq += stats.total_term_freq;
                }
                if terms.is_empty() {
                    terms_writer
                        .finish(if has_freqs { 0 } else { -1 }, 0, 0)
                        .unwrap();
                } else {
                    terms_writer
                        .finish(
                            if has_freqs { sum_total_term_freq } else { -1 },
                            sum_doc_freq,
                            sum_doc_freq as i32,
                        )
                        .unwrap();
                }
            }
            writer.close().unwrap();
        }
        let tim = fs::read(tmp.path().join("_0.tim")).unwrap();
        let tip = fs::read(tmp.path().join("_0.tip")).unwrap();
        (tim, tip)
    }

    #[derive(Debug, PartialEq)]
    struct ReadTerm {
        bytes: Vec<u8>,
        doc_freq: i32,
        total_term_freq: i64,
        doc_start_fp: i64,
        payload_doc_freq: i32,
    }

    struct BlockStat {
        fp: i64,
        entry_count: usize,
        is_leaf: bool,
        is_last_in_floor: bool,
    }

    /// Walks one chain of blocks starting at `fp` (a floor chain when the
    /// first block is not flagged last), descending into sub-blocks, and
    /// collects terms in order plus per-block shape information.
    fn parse_block_chain(
        tim: &[u8],
        fp: i64,
        prefix: &[u8],
        has_freqs: bool,
        terms: &mut Vec<ReadTerm>,
        blocks: &mut Vec<BlockStat>,
    ) {
        let mut pos = fp as usize;
        loop {
            let block_fp = pos as i64;
            let mut input = ByteArrayDataInput::new(tim);
            input.set_position(pos);

            let code = input.read_vint().unwrap();
            let entry_count = (code >> 1) as usize;
            let is_last_in_floor = (code & 1) == 1;
            assert!(entry_count > 0);

            let suffix_header = input.read_vint().unwrap();
            let suffix_len = (suffix_header >> 1) as usize;
            let is_leaf = (suffix_header & 1) == 1;
            let mut suffix_section = vec![0u8; suffix_len];
            input.read_bytes(&mut suffix_section, 0, suffix_len).unwrap();

            let stats_len = input.read_vint().unwrap() as usize;
            let mut stats_section = vec![0u8; stats_len];
            input.read_bytes(&mut stats_section, 0, stats_len).unwrap();

            let meta_len = input.read_vint().unwrap() as usize;
            let mut meta_section = vec![0u8; meta_len];
            input.read_bytes(&mut meta_section, 0, meta_len).unwrap();

            pos = input.position();

            let mut suffix_in = ByteArrayDataInput::new(&suffix_section[..]);
            let mut stats_in = ByteArrayDataInput::new(&stats_section[..]);
            let mut meta_in = ByteArrayDataInput::new(&meta_section[..]);
            let mut last_fp = 0i64;

            for _ in 0..entry_count {
                let (suffix_bytes_len, is_sub_block) = if is_leaf {
                    (suffix_in.read_vint().unwrap() as usize, false)
                } else {
                    let entry_code = suffix_in.read_vint().unwrap();
                    ((entry_code >> 1) as usize, (entry_code & 1) == 1)
                };
                let mut entry_bytes = prefix.to_vec();
                let start = entry_bytes.len();
                entry_bytes.resize(start + suffix_bytes_len, 0);
                suffix_in
                    .read_bytes(&mut entry_bytes, start, suffix_bytes_len)
                    .unwrap();

                if is_sub_block {
                    let fp_delta = suffix_in.read_vlong().unwrap();
                    assert!(fp_delta > 0, "sub-block fp must precede the parent's");
                    let child_fp = block_fp - fp_delta;
                    parse_block_chain(tim, child_fp, &entry_bytes, has_freqs, terms, blocks);
                } else {
                    let doc_freq = stats_in.read_vint().unwrap();
                    let total_term_freq = if has_freqs {
                        i64::from(doc_freq) + stats_in.read_vlong().unwrap()
                    } else {
                        -1
                    };
                    let doc_start_fp = last_fp + meta_in.read_vlong().unwrap();
                    last_fp = doc_start_fp;
                    let payload_doc_freq = meta_in.read_vint().unwrap();
                    terms.push(ReadTerm {
                        bytes: entry_bytes,
                        doc_freq,
                        total_term_freq,
                        doc_start_fp,
                        payload_doc_freq,
                    });
                }
            }
            assert!(suffix_in.eof());
            assert!(stats_in.eof());
            assert!(meta_in.eof());

            blocks.push(BlockStat {
                fp: block_fp,
                entry_count,
                is_leaf,
                is_last_in_floor,
            });
            if is_last_in_floor {
                return;
            }
        }
    }

    struct FieldSummary {
        field_number: u32,
        num_terms: i64,
        root_code: Vec<u8>,
        sum_total_term_freq: i64,
        sum_doc_freq: i64,
        doc_count: i32,
        longs_size: i32,
        min_term: Vec<u8>,
        max_term: Vec<u8>,
    }

    fn read_dir_start(file: &[u8]) -> i64 {
        let mut input = ByteArrayDataInput::new(file);
        input.set_position(file.len() - footer_length() - 8);
        input.read_long().unwrap()
    }

    fn read_field_summaries(tim: &[u8], has_freqs: &[bool]) -> Vec<FieldSummary> {
        let dir_start = read_dir_start(tim) as usize;
        let mut input = ByteArrayDataInput::new(tim);
        input.set_position(dir_start);
        let num_fields = input.read_vint().unwrap() as usize;
        assert_eq!(num_fields, has_freqs.len());
        let mut summaries = Vec::with_capacity(num_fields);
        for &field_has_freqs in has_freqs {
            let field_number = input.read_vint().unwrap() as u32;
            let num_terms = input.read_vlong().unwrap();
            let root_code_len = input.read_vint().unwrap() as usize;
            let mut root_code = vec![0u8; root_code_len];
            input.read_bytes(&mut root_code, 0, root_code_len).unwrap();
            let sum_total_term_freq = if field_has_freqs {
                input.read_vlong().unwrap()
            } else {
                -1
            };
            let sum_doc_freq = input.read_vlong().unwrap();
            let doc_count = input.read_vint().unwrap();
            let longs_size = input.read_vint().unwrap();
            let min_len = input.read_vint().unwrap() as usize;
            let mut min_term = vec![0u8; min_len];
            input.read_bytes(&mut min_term, 0, min_len).unwrap();
            let max_len = input.read_vint().unwrap() as usize;
            let mut max_term = vec![0u8; max_len];
            input.read_bytes(&mut max_term, 0, max_len).unwrap();
            summaries.push(FieldSummary {
                field_number,
                num_terms,
                root_code,
                sum_total_term_freq,
                sum_doc_freq,
                doc_count,
                longs_size,
                min_term,
                max_term,
            });
        }
        assert_eq!(input.position(), tim.len() - footer_length() - 8);
        summaries
    }

    fn read_index_start_fps(tip: &[u8], num_fields: usize) -> Vec<i64> {
        let dir_start = read_dir_start(tip) as usize;
        let mut input = ByteArrayDataInput::new(tip);
        input.set_position(dir_start);
        let fps: Vec<i64> = (0..num_fields)
            .map(|_| input.read_vlong().unwrap())
            .collect();
        assert_eq!(input.position(), tip.len() - footer_length() - 8);
        fps
    }

    fn load_fst(tip: &[u8], index_start_fp: i64) -> FST<ByteSequenceOutputFactory> {
        let mut input = ByteArrayDataInput::new(tip);
        input.set_position(index_start_fp as usize);
        FST::from_input(&mut input, ByteSequenceOutputFactory::new()).unwrap()
    }

    fn decode_root_code(root_code: &[u8]) -> (i64, bool, bool, Vec<(u8, i64, bool)>) {
        let mut input = ByteArrayDataInput::new(root_code);
        let (fp, has_terms, is_floor) = decode_output(input.read_vlong().unwrap());
        let mut floor_data = vec![];
        if is_floor {
            let num_siblings = input.read_vint().unwrap();
            for _ in 0..num_siblings {
                let lead = input.read_byte().unwrap();
                let code = input.read_vlong().unwrap();
                floor_data.push((lead, code >> 1, (code & 1) == 1));
            }
        }
        assert!(input.eof());
        (fp, has_terms, is_floor, floor_data)
    }

    fn check_file_framing(tim: &[u8], tip: &[u8]) {
        check_footer(tim).unwrap();
        check_footer(tip).unwrap();
        let mut input = ByteArrayDataInput::new(tim);
        check_index_header(
            &mut input,
            TERMS_CODEC_NAME,
            VERSION_START,
            VERSION_CURRENT,
            &segment_id(),
            "",
        )
        .unwrap();
        check_header(&mut input, MOCK_POSTINGS_CODEC_NAME, 0, 0).unwrap();
        let mut input = ByteArrayDataInput::new(tip);
        check_index_header(
            &mut input,
            TERMS_INDEX_CODEC_NAME,
            VERSION_START,
            VERSION_CURRENT,
            &segment_id(),
            "",
        )
        .unwrap();
    }

    /// Full read-back of a written segment: every field's terms with stats
    /// and metadata, summary agreement, FST/root-code agreement, and the
    /// block-size invariants.
    fn check_round_trip(
        tim: &[u8],
        tip: &[u8],
        fields: &[FieldTerms],
        max_items: usize,
    ) {
        check_file_framing(tim, tip);
        let non_empty: Vec<&FieldTerms> = fields.iter().filter(|f| !f.1.is_empty()).collect();
        let has_freqs: Vec<bool> = non_empty
            .iter()
            .map(|f| f.0.index_options.has_freqs())
            .collect();
        let summaries = read_field_summaries(tim, &has_freqs);
        let fps = read_index_start_fps(tip, summaries.len());

        // the mock codec numbers postings fps across the whole segment
        let mut expected_fp = 0i64;
        for (i, (field_info, terms)) in non_empty.iter().enumerate() {
            let summary = &summaries[i];
            assert_eq!(summary.field_number, field_info.number);
            assert_eq!(summary.num_terms, terms.len() as i64);
            assert_eq!(summary.longs_size, 1);
            assert_eq!(&summary.min_term[..], &terms[0].0[..]);
            assert_eq!(&summary.max_term[..], &terms[terms.len() - 1].0[..]);

            let expected_sum_df: i64 =
                terms.iter().map(|(_, s)| i64::from(s.doc_freq)).sum();
            assert_eq!(summary.sum_doc_freq, expected_sum_df);
            assert_eq!(summary.doc_count, expected_sum_df as i32);
            if has_freqs[i] {
                let expected_sum_ttf: i64 =
                    terms.iter().map(|(_, s)| s.total_term_freq).sum();
                assert_eq!(summary.sum_total_term_freq, expected_sum_ttf);
            }

            let fst = load_fst(tip, fps[i]);
            let fst_root = fst.get(b"").unwrap().unwrap();
            assert_eq!(fst_root.inner(), &summary.root_code[..]);

            let (root_fp, _, root_is_floor, floor_data) = decode_root_code(&summary.root_code);
            let mut read_terms = vec![];
            let mut blocks = vec![];
            parse_block_chain(
                tim,
                root_fp,
                b"",
                has_freqs[i],
                &mut read_terms,
                &mut blocks,
            );

            assert_eq!(read_terms.len(), terms.len());
            for (read, (bytes, stats)) in read_terms.iter().zip(terms.iter()) {
                assert_eq!(&read.bytes, bytes);
                assert_eq!(read.doc_freq, stats.doc_freq);
                if has_freqs[i] {
                    assert_eq!(read.total_term_freq, stats.total_term_freq);
                } else {
                    assert_eq!(read.total_term_freq, -1);
                }
                assert_eq!(read.doc_start_fp, expected_fp);
                assert_eq!(read.payload_doc_freq, stats.doc_freq);
                expected_fp += i64::from(stats.doc_freq);
            }

            for block in &blocks {
                assert!(block.entry_count <= max_items);
            }
            if root_is_floor {
                let leads: Vec<u8> = floor_data.iter().map(|f| f.0).collect();
                let mut sorted = leads.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(leads, sorted, "floor lead bytes must strictly increase");
            }
        }
    }

    #[test]
    fn test_validate_settings() {
        fn try_new(min_items: usize, max_items: usize) -> Result<()> {
            let tmp = TempDir::new().unwrap();
            let directory = FsDirectory::new(tmp.path()).unwrap();
            let state = SegmentWriteState::new(&directory, "_0".into(), "".into(), segment_id());
            BlockTreeTermsWriter::new(
                &state,
                MockPostingsWriter::default(),
                min_items,
                max_items,
            )
            .map(|_| ())
        }

        assert!(try_new(1, 48).is_err());
        assert!(try_new(0, 0).is_err());
        assert!(try_new(25, 24).is_err());
        assert!(try_new(26, 48).is_err()); // 2 * (26 - 1) > 48
        assert!(try_new(2, 2).is_ok());
        assert!(try_new(DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE).is_ok());
    }

    #[test]
    fn test_single_term_field() {
        let fields = vec![(
            field("body", 0, IndexOptions::DocsAndFreqs),
            vec![term("x", 3, 5)],
        )];
        let (tim, tip) = write_segment(&fields, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE);
        check_round_trip(&tim, &tip, &fields, DEFAULT_MAX_BLOCK_SIZE);

        let summaries = read_field_summaries(&tim, &[true]);
        let (root_fp, has_terms, is_floor, _) = decode_root_code(&summaries[0].root_code);
        assert!(has_terms);
        assert!(!is_floor);
        assert_eq!(&summaries[0].min_term[..], b"x");
        assert_eq!(&summaries[0].max_term[..], b"x");

        let mut terms = vec![];
        let mut blocks = vec![];
        parse_block_chain(&tim, root_fp, b"", true, &mut terms, &mut blocks);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].entry_count, 1);
        assert!(blocks[0].is_leaf);
        assert!(blocks[0].is_last_in_floor);
    }

    #[test]
    fn test_small_floor_blocks() {
        // five singleton terms with min=2/max=4 force one floor group:
        // {a,b} and {c,d,e} under the empty root prefix
        let fields = vec![(
            field("body", 0, IndexOptions::DocsAndFreqs),
            vec![
                term("a", 1, 1),
                term("b", 1, 1),
                term("c", 1, 1),
                term("d", 1, 1),
                term("e", 1, 1),
            ],
        )];
        let (tim, tip) = write_segment(&fields, 2, 4);
        check_round_trip(&tim, &tip, &fields, 4);

        let summaries = read_field_summaries(&tim, &[true]);
        let (root_fp, has_terms, is_floor, floor_data) =
            decode_root_code(&summaries[0].root_code);
        assert!(has_terms);
        assert!(is_floor);
        assert_eq!(floor_data.len(), 1);
        assert_eq!(floor_data[0].0, b'c');
        assert!(floor_data[0].2, "second floor block holds terms");

        let mut terms = vec![];
        let mut blocks = vec![];
        parse_block_chain(&tim, root_fp, b"", true, &mut terms, &mut blocks);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].entry_count, 2);
        assert!(!blocks[0].is_last_in_floor);
        assert_eq!(blocks[1].entry_count, 3);
        assert!(blocks[1].is_last_in_floor);
        // the floor table's fp delta routes to the second block
        assert_eq!(root_fp + floor_data[0].1, blocks[1].fp);
    }

    #[test]
    fn test_shared_prefix_becomes_block() {
        let fields = vec![(
            field("body", 0, IndexOptions::DocsAndFreqs),
            vec![
                term("apple", 1, 1),
                term("apricot", 2, 2),
                term("axle", 1, 3),
                term("banana", 1, 1),
            ],
        )];
        let (tim, tip) = write_segment(&fields, 2, 48);
        check_round_trip(&tim, &tip, &fields, 48);

        let summaries = read_field_summaries(&tim, &[true]);
        let (root_fp, _, is_floor, _) = decode_root_code(&summaries[0].root_code);
        assert!(!is_floor);

        let mut terms = vec![];
        let mut blocks = vec![];
        parse_block_chain(&tim, root_fp, b"", true, &mut terms, &mut blocks);
        // one inner block under prefix 'a' plus the root holding
        // {block(a), term(banana)}
        assert_eq!(blocks.len(), 2);
        let child = &blocks[0];
        let root = &blocks[1];
        assert_eq!(child.entry_count, 3);
        assert!(child.is_leaf);
        assert_eq!(root.entry_count, 2);
        assert!(!root.is_leaf);
        assert!(child.fp < root.fp);

        // the index maps the prefix 'a' to the child block
        let fst = load_fst(&tip, read_index_start_fps(&tip, 1)[0]);
        let output = fst.get(b"a").unwrap().unwrap();
        let mut out_in = ByteArrayDataInput::new(output.inner());
        let (child_fp, child_has_terms, child_is_floor) =
            decode_output(out_in.read_vlong().unwrap());
        assert_eq!(child_fp, child.fp);
        assert!(child_has_terms);
        assert!(!child_is_floor);
    }

    #[test]
    fn test_floor_split_of_large_prefix() {
        // 60 terms t0..t59 all under the prefix 't'; with min=25/max=48
        // the greedy segmenter cuts after the 34th entry (lead byte '4')
        let mut texts: Vec<String> = (0..60).map(|i| format!("t{}", i)).collect();
        texts.sort();
        let terms: Vec<(Vec<u8>, TermStats)> = texts
            .iter()
            .map(|t| (t.as_bytes().to_vec(), TermStats::new(1, 1)))
            .collect();
        let fields = vec![(field("body", 0, IndexOptions::DocsAndFreqs), terms)];
        let (tim, tip) = write_segment(&fields, 25, 48);
        check_round_trip(&tim, &tip, &fields, 48);

        let fst = load_fst(&tip, read_index_start_fps(&tip, 1)[0]);
        let output = fst.get(b"t").unwrap().unwrap();
        let (t_fp, t_has_terms, t_is_floor, floor_data) = decode_root_code(output.inner());
        assert!(t_has_terms);
        assert!(t_is_floor);
        assert_eq!(floor_data.len(), 1);
        assert_eq!(floor_data[0].0, b'4');

        let mut terms = vec![];
        let mut blocks = vec![];
        parse_block_chain(&tim, t_fp, b"t", true, &mut terms, &mut blocks);
        assert_eq!(terms.len(), 60);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].entry_count, 34);
        assert_eq!(blocks[1].entry_count, 26);
    }

    #[test]
    fn test_term_equal_to_block_prefix() {
        // "ap" is stored with an empty suffix inside the block rooted at
        // its own prefix, next to a nested "apr" sub-block
        let fields = vec![(
            field("body", 0, IndexOptions::DocsAndFreqs),
            vec![
                term("ap", 1, 1),
                term("apple", 1, 1),
                term("apricot", 1, 1),
                term("apron", 1, 1),
                term("b", 1, 1),
            ],
        )];
        let (tim, tip) = write_segment(&fields, 2, 48);
        check_round_trip(&tim, &tip, &fields, 48);
    }

    #[test]
    fn test_two_fields() {
        let fields = vec![
            (
                field("a", 0, IndexOptions::DocsAndFreqs),
                vec![term("left", 1, 1), term("right", 2, 4)],
            ),
            (
                field("b", 1, IndexOptions::DocsAndFreqs),
                vec![term("down", 3, 3), term("up", 1, 2)],
            ),
        ];
        let (tim, tip) = write_segment(&fields, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE);
        check_round_trip(&tim, &tip, &fields, DEFAULT_MAX_BLOCK_SIZE);

        let summaries = read_field_summaries(&tim, &[true, true]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].field_number, 0);
        assert_eq!(summaries[1].field_number, 1);
        let fps = read_index_start_fps(&tip, 2);
        assert!(fps[0] < fps[1]);
    }

    #[test]
    fn test_docs_only_field_omits_freqs() {
        let fields = vec![(
            field("flags", 2, IndexOptions::Docs),
            vec![term("no", 7, -1), term("yes", 4, -1)],
        )];
        let (tim, tip) = write_segment(&fields, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE);
        check_round_trip(&tim, &tip, &fields, DEFAULT_MAX_BLOCK_SIZE);

        let summaries = read_field_summaries(&tim, &[false]);
        assert_eq!(summaries[0].sum_total_term_freq, -1);
        assert_eq!(summaries[0].sum_doc_freq, 11);
    }

    #[test]
    fn test_empty_field_registers_nothing() {
        let fields = vec![
            (field("empty", 0, IndexOptions::Docs), vec![]),
            (
                field("body", 1, IndexOptions::DocsAndFreqs),
                vec![term("only", 1, 1)],
            ),
        ];
        let (tim, tip) = write_segment(&fields, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE);
        check_round_trip(&tim, &tip, &fields, DEFAULT_MAX_BLOCK_SIZE);
        let summaries = read_field_summaries(&tim, &[true]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].field_number, 1);
        assert_eq!(read_index_start_fps(&tip, 1).len(), 1);
    }

    #[test]
    fn test_deep_tree_round_trip() {
        // enough shared structure to force several levels of inner blocks
        let mut texts: Vec<String> = vec![];
        for a in &["w", "x", "y"] {
            for b in 0..10 {
                for c in 0..12 {
                    texts.push(format!("{}{:02}{:02}", a, b, c));
                }
            }
        }
        texts.sort();
        let terms: Vec<(Vec<u8>, TermStats)> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let doc_freq = (i % 5) as i32 + 1;
                (
                    t.as_bytes().to_vec(),
                    TermStats::new(doc_freq, i64::from(doc_freq) * 2),
                )
            })
            .collect();
        let fields = vec![(field("body", 0, IndexOptions::DocsAndFreqs), terms)];
        let (tim, tip) = write_segment(&fields, 4, 8);
        check_round_trip(&tim, &tip, &fields, 8);

        // every term must be reachable through the index: the FST output
        // for each term's longest indexed prefix points at a block chain
        // that contains the term
        let summaries = read_field_summaries(&tim, &[true]);
        let (root_fp, _, _, _) = decode_root_code(&summaries[0].root_code);
        let mut terms = vec![];
        let mut blocks = vec![];
        parse_block_chain(&tim, root_fp, b"", true, &mut terms, &mut blocks);
        let mut fps: Vec<i64> = blocks.iter().map(|b| b.fp).collect();
        let mut sorted = fps.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), fps.len(), "block fps are distinct");
        fps.sort();
        assert_eq!(fps, sorted);
    }

    #[test]
    fn test_out_of_order_terms_rejected() {
        let tmp = TempDir::new().unwrap();
        let directory = FsDirectory::new(tmp.path()).unwrap();
        let state = SegmentWriteState::new(&directory, "_0".into(), "".into(), segment_id());
        let mut writer = BlockTreeTermsWriter::new(
            &state,
            MockPostingsWriter::default(),
            DEFAULT_MIN_BLOCK_SIZE,
            DEFAULT_MAX_BLOCK_SIZE,
        )
        .unwrap();
        let mut terms_writer = writer.start_field(field("body", 0, IndexOptions::DocsAndFreqs));
        terms_writer.start_term(b"m").unwrap();
        terms_writer
            .finish_term(b"m", &TermStats::new(1, 1))
            .unwrap();
        assert!(terms_writer.start_term(b"m").is_err());
        assert!(terms_writer.start_term(b"a").is_err());
        assert!(terms_writer.start_term(b"n").is_ok());
    }

    #[test]
    fn test_bad_stats_rejected() {
        let tmp = TempDir::new().unwrap();
        let directory = FsDirectory::new(tmp.path()).unwrap();
        let state = SegmentWriteState::new(&directory, "_0".into(), "".into(), segment_id());
        let mut writer = BlockTreeTermsWriter::new(
            &state,
            MockPostingsWriter::default(),
            DEFAULT_MIN_BLOCK_SIZE,
            DEFAULT_MAX_BLOCK_SIZE,
        )
        .unwrap();
        let mut terms_writer = writer.start_field(field("body", 0, IndexOptions::DocsAndFreqs));
        terms_writer.start_term(b"a").unwrap();
        assert!(terms_writer
            .finish_term(b"a", &TermStats::new(0, 0))
            .is_err());
        assert!(terms_writer
            .finish_term(b"a", &TermStats::new(3, 2))
            .is_err());
        assert!(terms_writer
            .finish_term(b"a", &TermStats::new(3, 3))
            .is_ok());
    }

    #[test]
    fn test_corrupt_files_rejected() {
        let fields = vec![(
            field("body", 0, IndexOptions::DocsAndFreqs),
            vec![term("x", 1, 1)],
        )];
        let (tim, tip) = write_segment(&fields, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE);

        let mut corrupt = tim.clone();
        corrupt[30] ^= 0xff;
        assert!(check_footer(&corrupt).is_err());

        let mut input = ByteArrayDataInput::new(&tip[..]);
        assert!(check_index_header(
            &mut input,
            TERMS_CODEC_NAME, // wrong codec for a .tip file
            VERSION_START,
            VERSION_CURRENT,
            &segment_id(),
            "",
        )
        .is_err());
    }
}
