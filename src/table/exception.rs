use std::ops::Range;

use super::{split_at_pages, SparseSpecialTable};
use crate::alphabet::Alphabet;
use crate::blob::Blob;

/// Positions whose original character differs from its class representative
///
/// Each entry of the underlying table is a run of positions that all carry the
/// same sub-alphabet index, i.e. the same character from their class list.
#[derive(Debug)]
pub struct ExceptionTable {
    table: SparseSpecialTable<u32>,
    sub_index: Blob<u8>,
    representatives: Blob<u8>,
}

impl ExceptionTable {
    pub(crate) fn from_parts(
        table: SparseSpecialTable<u32>,
        sub_index: Blob<u8>,
        representatives: Blob<u8>,
    ) -> Self {
        debug_assert_eq!(table.num_entries(), sub_index.len());
        Self {
            table,
            sub_index,
            representatives,
        }
    }

    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.table.num_entries()
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        self.table.size_in_bytes() + self.sub_index.len() as u64 + self.representatives.len() as u64
    }

    /// Sub-alphabet index of the most frequent character of each class
    #[must_use]
    pub fn representatives(&self) -> &[u8] {
        &self.representatives
    }

    pub(crate) fn table(&self) -> &SparseSpecialTable<u32> {
        &self.table
    }

    pub(crate) fn sub_indices(&self) -> &Blob<u8> {
        &self.sub_index
    }

    pub(crate) fn representative_blob(&self) -> &Blob<u8> {
        &self.representatives
    }

    /// Sub-alphabet index recorded for `pos`, if it deviates from the representative
    #[must_use]
    pub fn exception_at(&self, pos: u64) -> Option<u8> {
        let (idx, page) = self.table.first_ending_after(pos)?;
        (self.table.range_at(idx, page).start <= pos).then(|| self.sub_index[idx])
    }

    /// Original character of a non-separator `code` at `pos`
    #[must_use]
    pub fn original_char(&self, alphabet: &Alphabet, code: u8, pos: u64) -> u8 {
        let class = alphabet.class_of(code);
        let sub = self
            .exception_at(pos)
            .unwrap_or(self.representatives[class]);
        alphabet.class_chars(class)[sub as usize]
    }
}

/// Collects exception runs during the encode pass
#[derive(Debug)]
pub(crate) struct ExceptionBuilder {
    representatives: Vec<u8>,
    runs: Vec<(Range<u64>, u8)>,
}

impl ExceptionBuilder {
    pub(crate) fn new(representatives: Vec<u8>) -> Self {
        Self {
            representatives,
            runs: Vec::new(),
        }
    }

    /// Records the sub-alphabet index of the character at `pos`
    pub(crate) fn push(&mut self, pos: u64, class: usize, sub: u8) {
        if self.representatives[class] == sub {
            return;
        }
        if let Some((run, last)) = self.runs.last_mut() {
            if run.end == pos && *last == sub {
                run.end += 1;
                return;
            }
        }
        self.runs.push((pos..pos + 1, sub));
    }

    pub(crate) fn finish(self, total_length: u64) -> ExceptionTable {
        let mut sub_index = Vec::with_capacity(self.runs.len());
        let mut pieces = Vec::with_capacity(self.runs.len());
        for (run, sub) in self.runs {
            for piece in split_at_pages(run, u32::BITS) {
                pieces.push(piece);
                sub_index.push(sub);
            }
        }
        ExceptionTable {
            table: SparseSpecialTable::from_runs(pieces, total_length),
            sub_index: sub_index.into(),
            representatives: self.representatives.into(),
        }
    }
}
