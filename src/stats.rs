//! The statistics pass
//!
//! Before anything is encoded the input is scanned once to learn its length,
//! its character distribution and the layout of its special characters. The cost
//! model in [`crate::access`] chooses an access strategy from these numbers.

use std::collections::BTreeMap;

use crate::alphabet::{Alphabet, SEPARATOR, WILDCARD};
use crate::table::TableWidth;

/// Counters describing the special characters of an encoded sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialCharInfo {
    /// Wildcards and separators
    pub special_characters: u64,
    /// Special ranges as stored by the chosen access strategy
    pub special_ranges: u64,
    /// Maximal runs of special characters
    pub real_special_ranges: u64,
    pub length_of_special_prefix: u64,
    pub length_of_special_suffix: u64,
    pub wildcards: u64,
    /// Wildcard ranges as stored by the chosen access strategy
    pub wildcard_ranges: u64,
    /// Maximal runs of wildcards
    pub real_wildcard_ranges: u64,
    pub length_of_wildcard_prefix: u64,
    pub length_of_wildcard_suffix: u64,
    pub separators: u64,
    /// Length of the longest run without special characters
    pub longest_non_special: u64,
}

impl SpecialCharInfo {
    pub(crate) const NUM_FIELDS: usize = 12;

    pub(crate) fn to_array(self) -> [u64; Self::NUM_FIELDS] {
        [
            self.special_characters,
            self.special_ranges,
            self.real_special_ranges,
            self.length_of_special_prefix,
            self.length_of_special_suffix,
            self.wildcards,
            self.wildcard_ranges,
            self.real_wildcard_ranges,
            self.length_of_wildcard_prefix,
            self.length_of_wildcard_suffix,
            self.separators,
            self.longest_non_special,
        ]
    }

    pub(crate) fn from_array(values: [u64; Self::NUM_FIELDS]) -> Self {
        Self {
            special_characters: values[0],
            special_ranges: values[1],
            real_special_ranges: values[2],
            length_of_special_prefix: values[3],
            length_of_special_suffix: values[4],
            wildcards: values[5],
            wildcard_ranges: values[6],
            real_wildcard_ranges: values[7],
            length_of_wildcard_prefix: values[8],
            length_of_wildcard_suffix: values[9],
            separators: values[10],
            longest_non_special: values[11],
        }
    }
}

/// Length of one input file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileLength {
    /// Symbols of the file, including separators between its sequences
    pub length: u64,
    /// Non-special symbols of the file
    pub effective_length: u64,
}

/// Everything learned in the statistics pass
#[derive(Debug, Clone, Default)]
pub struct SequenceStats {
    pub total_length: u64,
    pub num_sequences: u64,
    pub file_lengths: Vec<FileLength>,
    pub char_distribution: Vec<u64>,
    pub info: SpecialCharInfo,
    /// Every sequence has this length
    pub equal_length: Option<u64>,
    pub min_seq_len: u64,
    pub max_seq_len: u64,
    /// Number of special runs per run length
    pub special_run_histogram: BTreeMap<u64, u64>,
    /// Number of wildcard runs per run length
    pub wildcard_run_histogram: BTreeMap<u64, u64>,
    /// Wildcard table entries per table width, indexed like [`TableWidth::ALL`]
    pub wildcard_entries: [u64; 3],
    /// Separator table entries per table width
    pub separator_entries: [u64; 3],
    /// Occurrences of each character within its class, when collected
    pub class_counts: Option<Vec<Vec<u64>>>,
}

impl SequenceStats {
    pub(crate) fn wildcard_entries(&self, width: TableWidth) -> u64 {
        self.wildcard_entries[width.tag() as usize]
    }

    pub(crate) fn separator_entries(&self, width: TableWidth) -> u64 {
        self.separator_entries[width.tag() as usize]
    }

    /// Sub-alphabet index of the most frequent character of each class
    #[must_use]
    pub fn representatives(&self) -> Option<Vec<u8>> {
        let counts = self.class_counts.as_ref()?;
        Some(
            counts
                .iter()
                .map(|class| {
                    let mut best = 0usize;
                    for (idx, &count) in class.iter().enumerate() {
                        if count > class[best] {
                            best = idx;
                        }
                    }
                    best as u8
                })
                .collect(),
        )
    }
}

/// Accumulates [`SequenceStats`] symbol by symbol
#[derive(Debug)]
pub(crate) struct StatsCollector {
    stats: SequenceStats,
    pos: u64,
    special_run: u64,
    wildcard_run: u64,
    non_special_run: u64,
    current_seq_len: u64,
    same_length: bool,
    current_file: usize,
}

impl StatsCollector {
    pub(crate) fn new(alphabet: &Alphabet, lossless: bool) -> Self {
        let class_counts = lossless.then(|| {
            (0..alphabet.num_of_classes())
                .map(|class| vec![0; alphabet.class_chars(class).len()])
                .collect()
        });
        Self {
            stats: SequenceStats {
                char_distribution: vec![0; alphabet.num_of_chars() as usize],
                min_seq_len: u64::MAX,
                class_counts,
                file_lengths: vec![FileLength::default()],
                ..SequenceStats::default()
            },
            pos: 0,
            special_run: 0,
            wildcard_run: 0,
            non_special_run: 0,
            current_seq_len: 0,
            same_length: true,
            current_file: 0,
        }
    }

    /// Called before the first symbol of every sequence
    pub(crate) fn start_sequence(&mut self, file_index: usize) {
        if self.stats.num_sequences > 0 {
            self.finish_sequence();
            if file_index == self.current_file {
                self.stats.file_lengths[self.current_file].length += 1;
            }
            self.push_code(SEPARATOR);
        }
        while self.current_file < file_index {
            self.current_file += 1;
            self.stats.file_lengths.push(FileLength::default());
        }
        self.stats.num_sequences += 1;
        self.current_seq_len = 0;
    }

    fn finish_sequence(&mut self) {
        let len = self.current_seq_len;
        self.stats.min_seq_len = self.stats.min_seq_len.min(len);
        self.stats.max_seq_len = self.stats.max_seq_len.max(len);
        if self.stats.min_seq_len != self.stats.max_seq_len {
            self.same_length = false;
        }
    }

    /// Records one symbol of the current sequence
    pub(crate) fn push(&mut self, code: u8, class_and_sub: Option<(usize, u8)>) {
        self.current_seq_len += 1;
        let file = &mut self.stats.file_lengths[self.current_file];
        file.length += 1;
        if code < WILDCARD {
            file.effective_length += 1;
        }
        if let (Some(counts), Some((class, sub))) = (self.stats.class_counts.as_mut(), class_and_sub) {
            counts[class][sub as usize] += 1;
        }
        self.push_code(code);
    }

    fn push_code(&mut self, code: u8) {
        match code {
            WILDCARD => {
                self.close_non_special();
                self.special_run += 1;
                self.wildcard_run += 1;
                self.stats.info.wildcards += 1;
                self.stats.info.special_characters += 1;
            }
            SEPARATOR => {
                self.close_non_special();
                self.close_wildcard_run();
                self.special_run += 1;
                self.stats.info.separators += 1;
                self.stats.info.special_characters += 1;
                for width in TableWidth::ALL {
                    self.stats.separator_entries[width.tag() as usize] +=
                        width.entries_for_run(self.pos, 1);
                }
            }
            code => {
                self.close_special_run();
                self.close_wildcard_run();
                self.non_special_run += 1;
                self.stats.char_distribution[code as usize] += 1;
            }
        }
        self.pos += 1;
    }

    fn close_non_special(&mut self) {
        let info = &mut self.stats.info;
        info.longest_non_special = info.longest_non_special.max(self.non_special_run);
        self.non_special_run = 0;
    }

    fn close_special_run(&mut self) {
        if self.special_run == 0 {
            return;
        }
        let start = self.pos - self.special_run;
        if start == 0 {
            self.stats.info.length_of_special_prefix = self.special_run;
        }
        self.stats.info.real_special_ranges += 1;
        *self
            .stats
            .special_run_histogram
            .entry(self.special_run)
            .or_insert(0) += 1;
        self.special_run = 0;
    }

    fn close_wildcard_run(&mut self) {
        if self.wildcard_run == 0 {
            return;
        }
        let start = self.pos - self.wildcard_run;
        if start == 0 {
            self.stats.info.length_of_wildcard_prefix = self.wildcard_run;
        }
        self.stats.info.real_wildcard_ranges += 1;
        *self
            .stats
            .wildcard_run_histogram
            .entry(self.wildcard_run)
            .or_insert(0) += 1;
        for width in TableWidth::ALL {
            self.stats.wildcard_entries[width.tag() as usize] +=
                width.entries_for_run(start, self.wildcard_run);
        }
        self.wildcard_run = 0;
    }

    pub(crate) fn finish(mut self) -> SequenceStats {
        if self.stats.num_sequences > 0 {
            self.finish_sequence();
        }
        self.stats.info.length_of_special_suffix = self.special_run;
        self.stats.info.length_of_wildcard_suffix = self.wildcard_run;
        self.close_special_run();
        self.close_wildcard_run();
        self.close_non_special();
        self.stats.total_length = self.pos;
        self.stats.info.special_ranges = self.stats.info.real_special_ranges;
        self.stats.info.wildcard_ranges = self.stats.info.real_wildcard_ranges;
        if self.stats.num_sequences == 0 {
            self.stats.min_seq_len = 0;
        }
        self.stats.equal_length = (self.same_length && self.stats.num_sequences > 0)
            .then_some(self.stats.min_seq_len);
        self.stats
    }
}
