//! Sequence inputs
//!
//! A [`SequenceSource`] delivers records one at a time and can be rewound, since
//! building an encoded sequence reads the input twice.

use std::io::Read;
use std::path::{Path, PathBuf};

use auto_impl::auto_impl;
use seq_io::fasta;

use crate::Result;

/// A single input record
#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    /// Header line without the leading `>`
    pub description: Vec<u8>,
    /// Residues as found in the input
    pub sequence: Vec<u8>,
    /// Index of the file the record was read from
    pub file_index: usize,
}

impl SourceRecord {
    fn clear(&mut self) {
        self.description.clear();
        self.sequence.clear();
        self.file_index = 0;
    }
}

/// Streaming input that can be read more than once
#[auto_impl(&mut, Box)]
pub trait SequenceSource {
    /// Fills `record` with the next record, returning `false` once the input is exhausted
    fn next_record(&mut self, record: &mut SourceRecord) -> Result<bool>;

    /// Restarts reading at the first record
    fn rewind(&mut self) -> Result<()>;

    /// Names of the inputs, one per file index
    fn filenames(&self) -> Vec<String>;
}

/// Records held in memory, reported as a single file named `generated`
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<(Vec<u8>, Vec<u8>)>,
    next: usize,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sequence without a description
    #[must_use]
    pub fn with_sequence(mut self, sequence: &[u8]) -> Self {
        self.add(b"", sequence);
        self
    }

    /// Adds a sequence with a description
    pub fn add(&mut self, description: &[u8], sequence: &[u8]) {
        self.records.push((description.to_vec(), sequence.to_vec()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<D: AsRef<[u8]>, S: AsRef<[u8]>> FromIterator<(D, S)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (D, S)>>(iter: I) -> Self {
        let mut source = Self::new();
        for (description, sequence) in iter {
            source.add(description.as_ref(), sequence.as_ref());
        }
        source
    }
}

impl SequenceSource for MemorySource {
    fn next_record(&mut self, record: &mut SourceRecord) -> Result<bool> {
        record.clear();
        let Some((description, sequence)) = self.records.get(self.next) else {
            return Ok(false);
        };
        record.description.extend_from_slice(description);
        record.sequence.extend_from_slice(sequence);
        self.next += 1;
        Ok(true)
    }

    fn rewind(&mut self) -> Result<()> {
        self.next = 0;
        Ok(())
    }

    fn filenames(&self) -> Vec<String> {
        vec!["generated".to_string()]
    }
}

/// FASTA files, optionally compressed with any format niffler detects
pub struct FastaSource {
    paths: Vec<PathBuf>,
    file_index: usize,
    reader: Option<fasta::Reader<Box<dyn Read>>>,
}

impl FastaSource {
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Self {
        Self {
            paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            file_index: 0,
            reader: None,
        }
    }

    fn open_current(&mut self) -> Result<()> {
        let (handle, _format) = niffler::from_path(&self.paths[self.file_index])?;
        self.reader = Some(fasta::Reader::new(handle));
        Ok(())
    }
}

impl SequenceSource for FastaSource {
    fn next_record(&mut self, record: &mut SourceRecord) -> Result<bool> {
        record.clear();
        loop {
            if self.file_index >= self.paths.len() {
                return Ok(false);
            }
            if self.reader.is_none() {
                self.open_current()?;
            }
            let Some(reader) = self.reader.as_mut() else {
                continue;
            };
            if let Some(result) = reader.next() {
                let fasta_record = result?;
                record
                    .description
                    .extend_from_slice(fasta::Record::head(&fasta_record));
                for line in fasta_record.seq_lines() {
                    record.sequence.extend_from_slice(line);
                }
                record.file_index = self.file_index;
                return Ok(true);
            }
            self.reader = None;
            self.file_index += 1;
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader = None;
        self.file_index = 0;
        Ok(())
    }

    fn filenames(&self) -> Vec<String> {
        self.paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}
