use std::sync::OnceLock;

use tracing::{debug, info};

use super::payload::{Payload, PayloadBuilder};
use super::{Descriptions, EncodedSequence, EncseqRep};
use crate::access::{choose_access_type, AccessType};
use crate::alphabet::{Alphabet, SEPARATOR};
use crate::blob::Blob;
use crate::error::BuildError;
use crate::source::{SequenceSource, SourceRecord};
use crate::stats::{FileLength, StatsCollector};
use crate::table::{AnySpecialTable, ExceptionBuilder};
use crate::Result;

/// Digest function applied to the raw residues of every sequence
pub type ChecksumFn = fn(&[u8]) -> [u8; 16];

/// Builds an [`EncodedSequence`] from a [`SequenceSource`]
///
/// The source is read twice: once to collect the statistics the access
/// strategy is chosen from, and once to encode.
///
/// ```
/// use encseq::{Alphabet, EncseqBuilder, MemorySource, ReadMode};
///
/// let source = MemorySource::new().with_sequence(b"agctttnttgca");
/// let encseq = EncseqBuilder::new(Alphabet::dna()).build(source).unwrap();
/// assert_eq!(encseq.total_length(), 12);
/// assert_eq!(encseq.get_decoded_char(ReadMode::Forward, 6), b'n');
/// ```
#[derive(Debug, Clone)]
pub struct EncseqBuilder {
    alphabet: Alphabet,
    access: Option<AccessType>,
    lossless: bool,
    descriptions: bool,
    ssp_table: bool,
    checksum: Option<ChecksumFn>,
}

impl Default for EncseqBuilder {
    fn default() -> Self {
        Self::new(Alphabet::dna())
    }
}

impl EncseqBuilder {
    #[must_use]
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            access: None,
            lossless: false,
            descriptions: false,
            ssp_table: false,
            checksum: None,
        }
    }

    #[must_use]
    pub fn alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Forces an access strategy; `None` lets the cost model decide
    #[must_use]
    pub fn access_type(mut self, access: Option<AccessType>) -> Self {
        self.access = access;
        self
    }

    /// Records which original character each position held
    #[must_use]
    pub fn lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    /// Keeps the header line of every sequence
    #[must_use]
    pub fn descriptions(mut self, descriptions: bool) -> Self {
        self.descriptions = descriptions;
        self
    }

    /// Persists the separator positions in their own file
    #[must_use]
    pub fn ssp_table(mut self, ssp_table: bool) -> Self {
        self.ssp_table = ssp_table;
        self
    }

    /// Stores a digest of every sequence
    #[must_use]
    pub fn checksum(mut self, checksum: ChecksumFn) -> Self {
        self.checksum = Some(checksum);
        self
    }

    fn encode(&self, ch: u8, seqnum: u64, offset: usize) -> Result<u8> {
        self.alphabet.encode(ch).ok_or_else(|| {
            BuildError::InvalidCharacter {
                ch: char::from(ch),
                seqnum,
                offset: offset as u64,
            }
            .into()
        })
    }

    pub fn build<S: SequenceSource>(self, mut source: S) -> Result<EncodedSequence> {
        let alphabet = &self.alphabet;
        let mut record = SourceRecord::default();

        let mut collector = StatsCollector::new(alphabet, self.lossless);
        let mut num_sequences = 0u64;
        while source.next_record(&mut record)? {
            if record.sequence.is_empty() {
                return Err(BuildError::EmptySequence(num_sequences).into());
            }
            collector.start_sequence(record.file_index);
            for (offset, &ch) in record.sequence.iter().enumerate() {
                let code = self.encode(ch, num_sequences, offset)?;
                let class_and_sub = if self.lossless {
                    alphabet.sub_index(ch)
                } else {
                    None
                };
                collector.push(code, class_and_sub);
            }
            num_sequences += 1;
        }
        if num_sequences == 0 {
            return Err(BuildError::EmptyInput.into());
        }
        let mut stats = collector.finish();
        debug!(histogram = ?stats.special_run_histogram, "special range lengths");
        debug!(histogram = ?stats.wildcard_run_histogram, "wildcard range lengths");

        let num_of_chars = alphabet.num_of_chars();
        let choice = choose_access_type(&stats, num_of_chars, self.access)?;
        let total_length = stats.total_length;

        source.rewind()?;
        let mut payload = PayloadBuilder::new(
            choice.access,
            choice.separator_width,
            total_length,
            num_of_chars,
            alphabet.bits_per_packed_symbol(),
            stats.equal_length,
            stats.info.special_characters > 0,
        );
        let mut exceptions = stats.representatives().map(ExceptionBuilder::new);
        let mut separators = Vec::with_capacity(num_sequences as usize - 1);
        let mut description_lines = Vec::new();
        let mut checksums = Vec::new();

        let changed = |got: u64| BuildError::SourceChanged {
            expected: total_length,
            got,
        };
        let mut pos = 0u64;
        let mut seqnum = 0u64;
        while source.next_record(&mut record)? {
            let end = pos + record.sequence.len() as u64 + u64::from(seqnum > 0);
            if end > total_length {
                return Err(changed(end).into());
            }
            if seqnum > 0 {
                separators.push(pos);
                payload.push(SEPARATOR);
                pos += 1;
            }
            for (offset, &ch) in record.sequence.iter().enumerate() {
                let code = self.encode(ch, seqnum, offset)?;
                if let (Some(exceptions), Some((class, sub))) =
                    (exceptions.as_mut(), alphabet.sub_index(ch))
                {
                    exceptions.push(pos, class, sub);
                }
                payload.push(code);
                pos += 1;
            }
            if self.descriptions {
                description_lines.push(record.description.clone());
            }
            if let Some(checksum) = self.checksum {
                checksums.push(checksum(&record.sequence));
            }
            seqnum += 1;
        }
        if pos != total_length || seqnum != num_sequences {
            return Err(changed(pos).into());
        }

        let payload = payload.finish(total_length);
        if let Payload::Tables {
            wildcards,
            separators,
            ..
        } = &payload
        {
            let entries = |table: &Option<AnySpecialTable>| {
                table.as_ref().map_or(0, |t| t.num_entries() as u64)
            };
            stats.info.wildcard_ranges = entries(wildcards);
            stats.info.special_ranges = entries(wildcards) + entries(separators);
        }

        let mut filenames = source.filenames();
        let mut file_lengths = stats.file_lengths;
        let num_files = filenames.len().max(file_lengths.len());
        filenames.resize(num_files, String::new());
        file_lengths.resize(num_files, FileLength::default());

        let size = payload.size_in_bytes();
        info!(
            access = %choice.access,
            bytes = size,
            bits_per_symbol = 8.0 * size as f64 / total_length as f64,
            total_length,
            num_sequences,
            "built encoded sequence"
        );

        Ok(EncodedSequence::from_rep(EncseqRep {
            payload,
            alphabet: self.alphabet,
            total_length,
            num_sequences,
            info: stats.info,
            separator_width: choice.separator_width,
            equal_length: stats.equal_length,
            min_seq_len: stats.min_seq_len,
            max_seq_len: stats.max_seq_len,
            filenames,
            file_lengths,
            char_distribution: stats.char_distribution,
            ssp_table: self.ssp_table,
            ssp: OnceLock::from(Blob::from(separators)),
            descriptions: self
                .descriptions
                .then(|| Descriptions::from_lines(description_lines.iter().map(Vec::as_slice))),
            exceptions: exceptions.map(|e| e.finish(total_length)),
            checksums: self.checksum.map(|_| checksums.into()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::ReadMode;

    #[test]
    fn rejects_bad_input() {
        let empty = MemorySource::new();
        assert!(matches!(
            EncseqBuilder::default().build(empty),
            Err(crate::Error::BuildError(BuildError::EmptyInput))
        ));

        let source = MemorySource::new().with_sequence(b"acgt").with_sequence(b"");
        assert!(matches!(
            EncseqBuilder::default().build(source),
            Err(crate::Error::BuildError(BuildError::EmptySequence(1)))
        ));

        let source = MemorySource::new().with_sequence(b"ac!gt");
        assert!(matches!(
            EncseqBuilder::default().build(source),
            Err(crate::Error::BuildError(BuildError::InvalidCharacter {
                ch: '!',
                seqnum: 0,
                offset: 2
            }))
        ));

        let source = MemorySource::new().with_sequence(b"acgtn");
        assert!(EncseqBuilder::default()
            .access_type(Some(AccessType::EqualLength))
            .build(source)
            .is_err());
    }

    #[test]
    fn separators_recorded_while_encoding() -> anyhow::Result<()> {
        let source = MemorySource::new()
            .with_sequence(b"acgt")
            .with_sequence(b"gg")
            .with_sequence(b"t");
        let encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::BitAccess))
            .build(source)?;
        let recorded = encseq.rep.ssp.get().map(|ssp| ssp.to_vec());
        assert_eq!(recorded, Some(vec![4, 7]));
        assert_eq!(encseq.seqnum(7), 1);
        Ok(())
    }

    /// Yields one more symbol on the second pass than on the first
    struct Growing {
        pass: usize,
        done: bool,
    }

    impl SequenceSource for Growing {
        fn next_record(&mut self, record: &mut SourceRecord) -> Result<bool> {
            if self.done {
                return Ok(false);
            }
            record.sequence = if self.pass == 0 {
                b"acgt".to_vec()
            } else {
                b"acgta".to_vec()
            };
            self.done = true;
            Ok(true)
        }

        fn rewind(&mut self) -> Result<()> {
            self.pass += 1;
            self.done = false;
            Ok(())
        }

        fn filenames(&self) -> Vec<String> {
            vec!["growing".to_string()]
        }
    }

    #[test]
    fn detects_changing_source() {
        let result = EncseqBuilder::default().build(Growing {
            pass: 0,
            done: false,
        });
        assert!(matches!(
            result,
            Err(crate::Error::BuildError(BuildError::SourceChanged {
                expected: 4,
                got: 5
            }))
        ));
    }

    fn first_bytes(seq: &[u8]) -> [u8; 16] {
        let mut digest = [0u8; 16];
        for (slot, &b) in digest.iter_mut().zip(seq) {
            *slot = b;
        }
        digest
    }

    #[test]
    fn optional_tables() -> anyhow::Result<()> {
        let source: MemorySource = [("first", "acgT"), ("second", "Nac")].into_iter().collect();
        let encseq = EncseqBuilder::default()
            .lossless(true)
            .descriptions(true)
            .checksum(first_bytes)
            .build(source)?;
        assert_eq!(encseq.description(1)?, b"second");
        assert_eq!(&encseq.checksum(0)?[..4], b"acgT");
        let mut original = Vec::new();
        encseq.extract_original(ReadMode::Forward, 0, 8, &mut original)?;
        assert_eq!(original, b"acgT|Nac");
        Ok(())
    }

    #[test]
    fn table_strategies_count_entries() -> anyhow::Result<()> {
        let mut seq = vec![b'a'; 600];
        seq[250..260].fill(b'n');
        let source = MemorySource::new().with_sequence(&seq).with_sequence(b"acgt");
        let encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::UcharTables))
            .build(source)?;
        let info = encseq.special_char_info();
        assert_eq!(info.real_wildcard_ranges, 1);
        assert_eq!(info.wildcard_ranges, 2);
        assert_eq!(info.special_ranges, 3);
        Ok(())
    }
}
