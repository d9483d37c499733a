//! The encoded sequence and its random-access API
//!
//! An [`EncodedSequence`] is a cheap handle around an immutable representation.
//! Positions passed to its methods are logical positions in the orientation of
//! the given [`ReadMode`]. A mirrored handle additionally presents the reverse
//! complement of the stored data after a virtual separator, doubling the number
//! of sequences without storing anything.

mod builder;
mod compare;
mod loader;
mod payload;

pub use builder::EncseqBuilder;
pub use loader::EncseqLoader;
pub(crate) use payload::Payload;

use std::io::Write;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use crate::access::AccessType;
use crate::alphabet::{Alphabet, SEPARATOR, SEPARATOR_SHOW, WILDCARD};
use crate::blob::Blob;
use crate::error::ReadError;
use crate::range_iter::{PhysicalScan, SpecialRangeIterator};
use crate::reader::EncseqReader;
use crate::readmode::ReadMode;
use crate::stats::{FileLength, SpecialCharInfo};
use crate::table::{ExceptionTable, TableWidth};
use crate::Result;

/// Header lines of the sequences, each terminated by a newline in `text`
#[derive(Debug)]
pub(crate) struct Descriptions {
    pub(crate) text: Blob<u8>,
    /// Offset of the newline ending each description
    pub(crate) ends: Blob<u64>,
}

impl Descriptions {
    pub(crate) fn from_lines<'a, I: IntoIterator<Item = &'a [u8]>>(lines: I) -> Self {
        let mut text = Vec::new();
        let mut ends = Vec::new();
        for line in lines {
            text.extend_from_slice(line);
            ends.push(text.len() as u64);
            text.push(b'\n');
        }
        Self {
            text: text.into(),
            ends: ends.into(),
        }
    }

    fn get(&self, seqnum: u64) -> &[u8] {
        let idx = seqnum as usize;
        let start = if idx == 0 {
            0
        } else {
            self.ends[idx - 1] as usize + 1
        };
        &self.text[start..self.ends[idx] as usize]
    }
}

/// The shared, immutable part of an encoded sequence
#[derive(Debug)]
pub(crate) struct EncseqRep {
    pub(crate) payload: Payload,
    pub(crate) alphabet: Alphabet,
    pub(crate) total_length: u64,
    pub(crate) num_sequences: u64,
    pub(crate) info: SpecialCharInfo,
    pub(crate) separator_width: TableWidth,
    pub(crate) equal_length: Option<u64>,
    pub(crate) min_seq_len: u64,
    pub(crate) max_seq_len: u64,
    pub(crate) filenames: Vec<String>,
    pub(crate) file_lengths: Vec<FileLength>,
    pub(crate) char_distribution: Vec<u64>,
    /// Persist the separator positions as a `.ssp` file
    pub(crate) ssp_table: bool,
    pub(crate) ssp: OnceLock<Blob<u64>>,
    pub(crate) descriptions: Option<Descriptions>,
    pub(crate) exceptions: Option<ExceptionTable>,
    pub(crate) checksums: Option<Blob<[u8; 16]>>,
}

impl EncseqRep {
    /// Physical positions of all separators
    pub(crate) fn separator_positions(&self) -> &[u64] {
        self.ssp.get_or_init(|| {
            let mut positions = Vec::with_capacity(self.num_sequences as usize - 1);
            let mut scan = PhysicalScan::new(&self.payload, self.total_length, true);
            while let Some(range) = scan.next_range(&self.payload, self.total_length) {
                positions.extend(range.filter(|&p| self.payload.char_at(p) == SEPARATOR));
            }
            positions.into()
        })
    }

    fn seqnum(&self, pos: u64) -> u64 {
        match self.payload {
            Payload::EqualLength { seq_len, .. } => pos / (seq_len + 1),
            _ => self.separator_positions().partition_point(|&s| s < pos) as u64,
        }
    }

    fn seqstartpos(&self, seqnum: u64) -> u64 {
        if seqnum == 0 {
            return 0;
        }
        match self.payload {
            Payload::EqualLength { seq_len, .. } => seqnum * (seq_len + 1),
            _ => self.separator_positions()[seqnum as usize - 1] + 1,
        }
    }

    fn seqlength(&self, seqnum: u64) -> u64 {
        if let Payload::EqualLength { seq_len, .. } = self.payload {
            return seq_len;
        }
        let end = if seqnum + 1 == self.num_sequences {
            self.total_length
        } else {
            self.separator_positions()[seqnum as usize]
        };
        end - self.seqstartpos(seqnum)
    }

    /// Start position of every file; a file without sequences has no separator
    fn file_starts(&self) -> impl Iterator<Item = u64> + '_ {
        self.file_lengths.iter().scan(0u64, |start, file| {
            let current = *start;
            if file.length > 0 {
                *start += file.length + 1;
            }
            Some(current)
        })
    }

    fn filenum(&self, pos: u64) -> u64 {
        (self.file_starts().take_while(|&start| start <= pos).count() as u64).saturating_sub(1)
    }

    fn filestartpos(&self, filenum: u64) -> u64 {
        self.file_starts().nth(filenum as usize).unwrap_or(self.total_length)
    }
}

/// Where a logical position is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Located {
    /// The physical position itself
    Real(u64),
    /// The separator between the stored data and its mirror image
    Center,
    /// The complement of this physical position
    Virtual(u64),
}

/// A random-access encoded sequence collection
///
/// Clones share the underlying data. Mirroring affects only the handle it is
/// called on.
#[derive(Debug, Clone)]
pub struct EncodedSequence {
    pub(crate) rep: Arc<EncseqRep>,
    pub(crate) mirrored: bool,
}

impl EncodedSequence {
    pub(crate) fn from_rep(rep: EncseqRep) -> Self {
        Self {
            rep: Arc::new(rep),
            mirrored: false,
        }
    }

    /// Number of symbols including separators, doubled plus one when mirrored
    #[must_use]
    pub fn total_length(&self) -> u64 {
        if self.mirrored {
            2 * self.rep.total_length + 1
        } else {
            self.rep.total_length
        }
    }

    /// Number of stored symbols including separators
    #[must_use]
    pub fn physical_total_length(&self) -> u64 {
        self.rep.total_length
    }

    /// Number of sequences, doubled when mirrored
    #[must_use]
    pub fn num_sequences(&self) -> u64 {
        if self.mirrored {
            2 * self.rep.num_sequences
        } else {
            self.rep.num_sequences
        }
    }

    #[must_use]
    pub fn physical_num_sequences(&self) -> u64 {
        self.rep.num_sequences
    }

    #[must_use]
    pub fn access_type(&self) -> AccessType {
        self.rep.payload.access_type()
    }

    /// Width of the separator table; meaningful for table strategies only
    #[must_use]
    pub fn separator_width(&self) -> TableWidth {
        self.rep.separator_width
    }

    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.rep.alphabet
    }

    /// Special-character statistics of the stored data
    #[must_use]
    pub fn special_char_info(&self) -> &SpecialCharInfo {
        &self.rep.info
    }

    #[must_use]
    pub fn equal_length(&self) -> Option<u64> {
        self.rep.equal_length
    }

    #[must_use]
    pub fn min_seq_len(&self) -> u64 {
        self.rep.min_seq_len
    }

    #[must_use]
    pub fn max_seq_len(&self) -> u64 {
        self.rep.max_seq_len
    }

    /// Occurrences of a symbol code, including its complement's on the mirror
    #[must_use]
    pub fn charcount(&self, code: u8) -> u64 {
        let count = |c: u8| self.rep.char_distribution.get(c as usize).copied().unwrap_or(0);
        if self.mirrored {
            count(code) + count(self.rep.alphabet.complement(code))
        } else {
            count(code)
        }
    }

    /// Bytes of the payload and all loaded side tables
    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        let rep = &self.rep;
        rep.payload.size_in_bytes()
            + rep.ssp.get().map_or(0, |ssp| 8 * ssp.len() as u64)
            + rep
                .descriptions
                .as_ref()
                .map_or(0, |d| d.text.len() as u64 + 8 * d.ends.len() as u64)
            + rep.exceptions.as_ref().map_or(0, ExceptionTable::size_in_bytes)
            + rep.checksums.as_ref().map_or(0, |c| 16 * c.len() as u64)
    }

    /// Number of handles sharing the data
    #[must_use]
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.rep)
    }

    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Presents the reverse complement of the data after the stored sequences
    ///
    /// # Panics
    ///
    /// Panics if the alphabet has no complement or the doubled length overflows.
    pub fn mirror(&mut self) {
        assert!(
            self.rep.alphabet.is_complementable(),
            "cannot mirror a sequence over an alphabet without complement"
        );
        let doubled = self
            .rep
            .total_length
            .checked_mul(2)
            .and_then(|len| len.checked_add(1));
        assert!(doubled.is_some(), "mirrored length overflows");
        assert!(
            self.rep.num_sequences.checked_mul(2).is_some(),
            "mirrored sequence count overflows"
        );
        self.mirrored = true;
    }

    pub fn unmirror(&mut self) {
        self.mirrored = false;
    }

    /// Physical location of a read-mode position, and whether it must be complemented
    #[inline]
    pub(crate) fn locate(&self, readmode: ReadMode, pos: u64) -> (Located, bool) {
        let total = self.total_length();
        assert!(pos < total, "position {pos} out of range {total}");
        let nominal = if readmode.is_reverse() {
            total - 1 - pos
        } else {
            pos
        };
        let physical_total = self.rep.total_length;
        let located = if !self.mirrored || nominal < physical_total {
            Located::Real(nominal)
        } else if nominal == physical_total {
            Located::Center
        } else {
            Located::Virtual(2 * physical_total - nominal)
        };
        let complement = readmode.is_complement() ^ matches!(located, Located::Virtual(_));
        (located, complement)
    }

    /// Symbol code at `pos`
    ///
    /// # Panics
    ///
    /// Panics if `pos` is not below [`Self::total_length`].
    #[inline]
    #[must_use]
    pub fn get_encoded_char(&self, readmode: ReadMode, pos: u64) -> u8 {
        match self.locate(readmode, pos) {
            (Located::Center, _) => SEPARATOR,
            (Located::Real(p) | Located::Virtual(p), complement) => {
                let code = self.rep.payload.char_at(p);
                if complement {
                    self.rep.alphabet.complement(code)
                } else {
                    code
                }
            }
        }
    }

    /// Printable character at `pos`
    #[must_use]
    pub fn get_decoded_char(&self, readmode: ReadMode, pos: u64) -> u8 {
        self.rep.alphabet.decode(self.get_encoded_char(readmode, pos))
    }

    /// True if `pos` holds a wildcard or separator
    #[must_use]
    pub fn is_special(&self, readmode: ReadMode, pos: u64) -> bool {
        self.get_encoded_char(readmode, pos) >= WILDCARD
    }

    /// True if any of the `len` positions starting at `startpos` is special
    #[must_use]
    pub fn contains_special(&self, readmode: ReadMode, startpos: u64, len: u64) -> bool {
        if len == 0 {
            return false;
        }
        let total = self.total_length();
        assert!(
            startpos + len <= total,
            "range {startpos}+{len} out of range {total}"
        );
        let range = if readmode.is_reverse() {
            total - startpos - len..total - startpos
        } else {
            startpos..startpos + len
        };
        self.logical_range_contains_special(range)
    }

    fn logical_range_contains_special(&self, range: Range<u64>) -> bool {
        let physical_total = self.rep.total_length;
        let payload = &self.rep.payload;
        if !self.mirrored || range.end <= physical_total {
            return payload.contains_special(range, physical_total);
        }
        if range.start <= physical_total {
            return true;
        }
        let reflected = 2 * physical_total + 1 - range.end..2 * physical_total + 1 - range.start;
        payload.contains_special(reflected, physical_total)
    }

    /// A sequential reader starting at `startpos`
    #[must_use]
    pub fn reader(&self, readmode: ReadMode, startpos: u64) -> EncseqReader {
        EncseqReader::new(self.clone(), readmode, startpos)
    }

    /// Maximal runs of special characters in logical coordinates
    #[must_use]
    pub fn special_ranges(&self, forward: bool) -> SpecialRangeIterator {
        SpecialRangeIterator::new(self, forward)
    }

    /// Physical positions of the separators between stored sequences
    #[must_use]
    pub fn separator_positions(&self) -> &[u64] {
        self.rep.separator_positions()
    }

    fn check_seqnum(&self, seqnum: u64) -> Result<()> {
        if seqnum >= self.num_sequences() {
            return Err(ReadError::OutOfRange(seqnum, self.num_sequences()).into());
        }
        Ok(())
    }

    /// Index of the sequence a logical forward position belongs to
    ///
    /// A separator belongs to the sequence before it.
    #[must_use]
    pub fn seqnum(&self, pos: u64) -> u64 {
        match self.locate(ReadMode::Forward, pos).0 {
            Located::Real(p) => self.rep.seqnum(p),
            Located::Center => self.rep.num_sequences - 1,
            Located::Virtual(p) => {
                // separators belong to the sequence before them
                let reflected = 2 * self.rep.num_sequences - 1 - self.rep.seqnum(p);
                if self.rep.payload.char_at(p) == SEPARATOR {
                    reflected - 1
                } else {
                    reflected
                }
            }
        }
    }

    /// First logical forward position of a sequence
    pub fn seqstartpos(&self, seqnum: u64) -> Result<u64> {
        self.check_seqnum(seqnum)?;
        let n = self.rep.num_sequences;
        if seqnum < n {
            return Ok(self.rep.seqstartpos(seqnum));
        }
        let mirror = 2 * n - 1 - seqnum;
        Ok(2 * self.rep.total_length - self.rep.seqstartpos(mirror) - self.rep.seqlength(mirror)
            + 1)
    }

    pub fn seqlength(&self, seqnum: u64) -> Result<u64> {
        self.check_seqnum(seqnum)?;
        Ok(self.rep.seqlength(self.physical_seqnum(seqnum)))
    }

    /// The stored sequence a logical sequence number refers to
    fn physical_seqnum(&self, seqnum: u64) -> u64 {
        let n = self.rep.num_sequences;
        if seqnum < n {
            seqnum
        } else {
            2 * n - 1 - seqnum
        }
    }

    /// Header line of a sequence, without the leading `>`
    pub fn description(&self, seqnum: u64) -> Result<&[u8]> {
        self.check_seqnum(seqnum)?;
        let descriptions = self
            .rep
            .descriptions
            .as_ref()
            .ok_or(ReadError::MissingTable("description"))?;
        Ok(descriptions.get(self.physical_seqnum(seqnum)))
    }

    /// MD5 digest of a sequence as computed at build time
    pub fn checksum(&self, seqnum: u64) -> Result<[u8; 16]> {
        self.check_seqnum(seqnum)?;
        let checksums = self
            .rep
            .checksums
            .as_ref()
            .ok_or(ReadError::MissingTable("checksum"))?;
        Ok(checksums[self.physical_seqnum(seqnum) as usize])
    }

    /// Number of input files, doubled when mirrored
    #[must_use]
    pub fn num_files(&self) -> u64 {
        let files = self.rep.file_lengths.len() as u64;
        if self.mirrored {
            2 * files
        } else {
            files
        }
    }

    /// Names of the stored input files
    #[must_use]
    pub fn filenames(&self) -> &[String] {
        &self.rep.filenames
    }

    /// Lengths of the stored input files
    #[must_use]
    pub fn file_lengths(&self) -> &[FileLength] {
        &self.rep.file_lengths
    }

    fn physical_filenum(&self, filenum: u64) -> u64 {
        let files = self.rep.file_lengths.len() as u64;
        if filenum < files {
            filenum
        } else {
            2 * files - 1 - filenum
        }
    }

    fn check_filenum(&self, filenum: u64) -> Result<()> {
        if filenum >= self.num_files() {
            return Err(ReadError::OutOfRange(filenum, self.num_files()).into());
        }
        Ok(())
    }

    /// Symbols of a file that are not special
    pub fn effective_file_length(&self, filenum: u64) -> Result<u64> {
        self.check_filenum(filenum)?;
        Ok(self.rep.file_lengths[self.physical_filenum(filenum) as usize].effective_length)
    }

    /// Index of the file a logical forward position belongs to
    #[must_use]
    pub fn filenum(&self, pos: u64) -> u64 {
        let files = self.rep.file_lengths.len() as u64;
        match self.locate(ReadMode::Forward, pos).0 {
            Located::Real(p) => self.rep.filenum(p),
            Located::Center => files - 1,
            Located::Virtual(p) => 2 * files - 1 - self.rep.filenum(p),
        }
    }

    /// First logical forward position of a file
    pub fn filestartpos(&self, filenum: u64) -> Result<u64> {
        self.check_filenum(filenum)?;
        let files = self.rep.file_lengths.len() as u64;
        if filenum < files {
            return Ok(self.rep.filestartpos(filenum));
        }
        let mirror = 2 * files - 1 - filenum;
        let length = self.rep.file_lengths[mirror as usize].length;
        Ok(2 * self.rep.total_length - self.rep.filestartpos(mirror) - length + 1)
    }

    /// Appends the codes of the logical forward positions `frompos..=topos`
    pub fn extract_encoded(&self, frompos: u64, topos: u64, buffer: &mut Vec<u8>) {
        assert!(frompos <= topos, "empty range {frompos}..={topos}");
        buffer.reserve((topos - frompos + 1) as usize);
        let reader = self.reader(ReadMode::Forward, frompos);
        buffer.extend(reader.take((topos - frompos + 1) as usize));
    }

    /// Appends `len` printable characters starting at `frompos`
    pub fn extract_decoded(&self, readmode: ReadMode, frompos: u64, len: u64, buffer: &mut Vec<u8>) {
        buffer.reserve(len as usize);
        let alphabet = &self.rep.alphabet;
        let reader = self.reader(readmode, frompos);
        buffer.extend(reader.take(len as usize).map(|code| alphabet.decode(code)));
    }

    /// Codes of a sequence packed four to a byte, first symbol in the high bits
    ///
    /// Wildcards are stored as the code 0.
    pub fn sequence_to_bytecode(&self, seqnum: u64, buffer: &mut Vec<u8>) -> Result<()> {
        let num_of_chars = self.rep.alphabet.num_of_chars();
        if num_of_chars != 4 {
            return Err(ReadError::NotTwoBitAlphabet(num_of_chars).into());
        }
        let start = self.seqstartpos(seqnum)?;
        let len = self.seqlength(seqnum)?;
        let mut byte = 0u8;
        let mut filled = 0;
        for code in self.reader(ReadMode::Forward, start).take(len as usize) {
            let code = if code >= WILDCARD { 0 } else { code };
            byte = (byte << 2) | code;
            filled += 1;
            if filled == 4 {
                buffer.push(byte);
                byte = 0;
                filled = 0;
            }
        }
        if filled > 0 {
            buffer.push(byte << (2 * (4 - filled)));
        }
        Ok(())
    }

    #[must_use]
    pub fn has_exceptions(&self) -> bool {
        self.rep.exceptions.is_some()
    }

    /// Character found in the input at `pos`
    ///
    /// Separators yield [`SEPARATOR_SHOW`]. In complement read modes the
    /// printable complement is returned, since the input holds no character
    /// for the complement strand.
    pub fn get_original_char(&self, readmode: ReadMode, pos: u64) -> Result<u8> {
        let exceptions = self
            .rep
            .exceptions
            .as_ref()
            .ok_or(ReadError::MissingTable("exception"))?;
        let alphabet = &self.rep.alphabet;
        let ch = match self.locate(readmode, pos) {
            (Located::Center, _) => SEPARATOR_SHOW,
            (Located::Real(p) | Located::Virtual(p), complement) => {
                let code = self.rep.payload.char_at(p);
                if code == SEPARATOR {
                    SEPARATOR_SHOW
                } else if complement {
                    alphabet.decode(alphabet.complement(code))
                } else {
                    exceptions.original_char(alphabet, code, p)
                }
            }
        };
        Ok(ch)
    }

    /// Appends `len` original characters starting at `frompos`
    pub fn extract_original(
        &self,
        readmode: ReadMode,
        frompos: u64,
        len: u64,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        buffer.reserve(len as usize);
        for pos in frompos..frompos + len {
            buffer.push(self.get_original_char(readmode, pos)?);
        }
        Ok(())
    }

    /// Writes all sequences as FASTA with lines of at most `linewidth` characters
    ///
    /// Sequences without a stored description are named `seq<number>`. Original
    /// characters are written when the exception table is loaded.
    pub fn write_fasta<W: Write>(&self, writer: &mut W, linewidth: usize) -> Result<()> {
        let linewidth = linewidth.max(1);
        let mut line = Vec::with_capacity(linewidth + 1);
        let mut itoa_buf = itoa::Buffer::new();
        for seqnum in 0..self.num_sequences() {
            writer.write_all(b">")?;
            if self.rep.descriptions.is_some() {
                writer.write_all(self.description(seqnum)?)?;
            } else {
                writer.write_all(b"seq")?;
                writer.write_all(itoa_buf.format(seqnum).as_bytes())?;
            }
            writer.write_all(b"\n")?;

            let start = self.seqstartpos(seqnum)?;
            let len = self.seqlength(seqnum)?;
            let mut written = 0;
            while written < len {
                let chunk = (len - written).min(linewidth as u64);
                line.clear();
                if self.has_exceptions() {
                    self.extract_original(ReadMode::Forward, start + written, chunk, &mut line)?;
                } else {
                    self.extract_decoded(ReadMode::Forward, start + written, chunk, &mut line);
                }
                line.push(b'\n');
                writer.write_all(&line)?;
                written += chunk;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn build(seqs: &[&str]) -> anyhow::Result<EncodedSequence> {
        let source: MemorySource = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("s{i}"), s.to_string()))
            .collect();
        Ok(EncseqBuilder::new(Alphabet::dna())
            .descriptions(true)
            .build(source)?)
    }

    #[test]
    fn decoding_in_all_modes() -> anyhow::Result<()> {
        let encseq = build(&["acgtn", "ggt"])?;
        let mut fwd = Vec::new();
        encseq.extract_decoded(ReadMode::Forward, 0, 9, &mut fwd);
        assert_eq!(fwd, b"acgtn|ggt");
        let mut rev = Vec::new();
        encseq.extract_decoded(ReadMode::Reverse, 0, 9, &mut rev);
        assert_eq!(rev, b"tgg|ntgca");
        let mut rc = Vec::new();
        encseq.extract_decoded(ReadMode::ReverseComplement, 0, 9, &mut rc);
        assert_eq!(rc, b"acc|nacgt");
        assert_eq!(encseq.get_encoded_char(ReadMode::Complement, 0), 3);
        assert!(encseq.is_special(ReadMode::Forward, 4));
        assert!(encseq.contains_special(ReadMode::Reverse, 0, 4));
        assert!(!encseq.contains_special(ReadMode::Reverse, 0, 3));
        Ok(())
    }

    #[test]
    fn sequence_layout() -> anyhow::Result<()> {
        let encseq = build(&["acgtn", "ggt", "a"])?;
        assert_eq!(encseq.separator_positions(), &[5, 9]);
        assert_eq!(encseq.seqnum(0), 0);
        assert_eq!(encseq.seqnum(5), 0);
        assert_eq!(encseq.seqnum(6), 1);
        assert_eq!(encseq.seqnum(10), 2);
        assert_eq!(encseq.seqstartpos(2)?, 10);
        assert_eq!(encseq.seqlength(1)?, 3);
        assert_eq!(encseq.description(1)?, b"s1");
        assert!(encseq.seqlength(3).is_err());
        assert!(encseq.checksum(0).is_err());
        Ok(())
    }

    #[test]
    fn mirrored_layout() -> anyhow::Result<()> {
        let mut encseq = build(&["acgtn", "ggt"])?;
        encseq.mirror();
        assert_eq!(encseq.total_length(), 19);
        assert_eq!(encseq.num_sequences(), 4);
        let mut all = Vec::new();
        encseq.extract_decoded(ReadMode::Forward, 0, 19, &mut all);
        assert_eq!(all, b"acgtn|ggt|acc|nacgt");
        assert_eq!(encseq.seqnum(9), 1);
        assert_eq!(encseq.seqnum(10), 2);
        assert_eq!(encseq.seqnum(14), 3);
        assert_eq!(encseq.seqstartpos(2)?, 10);
        assert_eq!(encseq.seqstartpos(3)?, 14);
        assert_eq!(encseq.seqlength(3)?, 5);
        assert_eq!(encseq.description(3)?, b"s0");
        assert_eq!(encseq.charcount(0), 3);
        assert_eq!(encseq.num_files(), 2);
        assert_eq!(encseq.filenum(18), 1);
        assert_eq!(encseq.filestartpos(1)?, 10);
        encseq.unmirror();
        assert_eq!(encseq.total_length(), 9);
        Ok(())
    }

    #[test]
    fn mirrored_separators_belong_to_the_preceding_sequence() -> anyhow::Result<()> {
        let mut encseq = build(&["acgtn", "ggt"])?;
        encseq.mirror();
        // acgtn|ggt|acc|nacgt
        assert_eq!(encseq.seqnum(5), 0);
        assert_eq!(encseq.seqnum(9), 1);
        assert_eq!(encseq.seqnum(12), 2);
        assert_eq!(encseq.seqnum(13), 2);
        assert_eq!(encseq.seqnum(18), 3);
        Ok(())
    }

    #[test]
    fn mirrored_ranges_ending_at_the_tail() -> anyhow::Result<()> {
        for access in AccessType::ALL {
            let seqs = if access == AccessType::EqualLength {
                ["acgt", "ttga"]
            } else {
                ["acgtn", "ggt"]
            };
            let source: MemorySource = seqs.iter().map(|s| ("", s.to_string())).collect();
            let mut encseq = EncseqBuilder::new(Alphabet::dna())
                .access_type(Some(access))
                .build(source)?;
            encseq.mirror();
            let total = encseq.total_length();
            for readmode in ReadMode::ALL {
                for len in 1..=total {
                    for startpos in [0, total - len] {
                        let expected =
                            (startpos..startpos + len).any(|pos| encseq.is_special(readmode, pos));
                        assert_eq!(
                            encseq.contains_special(readmode, startpos, len),
                            expected,
                            "{access} {readmode} {startpos}+{len}"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    #[should_panic(expected = "without complement")]
    fn protein_cannot_mirror() {
        let source = MemorySource::new().with_sequence(b"MKV");
        let mut encseq = EncseqBuilder::new(Alphabet::protein())
            .build(source)
            .unwrap();
        encseq.mirror();
    }

    #[test]
    fn fasta_export() -> anyhow::Result<()> {
        let encseq = build(&["acgtacgta", "ggt"])?;
        let mut out = Vec::new();
        encseq.write_fasta(&mut out, 4)?;
        assert_eq!(out, b">s0\nacgt\nacgt\na\n>s1\nggt\n");

        let source = MemorySource::new().with_sequence(b"acg").with_sequence(b"t");
        let plain = EncseqBuilder::new(Alphabet::dna()).build(source)?;
        let mut out = Vec::new();
        plain.write_fasta(&mut out, 60)?;
        assert_eq!(out, b">seq0\nacg\n>seq1\nt\n");
        Ok(())
    }

    #[test]
    fn bytecode() -> anyhow::Result<()> {
        let encseq = build(&["acgtn", "tt"])?;
        let mut buffer = Vec::new();
        encseq.sequence_to_bytecode(0, &mut buffer)?;
        assert_eq!(buffer, vec![0b00_01_10_11, 0]);
        buffer.clear();
        encseq.sequence_to_bytecode(1, &mut buffer)?;
        assert_eq!(buffer, vec![0b11_11_00_00]);
        Ok(())
    }
}
