//! Sequential access to an encoded sequence
//!
//! An [`EncseqReader`] delivers one symbol per step in the orientation of its
//! read mode. For the table strategies it keeps a cursor into each table, so a
//! step never searches a table from the start.

use tracing::trace;

use crate::alphabet::{SEPARATOR, WILDCARD};
use crate::encseq::{EncodedSequence, Located, Payload};
use crate::readmode::ReadMode;
use crate::table::{AnySpecialTable, TableCursor};
use crate::twobit;

/// Cursors for the wildcard and separator tables of a table payload
fn prepare_cursors(
    payload: &Payload,
    pos: u64,
    forward: bool,
) -> (Option<TableCursor>, Option<TableCursor>) {
    match payload {
        Payload::Tables {
            wildcards,
            separators,
            ..
        } => {
            let prepare = |table: &Option<AnySpecialTable>| {
                table
                    .as_ref()
                    .map(|t| TableCursor::prepare(t, pos, forward))
            };
            (prepare(wildcards), prepare(separators))
        }
        _ => (None, None),
    }
}

#[inline]
fn cursor_hit(cursor: Option<&mut TableCursor>, table: Option<&AnySpecialTable>, pos: u64) -> bool {
    match (cursor, table) {
        (Some(cursor), Some(table)) => cursor.is_special(table, pos),
        _ => false,
    }
}

/// A sequential reader over an [`EncodedSequence`]
///
/// ```
/// use encseq::{EncseqBuilder, MemorySource, ReadMode};
///
/// let source = MemorySource::new().with_sequence(b"acgn").with_sequence(b"tt");
/// let encseq = EncseqBuilder::default().build(source).unwrap();
/// let decoded: Vec<u8> = encseq
///     .reader(ReadMode::ReverseComplement, 0)
///     .map(|code| encseq.alphabet().decode(code))
///     .collect();
/// assert_eq!(decoded, b"aa|ncgt");
/// ```
#[derive(Debug, Clone)]
pub struct EncseqReader {
    encseq: EncodedSequence,
    readmode: ReadMode,

    /// Logical position of the next symbol
    position: u64,

    /// Physical position of the next symbol
    phys: u64,

    /// Physical direction of travel
    forward: bool,

    /// Whether stored codes are complemented on delivery
    complement: bool,

    /// The next symbol is the separator between the data and its mirror image
    at_center: bool,

    wildcards: Option<TableCursor>,
    separators: Option<TableCursor>,
}

impl EncseqReader {
    pub(crate) fn new(encseq: EncodedSequence, readmode: ReadMode, startpos: u64) -> Self {
        let mut reader = Self {
            encseq,
            readmode,
            position: 0,
            phys: 0,
            forward: true,
            complement: false,
            at_center: false,
            wildcards: None,
            separators: None,
        };
        reader.reinit(readmode, startpos);
        reader
    }

    /// Restarts the reader at `startpos` in `readmode`
    ///
    /// # Panics
    ///
    /// Panics if `startpos` exceeds the total length.
    pub fn reinit(&mut self, readmode: ReadMode, startpos: u64) {
        let total = self.encseq.total_length();
        assert!(
            startpos <= total,
            "start position {startpos} out of range {total}"
        );
        self.readmode = readmode;
        self.position = startpos;
        self.at_center = false;
        if startpos == total {
            self.wildcards = None;
            self.separators = None;
            return;
        }

        let nominal_forward = !readmode.is_reverse();
        match self.encseq.locate(readmode, startpos).0 {
            Located::Real(p) => {
                self.phys = p;
                self.forward = nominal_forward;
                self.complement = readmode.is_complement();
            }
            Located::Virtual(q) => {
                self.phys = q;
                self.forward = !nominal_forward;
                self.complement = !readmode.is_complement();
            }
            Located::Center => {
                // state after the turn, delivered once the separator is read
                self.at_center = true;
                self.phys = self.encseq.physical_total_length() - 1;
                self.forward = false;
                self.complement = readmode.is_complement() ^ nominal_forward;
            }
        }
        (self.wildcards, self.separators) =
            prepare_cursors(&self.encseq.rep.payload, self.phys, self.forward);
    }

    #[must_use]
    pub fn readmode(&self) -> ReadMode {
        self.readmode
    }

    /// Logical position of the next symbol
    #[must_use]
    pub fn current_position(&self) -> u64 {
        self.position
    }

    /// Delivers the symbol code at the current position and advances
    ///
    /// # Panics
    ///
    /// Panics if the reader is at the end of the sequence.
    pub fn next_encoded_char(&mut self) -> u8 {
        let total = self.encseq.total_length();
        assert!(
            self.position < total,
            "reading past the end of a sequence of length {total}"
        );
        self.position += 1;
        if self.at_center {
            self.at_center = false;
            return SEPARATOR;
        }

        let rep = &*self.encseq.rep;
        let phys = self.phys;
        let code = match &rep.payload {
            Payload::Tables {
                words,
                wildcards,
                separators,
                ..
            } => {
                let code = twobit::unit_at(words, phys);
                if code == 0 && cursor_hit(self.wildcards.as_mut(), wildcards.as_ref(), phys) {
                    WILDCARD
                } else if code == 1
                    && cursor_hit(self.separators.as_mut(), separators.as_ref(), phys)
                {
                    SEPARATOR
                } else {
                    code
                }
            }
            payload => payload.char_at(phys),
        };
        let code = if self.complement {
            rep.alphabet.complement(code)
        } else {
            code
        };

        if self.forward {
            if self.encseq.mirrored && phys + 1 == rep.total_length {
                self.at_center = true;
                self.forward = false;
                self.complement = !self.complement;
                (self.wildcards, self.separators) = prepare_cursors(&rep.payload, phys, false);
                trace!(position = self.position, "reader turned at the mirror center");
            } else {
                self.phys += 1;
            }
        } else if phys > 0 {
            self.phys -= 1;
        }
        code
    }

    /// Delivers the printable character at the current position and advances
    pub fn next_decoded_char(&mut self) -> u8 {
        let code = self.next_encoded_char();
        self.encseq.rep.alphabet.decode(code)
    }
}

impl Iterator for EncseqReader {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        (self.position < self.encseq.total_length()).then(|| self.next_encoded_char())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.encseq.total_length() - self.position) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for EncseqReader {}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::access::AccessType;
    use crate::encseq::EncseqBuilder;
    use crate::source::MemorySource;

    fn decoded(encseq: &EncodedSequence, readmode: ReadMode, startpos: u64) -> Vec<u8> {
        let mut reader = encseq.reader(readmode, startpos);
        let mut out = Vec::new();
        while reader.current_position() < encseq.total_length() {
            out.push(reader.next_decoded_char());
        }
        out
    }

    #[test]
    fn reads_all_modes() -> anyhow::Result<()> {
        let source = MemorySource::new()
            .with_sequence(b"acgtn")
            .with_sequence(b"ggt");
        let encseq = EncseqBuilder::default().build(source)?;
        assert_eq!(decoded(&encseq, ReadMode::Forward, 0), b"acgtn|ggt");
        assert_eq!(decoded(&encseq, ReadMode::Reverse, 0), b"tgg|ntgca");
        assert_eq!(decoded(&encseq, ReadMode::Complement, 0), b"tgcan|cca");
        assert_eq!(decoded(&encseq, ReadMode::ReverseComplement, 0), b"acc|nacgt");
        assert_eq!(decoded(&encseq, ReadMode::Forward, 6), b"ggt");
        Ok(())
    }

    #[test]
    fn sequential_matches_random_access() -> anyhow::Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut source = MemorySource::new();
        for _ in 0..5 {
            let len = rng.random_range(1..400);
            let seq: Vec<u8> = (0..len)
                .map(|_| {
                    if rng.random_bool(0.05) {
                        b'n'
                    } else {
                        b"acgt"[rng.random_range(0..4)]
                    }
                })
                .collect();
            source.add(b"", &seq);
        }
        source.add(b"", b"acgn");

        let mut fixed = MemorySource::new();
        for _ in 0..7 {
            let seq: Vec<u8> = (0..150).map(|_| b"acgt"[rng.random_range(0..4)]).collect();
            fixed.add(b"", &seq);
        }

        for access in AccessType::ALL {
            let input = if access == AccessType::EqualLength {
                fixed.clone()
            } else {
                source.clone()
            };
            let mut encseq = EncseqBuilder::default()
                .access_type(Some(access))
                .build(input)?;
            for mirrored in [false, true] {
                if mirrored {
                    encseq.mirror();
                }
                let total = encseq.total_length();
                for readmode in ReadMode::ALL {
                    let mut starts = vec![0, total / 2, total - 1, total];
                    if mirrored {
                        let center = encseq.physical_total_length();
                        starts.extend([center - 1, center, center + 1]);
                    }
                    for startpos in starts {
                        let expected: Vec<u8> = (startpos..total)
                            .map(|pos| encseq.get_encoded_char(readmode, pos))
                            .collect();
                        let got: Vec<u8> = encseq.reader(readmode, startpos).collect();
                        assert_eq!(got, expected, "{access} {readmode} from {startpos}");
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn turns_at_wildcard_before_center() -> anyhow::Result<()> {
        let source = MemorySource::new().with_sequence(b"acgn");
        let mut encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::UcharTables))
            .build(source)?;
        encseq.mirror();
        assert_eq!(decoded(&encseq, ReadMode::Forward, 0), b"acgn|ncgt");
        assert_eq!(decoded(&encseq, ReadMode::Reverse, 0), b"tgcn|ngca");
        assert_eq!(decoded(&encseq, ReadMode::Forward, 4), b"|ncgt");
        assert_eq!(decoded(&encseq, ReadMode::Complement, 3), b"n|ngca");
        Ok(())
    }

    #[test]
    fn reinit_and_end() -> anyhow::Result<()> {
        let source = MemorySource::new().with_sequence(b"acgt");
        let encseq = EncseqBuilder::default().build(source)?;
        let mut reader = encseq.reader(ReadMode::Forward, 2);
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.next_decoded_char(), b'g');
        reader.reinit(ReadMode::Reverse, 0);
        assert_eq!(reader.readmode(), ReadMode::Reverse);
        assert_eq!(reader.next_decoded_char(), b't');
        assert_eq!(reader.current_position(), 1);
        reader.reinit(ReadMode::Forward, 4);
        assert_eq!(reader.next(), None);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "reading past the end")]
    fn reading_past_the_end_panics() {
        let source = MemorySource::new().with_sequence(b"ac");
        let Ok(encseq) = EncseqBuilder::default().build(source) else {
            return;
        };
        let mut reader = encseq.reader(ReadMode::Forward, 1);
        reader.next_encoded_char();
        reader.next_encoded_char();
    }
}
