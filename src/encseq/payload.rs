//! Per-strategy storage of the symbols
//!
//! All positions in this module are physical forward positions.

use std::ops::Range;

use crate::access::AccessType;
use crate::alphabet::{SEPARATOR, WILDCARD};
use crate::blob::Blob;
use crate::packed::BitPackedArray;
use crate::table::{AnySpecialTable, TableWidth};
use crate::twobit::{self, TwoBitWriter};

/// Bit of `pos` in a special-character bitmap, most significant bit first
#[inline]
fn bit_mask(pos: u64) -> u64 {
    1u64 << (63 - pos % 64)
}

#[inline]
fn bit_is_set(bits: &[u64], pos: u64) -> bool {
    bits[(pos / 64) as usize] & bit_mask(pos) != 0
}

/// Words of a special-character bitmap over `total_length` positions
pub(crate) fn num_bitmap_words(total_length: u64) -> usize {
    total_length.div_ceil(64) as usize + 1
}

#[derive(Debug)]
pub(crate) enum Payload {
    Direct(Blob<u8>),
    /// Codes `num_of_chars` and `num_of_chars + 1` stand for wildcard and separator
    ByteCompress {
        packed: BitPackedArray,
        num_of_chars: u8,
    },
    /// Separators are implied at every `seq_len + 1`-th position
    EqualLength {
        words: Blob<u64>,
        seq_len: u64,
    },
    BitAccess {
        words: Blob<u64>,
        special_bits: Option<Blob<u64>>,
    },
    Tables {
        words: Blob<u64>,
        width: TableWidth,
        wildcards: Option<AnySpecialTable>,
        separators: Option<AnySpecialTable>,
    },
}

impl Payload {
    pub(crate) fn access_type(&self) -> AccessType {
        match self {
            Self::Direct(_) => AccessType::DirectAccess,
            Self::ByteCompress { .. } => AccessType::ByteCompress,
            Self::EqualLength { .. } => AccessType::EqualLength,
            Self::BitAccess { .. } => AccessType::BitAccess,
            Self::Tables { width, .. } => AccessType::from_table_width(*width),
        }
    }

    pub(crate) fn two_bit_words(&self) -> Option<&[u64]> {
        match self {
            Self::EqualLength { words, .. }
            | Self::BitAccess { words, .. }
            | Self::Tables { words, .. } => Some(words),
            Self::Direct(_) | Self::ByteCompress { .. } => None,
        }
    }

    pub(crate) fn size_in_bytes(&self) -> u64 {
        match self {
            Self::Direct(bytes) => bytes.len() as u64,
            Self::ByteCompress { packed, .. } => packed.size_in_bytes() as u64,
            Self::EqualLength { words, .. } => 8 * words.len() as u64,
            Self::BitAccess {
                words,
                special_bits,
            } => 8 * (words.len() + special_bits.as_ref().map_or(0, |b| b.len())) as u64,
            Self::Tables {
                words,
                wildcards,
                separators,
                ..
            } => {
                8 * words.len() as u64
                    + wildcards.as_ref().map_or(0, AnySpecialTable::size_in_bytes)
                    + separators.as_ref().map_or(0, AnySpecialTable::size_in_bytes)
            }
        }
    }

    #[inline]
    fn is_equal_length_separator(seq_len: u64, pos: u64) -> bool {
        pos >= seq_len && (pos - seq_len) % (seq_len + 1) == 0
    }

    /// Code at `pos`, with [`WILDCARD`] and [`SEPARATOR`] for special characters
    #[inline]
    pub(crate) fn char_at(&self, pos: u64) -> u8 {
        match self {
            Self::Direct(bytes) => bytes[pos as usize],
            Self::ByteCompress {
                packed,
                num_of_chars,
            } => {
                let value = packed.get(pos);
                match value.checked_sub(u32::from(*num_of_chars)) {
                    Some(0) => WILDCARD,
                    Some(_) => SEPARATOR,
                    None => value as u8,
                }
            }
            Self::EqualLength { words, seq_len } => {
                let code = twobit::unit_at(words, pos);
                if code == 0 && Self::is_equal_length_separator(*seq_len, pos) {
                    SEPARATOR
                } else {
                    code
                }
            }
            Self::BitAccess {
                words,
                special_bits,
            } => {
                let code = twobit::unit_at(words, pos);
                match special_bits {
                    Some(bits) if code <= 1 && bit_is_set(bits, pos) => {
                        if code == 0 {
                            WILDCARD
                        } else {
                            SEPARATOR
                        }
                    }
                    _ => code,
                }
            }
            Self::Tables {
                words,
                wildcards,
                separators,
                ..
            } => {
                let code = twobit::unit_at(words, pos);
                match code {
                    0 if wildcards.as_ref().is_some_and(|t| t.contains(pos)) => WILDCARD,
                    1 if separators.as_ref().is_some_and(|t| t.contains(pos)) => SEPARATOR,
                    code => code,
                }
            }
        }
    }

    #[inline]
    pub(crate) fn is_special(&self, pos: u64) -> bool {
        self.char_at(pos) >= WILDCARD
    }

    /// Smallest special position in `pos..total_length`, or `total_length`
    pub(crate) fn next_special_forward(&self, pos: u64, total_length: u64) -> u64 {
        if pos >= total_length {
            return total_length;
        }
        match self {
            Self::Direct(_) | Self::ByteCompress { .. } => (pos..total_length)
                .find(|&p| self.is_special(p))
                .unwrap_or(total_length),
            Self::EqualLength { seq_len, .. } => {
                let next = if pos <= *seq_len {
                    *seq_len
                } else {
                    let k = (pos - seq_len).div_ceil(seq_len + 1);
                    seq_len + k * (seq_len + 1)
                };
                next.min(total_length)
            }
            Self::BitAccess { special_bits, .. } => {
                let Some(bits) = special_bits else {
                    return total_length;
                };
                let mut word = (pos / 64) as usize;
                let mut value = bits[word] & (u64::MAX >> (pos % 64));
                while value == 0 {
                    word += 1;
                    value = bits[word];
                }
                (word as u64 * 64 + u64::from(value.leading_zeros())).min(total_length)
            }
            Self::Tables {
                wildcards,
                separators,
                ..
            } => {
                let next = |table: &Option<AnySpecialTable>| {
                    table
                        .as_ref()
                        .and_then(|t| t.next_special_at_or_after(pos))
                        .unwrap_or(total_length)
                };
                next(wildcards).min(next(separators))
            }
        }
    }

    /// Largest special position in `0..=pos`
    pub(crate) fn next_special_backward(&self, pos: u64) -> Option<u64> {
        match self {
            Self::Direct(_) | Self::ByteCompress { .. } => (0..=pos).rev().find(|&p| self.is_special(p)),
            Self::EqualLength { seq_len, .. } => {
                if pos < *seq_len {
                    None
                } else {
                    let k = (pos - seq_len) / (seq_len + 1);
                    Some(seq_len + k * (seq_len + 1))
                }
            }
            Self::BitAccess { special_bits, .. } => {
                let bits = special_bits.as_ref()?;
                let mut word = (pos / 64) as usize;
                let mut value = bits[word] & (u64::MAX << (63 - pos % 64));
                while value == 0 {
                    if word == 0 {
                        return None;
                    }
                    word -= 1;
                    value = bits[word];
                }
                Some(word as u64 * 64 + 63 - u64::from(value.trailing_zeros()))
            }
            Self::Tables {
                wildcards,
                separators,
                ..
            } => {
                let prev = |table: &Option<AnySpecialTable>| {
                    table.as_ref().and_then(|t| t.last_special_at_or_before(pos))
                };
                match (prev(wildcards), prev(separators)) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                }
            }
        }
    }

    /// True if any position of `range` holds a special character
    pub(crate) fn contains_special(&self, range: Range<u64>, total_length: u64) -> bool {
        if range.is_empty() {
            return false;
        }
        match self {
            Self::Tables {
                wildcards,
                separators,
                ..
            } => {
                wildcards
                    .as_ref()
                    .is_some_and(|t| t.intersects(range.clone()))
                    || separators.as_ref().is_some_and(|t| t.intersects(range))
            }
            _ => self.next_special_forward(range.start, total_length) < range.end,
        }
    }

    /// End of the special run starting at `start`
    pub(crate) fn special_run_end(&self, start: u64, total_length: u64) -> u64 {
        debug_assert!(self.is_special(start));
        match self {
            Self::EqualLength { .. } => start + 1,
            Self::BitAccess {
                special_bits: Some(bits),
                ..
            } => {
                let mut word = (start / 64) as usize;
                let mut value = !bits[word] & (u64::MAX >> (start % 64));
                while value == 0 {
                    word += 1;
                    if word == bits.len() {
                        return total_length;
                    }
                    value = !bits[word];
                }
                (word as u64 * 64 + u64::from(value.leading_zeros())).min(total_length)
            }
            _ => {
                let mut end = start + 1;
                while end < total_length && self.is_special(end) {
                    end += 1;
                }
                end
            }
        }
    }

    /// Start of the special run ending at `last`, inclusive
    pub(crate) fn special_run_start(&self, last: u64) -> u64 {
        debug_assert!(self.is_special(last));
        match self {
            Self::EqualLength { .. } => last,
            Self::BitAccess {
                special_bits: Some(bits),
                ..
            } => {
                let mut word = (last / 64) as usize;
                let mut value = !bits[word] & (u64::MAX << (63 - last % 64));
                while value == 0 {
                    if word == 0 {
                        return 0;
                    }
                    word -= 1;
                    value = !bits[word];
                }
                word as u64 * 64 + 64 - u64::from(value.trailing_zeros())
            }
            _ => {
                let mut start = last;
                while start > 0 && self.is_special(start - 1) {
                    start -= 1;
                }
                start
            }
        }
    }
}

/// Builds a [`Payload`] symbol by symbol during the encode pass
pub(crate) enum PayloadBuilder {
    Direct(Vec<u8>),
    ByteCompress {
        packed: BitPackedArray,
        num_of_chars: u8,
        pos: u64,
    },
    EqualLength {
        writer: TwoBitWriter,
        seq_len: u64,
    },
    BitAccess {
        writer: TwoBitWriter,
        special_bits: Option<Vec<u64>>,
        pos: u64,
    },
    Tables {
        writer: TwoBitWriter,
        width: TableWidth,
        separator_width: TableWidth,
        wildcard_runs: Vec<Range<u64>>,
        separator_runs: Vec<Range<u64>>,
        pos: u64,
    },
}

fn extend_runs(runs: &mut Vec<Range<u64>>, pos: u64) {
    if let Some(last) = runs.last_mut() {
        if last.end == pos {
            last.end += 1;
            return;
        }
    }
    runs.push(pos..pos + 1);
}

impl PayloadBuilder {
    pub(crate) fn new(
        access: AccessType,
        separator_width: TableWidth,
        total_length: u64,
        num_of_chars: u8,
        bits_per_symbol: u32,
        equal_length: Option<u64>,
        has_specials: bool,
    ) -> Self {
        match access {
            AccessType::DirectAccess => Self::Direct(Vec::with_capacity(total_length as usize)),
            AccessType::ByteCompress => Self::ByteCompress {
                packed: BitPackedArray::new(total_length, bits_per_symbol),
                num_of_chars,
                pos: 0,
            },
            AccessType::EqualLength => Self::EqualLength {
                writer: TwoBitWriter::with_length(total_length),
                seq_len: equal_length.unwrap_or(total_length),
            },
            AccessType::BitAccess => Self::BitAccess {
                writer: TwoBitWriter::with_length(total_length),
                special_bits: has_specials.then(|| vec![0; num_bitmap_words(total_length)]),
                pos: 0,
            },
            AccessType::UcharTables | AccessType::UshortTables | AccessType::Uint32Tables => {
                Self::Tables {
                    writer: TwoBitWriter::with_length(total_length),
                    width: access.table_width().unwrap_or(TableWidth::U32),
                    separator_width,
                    wildcard_runs: Vec::new(),
                    separator_runs: Vec::new(),
                    pos: 0,
                }
            }
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, code: u8) {
        match self {
            Self::Direct(bytes) => bytes.push(code),
            Self::ByteCompress {
                packed,
                num_of_chars,
                pos,
            } => {
                let value = match code {
                    WILDCARD => u32::from(*num_of_chars),
                    SEPARATOR => u32::from(*num_of_chars) + 1,
                    code => u32::from(code),
                };
                packed.set(*pos, value);
                *pos += 1;
            }
            Self::EqualLength { writer, .. } => {
                writer.push(if code >= WILDCARD { 0 } else { code });
            }
            Self::BitAccess {
                writer,
                special_bits,
                pos,
            } => {
                match code {
                    WILDCARD | SEPARATOR => {
                        writer.push(u8::from(code == SEPARATOR));
                        if let Some(bits) = special_bits.as_mut() {
                            bits[(*pos / 64) as usize] |= bit_mask(*pos);
                        }
                    }
                    code => writer.push(code),
                }
                *pos += 1;
            }
            Self::Tables {
                writer,
                wildcard_runs,
                separator_runs,
                pos,
                ..
            } => {
                match code {
                    WILDCARD => {
                        writer.push(0);
                        extend_runs(wildcard_runs, *pos);
                    }
                    SEPARATOR => {
                        writer.push(1);
                        extend_runs(separator_runs, *pos);
                    }
                    code => writer.push(code),
                }
                *pos += 1;
            }
        }
    }

    pub(crate) fn finish(self, total_length: u64) -> Payload {
        match self {
            Self::Direct(bytes) => Payload::Direct(bytes.into()),
            Self::ByteCompress {
                packed,
                num_of_chars,
                ..
            } => Payload::ByteCompress {
                packed,
                num_of_chars,
            },
            Self::EqualLength { writer, seq_len } => Payload::EqualLength {
                words: writer.finish(total_length).into(),
                seq_len,
            },
            Self::BitAccess {
                writer,
                special_bits,
                ..
            } => {
                let special_bits = special_bits.map(|mut bits| {
                    for pos in total_length..total_length + 64 {
                        bits[(pos / 64) as usize] |= bit_mask(pos);
                    }
                    bits.into()
                });
                Payload::BitAccess {
                    words: writer.finish(total_length).into(),
                    special_bits,
                }
            }
            Self::Tables {
                writer,
                width,
                separator_width,
                wildcard_runs,
                separator_runs,
                ..
            } => {
                let wildcards = (!wildcard_runs.is_empty())
                    .then(|| AnySpecialTable::from_runs(width, wildcard_runs, total_length));
                let separators = (!separator_runs.is_empty()).then(|| {
                    AnySpecialTable::from_runs(separator_width, separator_runs, total_length)
                });
                Payload::Tables {
                    words: writer.finish(total_length).into(),
                    width,
                    wildcards,
                    separators,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u8 = WILDCARD;
    const S: u8 = SEPARATOR;

    fn build(access: AccessType, codes: &[u8], equal_length: Option<u64>) -> Payload {
        let total = codes.len() as u64;
        let has_specials = codes.iter().any(|&c| c >= WILDCARD);
        let mut builder =
            PayloadBuilder::new(access, TableWidth::U8, total, 4, 3, equal_length, has_specials);
        for &code in codes {
            builder.push(code);
        }
        builder.finish(total)
    }

    fn sample() -> Vec<u8> {
        let mut codes: Vec<u8> = (0..300).map(|i| ((i * 5 + i / 7) % 4) as u8).collect();
        for pos in [0, 1, 2, 70, 128, 129, 255, 256, 299] {
            codes[pos] = W;
        }
        for pos in [40, 130, 200] {
            codes[pos] = S;
        }
        codes
    }

    fn check(payload: &Payload, codes: &[u8]) {
        let total = codes.len() as u64;
        for (pos, &code) in codes.iter().enumerate() {
            assert_eq!(payload.char_at(pos as u64), code, "{:?} at {pos}", payload.access_type());
        }
        for pos in 0..total {
            let forward = (pos..total)
                .find(|&p| codes[p as usize] >= WILDCARD)
                .unwrap_or(total);
            assert_eq!(payload.next_special_forward(pos, total), forward);
            let backward = (0..=pos).rev().find(|&p| codes[p as usize] >= WILDCARD);
            assert_eq!(payload.next_special_backward(pos), backward);
            if codes[pos as usize] >= WILDCARD {
                let end = (pos..total)
                    .find(|&p| codes[p as usize] < WILDCARD)
                    .unwrap_or(total);
                let start = (0..=pos)
                    .rev()
                    .find(|&p| codes[p as usize] < WILDCARD)
                    .map_or(0, |p| p + 1);
                if !matches!(payload, Payload::EqualLength { .. }) {
                    assert_eq!(payload.special_run_end(pos, total), end);
                    assert_eq!(payload.special_run_start(pos), start);
                }
            }
        }
        assert!(payload.contains_special(69..71, total));
        assert!(!payload.contains_special(3..40, total));
        assert!(!payload.contains_special(5..5, total));
    }

    #[test]
    fn strategies_decode_identically() {
        let codes = sample();
        for access in [
            AccessType::DirectAccess,
            AccessType::ByteCompress,
            AccessType::BitAccess,
            AccessType::UcharTables,
            AccessType::UshortTables,
            AccessType::Uint32Tables,
        ] {
            let payload = build(access, &codes, None);
            assert_eq!(payload.access_type(), access);
            check(&payload, &codes);
        }
    }

    #[test]
    fn equal_length_separators() {
        let mut codes = Vec::new();
        for i in 0..5 {
            if i > 0 {
                codes.push(S);
            }
            codes.extend((0..9).map(|j| ((i + j) % 4) as u8));
        }
        let payload = build(AccessType::EqualLength, &codes, Some(9));
        check_positions(&payload, &codes);
        assert_eq!(payload.next_special_forward(0, codes.len() as u64), 9);
        assert_eq!(payload.next_special_forward(10, codes.len() as u64), 19);
        assert_eq!(payload.next_special_backward(8), None);
        assert_eq!(payload.next_special_backward(25), Some(19));
        assert_eq!(payload.special_run_end(19, codes.len() as u64), 20);
    }

    fn check_positions(payload: &Payload, codes: &[u8]) {
        for (pos, &code) in codes.iter().enumerate() {
            assert_eq!(payload.char_at(pos as u64), code);
        }
    }

    #[test]
    fn special_run_reaching_the_end() {
        let codes = [0, 1, W, W];
        let payload = build(AccessType::BitAccess, &codes, None);
        assert_eq!(payload.special_run_end(2, 4), 4);
        assert_eq!(payload.special_run_start(3), 2);
        assert_eq!(payload.next_special_forward(4, 4), 4);
    }

    #[test]
    fn no_specials() {
        let codes = [0, 1, 2, 3, 3, 2];
        let payload = build(AccessType::BitAccess, &codes, None);
        assert!(matches!(
            payload,
            Payload::BitAccess {
                special_bits: None,
                ..
            }
        ));
        assert_eq!(payload.next_special_forward(0, 6), 6);
        assert_eq!(payload.next_special_backward(5), None);
        assert_eq!(payload.size_in_bytes(), 8 * twobit::num_words(6) as u64);
    }
}
