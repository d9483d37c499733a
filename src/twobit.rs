//! Two-bit packed words and block comparison
//!
//! Symbols of a four-letter alphabet are stored 32 to a `u64`, the first symbol
//! of a word in its most significant two bits. Special characters occupy a slot
//! as well but carry a placeholder code; which placeholder is used depends on
//! the access strategy.

use std::cmp::Ordering;

/// Number of two-bit units in one word
pub const UNITS_IN_WORD: u64 = 32;

/// Words allocated for `total_length` symbols, including one padding word so that
/// windows starting at any valid position can read the following word.
#[must_use]
pub fn num_words(total_length: u64) -> usize {
    total_length.div_ceil(UNITS_IN_WORD) as usize + 1
}

/// Two-bit code at `pos`
#[inline]
#[must_use]
pub fn unit_at(words: &[u64], pos: u64) -> u8 {
    let word = words[(pos / UNITS_IN_WORD) as usize];
    ((word >> (2 * (UNITS_IN_WORD - 1 - pos % UNITS_IN_WORD))) & 3) as u8
}

/// The 32 units starting at `pos`, first unit in the most significant bits
#[inline]
#[must_use]
pub fn window_forward(words: &[u64], pos: u64) -> u64 {
    let unit = (pos / UNITS_IN_WORD) as usize;
    let rem = (pos % UNITS_IN_WORD) as u32;
    if rem == 0 {
        words[unit]
    } else {
        (words[unit] << (2 * rem)) | (words[unit + 1] >> (2 * (UNITS_IN_WORD as u32 - rem)))
    }
}

/// The 32 units ending at `pos` read backwards, unit at `pos` in the least
/// significant bits. Units before position 0 read as zero.
#[inline]
#[must_use]
pub fn window_reverse(words: &[u64], pos: u64) -> u64 {
    let unit = (pos / UNITS_IN_WORD) as usize;
    let rem = (pos % UNITS_IN_WORD) as u32;
    if rem == UNITS_IN_WORD as u32 - 1 {
        words[unit]
    } else {
        let mut value = words[unit] >> (2 * (UNITS_IN_WORD as u32 - 1 - rem));
        if unit > 0 {
            value |= words[unit - 1] << (2 * (1 + rem));
        }
        value
    }
}

/// Reverses the order of the 32 units of a word
#[inline]
#[must_use]
pub fn reverse_units(mut word: u64) -> u64 {
    word = ((word >> 2) & 0x3333_3333_3333_3333) | ((word & 0x3333_3333_3333_3333) << 2);
    word = ((word >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((word & 0x0F0F_0F0F_0F0F_0F0F) << 4);
    word.swap_bytes()
}

/// Accumulates codes into two-bit words
#[derive(Debug, Default)]
pub(crate) struct TwoBitWriter {
    words: Vec<u64>,
    current: u64,
    filled: u32,
}

impl TwoBitWriter {
    pub(crate) fn with_length(total_length: u64) -> Self {
        Self {
            words: Vec::with_capacity(num_words(total_length)),
            current: 0,
            filled: 0,
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, code: u8) {
        debug_assert!(code < 4);
        self.current = (self.current << 2) | u64::from(code);
        self.filled += 1;
        if self.filled == UNITS_IN_WORD as u32 {
            self.words.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    pub(crate) fn finish(mut self, total_length: u64) -> Vec<u64> {
        if self.filled > 0 {
            self.words
                .push(self.current << (2 * (UNITS_IN_WORD as u32 - self.filled)));
        }
        self.words.resize(num_words(total_length), 0);
        self.words
    }
}

/// A window of at most 32 two-bit units extracted at a position
///
/// For forward reading the first symbol sits in the most significant unit, for
/// reverse reading in the least significant unit. `units_not_special` counts the
/// valid symbols before the first special character or the end of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TwoBitBlock {
    pub tbe: u64,
    pub units_not_special: u32,
    pub position: u64,
}

impl TwoBitBlock {
    /// Valid units as uppercase nucleotides in reading order
    pub fn to_ascii(&self, fwd: bool, buffer: &mut Vec<u8>) -> crate::Result<()> {
        let ordered = if fwd {
            reverse_units(self.tbe)
        } else {
            self.tbe
        };
        bitnuc::from_2bit(ordered, self.units_not_special as usize, buffer)?;
        Ok(())
    }
}

/// Outcome details of a block comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommonUnits {
    /// Number of agreeing units
    pub common: u32,
    /// The left block ended at a special character
    pub left_special: bool,
    /// The right block ended at a special character
    pub right_special: bool,
    /// Total common prefix length accumulated over several blocks
    pub final_depth: u64,
}

/// Mask of the first `units` units of a forward block
#[inline]
fn mask_prefix(units: u32) -> u64 {
    if units == 0 {
        0
    } else {
        !((1u64 << (2 * (UNITS_IN_WORD as u32 - units))) - 1)
    }
}

/// Mask of the last `units` units of a reverse block
#[inline]
fn mask_suffix(units: u32) -> u64 {
    (1u64 << (2 * units)) - 1
}

#[inline]
fn mask_end(fwd: bool, units: u32) -> u64 {
    if units == 0 {
        0
    } else if fwd {
        mask_prefix(units)
    } else {
        mask_suffix(units)
    }
}

#[inline]
fn unit_from_left(word: u64, idx: u32) -> u8 {
    ((word >> (2 * (UNITS_IN_WORD as u32 - 1 - idx))) & 3) as u8
}

#[inline]
fn unit_from_right(word: u64, idx: u32) -> u8 {
    ((word >> (2 * idx)) & 3) as u8
}

/// Compares two different words and records the number of agreeing units
fn compare_words(fwd: bool, complement: bool, common: &mut CommonUnits, tbe1: u64, tbe2: u64) -> Ordering {
    debug_assert_ne!(tbe1, tbe2);
    let diff = tbe1 ^ tbe2;
    let (c1, c2) = if fwd {
        common.common = diff.leading_zeros() / 2;
        (unit_from_left(tbe1, common.common), unit_from_left(tbe2, common.common))
    } else {
        common.common = diff.trailing_zeros() / 2;
        (unit_from_right(tbe1, common.common), unit_from_right(tbe2, common.common))
    };
    if complement {
        (3 - c1).cmp(&(3 - c2))
    } else {
        c1.cmp(&c2)
    }
}

/// Compares two extracted blocks
///
/// A block that ends at a special character compares larger than one that
/// continues with a regular symbol. Two blocks ending at a special character after
/// the same number of agreeing units are ordered by their positions, reversed
/// when reading backwards.
#[must_use]
pub fn compare_two_bit_blocks(
    fwd: bool,
    complement: bool,
    block1: &TwoBitBlock,
    block2: &TwoBitBlock,
) -> (Ordering, CommonUnits) {
    let mut common = CommonUnits::default();
    let units1 = block1.units_not_special;
    let units2 = block2.units_not_special;

    if units1 != units2 {
        let shorter = units1.min(units2);
        let mask = mask_end(fwd, shorter);
        let tbe1 = block1.tbe & mask;
        let tbe2 = block2.tbe & mask;
        if tbe1 == tbe2 {
            common.common = shorter;
            return if units1 < units2 {
                common.left_special = true;
                (Ordering::Greater, common)
            } else {
                common.right_special = true;
                (Ordering::Less, common)
            };
        }
        let ord = compare_words(fwd, complement, &mut common, tbe1, tbe2);
        return (ord, common);
    }

    if units1 < UNITS_IN_WORD as u32 {
        let mask = mask_end(fwd, units1);
        let tbe1 = block1.tbe & mask;
        let tbe2 = block2.tbe & mask;
        if tbe1 == tbe2 {
            common.common = units1;
            common.left_special = true;
            common.right_special = true;
            let ord = block1.position.cmp(&block2.position);
            return (if fwd { ord } else { ord.reverse() }, common);
        }
        let ord = compare_words(fwd, complement, &mut common, tbe1, tbe2);
        return (ord, common);
    }

    if block1.tbe == block2.tbe {
        common.common = units1;
        return (Ordering::Equal, common);
    }
    let ord = compare_words(fwd, complement, &mut common, block1.tbe, block2.tbe);
    (ord, common)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(codes: &[u8]) -> Vec<u64> {
        let mut writer = TwoBitWriter::with_length(codes.len() as u64);
        for &c in codes {
            writer.push(c);
        }
        writer.finish(codes.len() as u64)
    }

    fn codes(n: usize) -> Vec<u8> {
        (0..n).map(|i| ((i * 7 + i / 3) % 4) as u8).collect()
    }

    #[test]
    fn units_round_trip() {
        let input = codes(100);
        let words = pack(&input);
        assert_eq!(words.len(), num_words(100));
        for (i, &c) in input.iter().enumerate() {
            assert_eq!(unit_at(&words, i as u64), c);
        }
    }

    #[test]
    fn windows_match_units() {
        let input = codes(150);
        let words = pack(&input);
        for pos in [0u64, 1, 17, 31, 32, 63, 100, 117] {
            let fwd = window_forward(&words, pos);
            for k in 0..32u32 {
                let p = pos + u64::from(k);
                if p < 150 {
                    assert_eq!(unit_from_left(fwd, k), input[p as usize]);
                }
            }
            let rev = window_reverse(&words, pos);
            for k in 0..32u32 {
                if u64::from(k) <= pos {
                    assert_eq!(unit_from_right(rev, k), input[(pos - u64::from(k)) as usize]);
                }
            }
        }
    }

    #[test]
    fn unit_reversal() {
        let word = 0x0123_4567_89AB_CDEFu64;
        let reversed = reverse_units(word);
        for k in 0..32 {
            assert_eq!(unit_from_left(word, k), unit_from_right(reversed, k));
        }
        assert_eq!(reverse_units(reversed), word);
    }

    #[test]
    fn prefix_difference() {
        let a = TwoBitBlock {
            tbe: 0b00_01_10_11 << 56,
            units_not_special: 32,
            position: 0,
        };
        let b = TwoBitBlock {
            tbe: 0b00_01_11_00 << 56,
            units_not_special: 32,
            position: 5,
        };
        let (ord, common) = compare_two_bit_blocks(true, false, &a, &b);
        assert_eq!(ord, Ordering::Less);
        assert_eq!(common.common, 2);
        let (ord, _) = compare_two_bit_blocks(true, true, &a, &b);
        assert_eq!(ord, Ordering::Greater);
    }

    #[test]
    fn special_ends_sort_last() {
        let a = TwoBitBlock {
            tbe: u64::MAX,
            units_not_special: 3,
            position: 0,
        };
        let b = TwoBitBlock {
            tbe: u64::MAX,
            units_not_special: 10,
            position: 1,
        };
        let (ord, common) = compare_two_bit_blocks(true, false, &a, &b);
        assert_eq!(ord, Ordering::Greater);
        assert_eq!(common.common, 3);
        assert!(common.left_special && !common.right_special);

        let c = TwoBitBlock { position: 9, ..a };
        let (ord, common) = compare_two_bit_blocks(true, false, &a, &c);
        assert_eq!(ord, Ordering::Less);
        assert!(common.left_special && common.right_special);
        let (ord, _) = compare_two_bit_blocks(false, false, &a, &c);
        assert_eq!(ord, Ordering::Greater);
    }

    #[test]
    fn reverse_blocks_use_trailing_units() {
        let a = TwoBitBlock {
            tbe: 0b10_01_11,
            units_not_special: 32,
            position: 0,
        };
        let b = TwoBitBlock {
            tbe: 0b00_01_11,
            units_not_special: 32,
            position: 0,
        };
        let (ord, common) = compare_two_bit_blocks(false, false, &a, &b);
        assert_eq!(common.common, 2);
        assert_eq!(ord, Ordering::Greater);
    }

    #[test]
    fn ascii_display() -> anyhow::Result<()> {
        let words = pack(&[0, 1, 2, 3, 3]);
        let block = TwoBitBlock {
            tbe: window_forward(&words, 0),
            units_not_special: 5,
            position: 0,
        };
        let mut buf = Vec::new();
        block.to_ascii(true, &mut buf)?;
        assert_eq!(buf, b"ACGTT");
        Ok(())
    }
}
