//! Two-bit block extraction and suffix comparison
//!
//! Blocks are extracted in the orientation of a read mode: forward modes place
//! the first symbol in the most significant unit, reverse modes in the least
//! significant unit. Blocks are never complemented for the read mode; the
//! comparison applies the complement instead.

use std::cmp::Ordering;

use super::{EncodedSequence, Located};
use crate::error::ReadError;
use crate::readmode::ReadMode;
use crate::twobit::{
    compare_two_bit_blocks, reverse_units, window_forward, window_reverse, CommonUnits,
    TwoBitBlock, UNITS_IN_WORD,
};
use crate::Result;

impl EncodedSequence {
    /// Extracts up to 32 symbols starting at `pos` in the direction of `readmode`
    ///
    /// `units_not_special` stops at the first special character or the end of
    /// the sequence. The returned block's `position` is the forward position
    /// of its first symbol.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is not below [`Self::total_length`].
    pub fn extract_two_bit_block(&self, readmode: ReadMode, pos: u64) -> Result<TwoBitBlock> {
        let payload = &self.rep.payload;
        let words = payload
            .two_bit_words()
            .ok_or(ReadError::NoTwoBitEncoding(payload.access_type()))?;
        let total = self.rep.total_length;
        let fwd = !readmode.is_reverse();
        let nominal = if fwd {
            pos
        } else {
            self.total_length() - 1 - pos
        };

        // forward physical extraction with MSB-first layout
        let ascending = |p: u64| {
            let stop = payload.next_special_forward(p, total);
            (window_forward(words, p), (stop - p).min(UNITS_IN_WORD))
        };
        // backward physical extraction with LSB-first layout
        let descending = |p: u64| {
            let units = payload
                .next_special_backward(p)
                .map_or(p + 1, |stop| p - stop);
            (window_reverse(words, p), units.min(UNITS_IN_WORD))
        };

        let (tbe, units) = match self.locate(readmode, pos).0 {
            Located::Center => (0, 0),
            Located::Real(p) => {
                if fwd {
                    ascending(p)
                } else {
                    descending(p)
                }
            }
            Located::Virtual(q) => {
                let (tbe, units) = if fwd { descending(q) } else { ascending(q) };
                (reverse_units(tbe) ^ u64::MAX, units)
            }
        };
        Ok(TwoBitBlock {
            tbe,
            units_not_special: units as u32,
            position: nominal,
        })
    }

    /// Compares the suffixes starting at `pos1` and `pos2` in `readmode`
    ///
    /// The first `depth` symbols are known to agree. Comparison stops once
    /// `maxdepth` symbols agree, in which case the suffixes count as equal.
    /// A special character at position `p` compares as a unique symbol larger
    /// than every regular one, ordered by `p`; the end of the sequence behaves
    /// like a special character at the total length.
    pub fn compare_via_two_bit(
        &self,
        readmode: ReadMode,
        pos1: u64,
        pos2: u64,
        depth: u64,
        maxdepth: Option<u64>,
    ) -> Result<(Ordering, CommonUnits)> {
        let total = self.total_length();
        let fwd = !readmode.is_reverse();
        let complement = readmode.is_complement();
        let mut depth = depth;
        loop {
            if let Some(max) = maxdepth {
                if depth >= max {
                    return Ok((Ordering::Equal, reached(max)));
                }
            }
            let (p1, p2) = (pos1 + depth, pos2 + depth);
            if p1 >= total || p2 >= total {
                let common = CommonUnits {
                    final_depth: depth,
                    left_special: p1 >= total,
                    right_special: p2 >= total,
                    ..CommonUnits::default()
                };
                let ord = match (p1 >= total, p2 >= total) {
                    (true, true) => p1.cmp(&p2),
                    (true, false) => Ordering::Greater,
                    _ => Ordering::Less,
                };
                return Ok((ord, common));
            }

            let block1 = self.extract_two_bit_block(readmode, p1)?;
            let block2 = self.extract_two_bit_block(readmode, p2)?;
            let (ord, mut common) = compare_two_bit_blocks(fwd, complement, &block1, &block2);
            let reached_depth = depth + u64::from(common.common);
            if let Some(max) = maxdepth {
                if reached_depth >= max {
                    return Ok((Ordering::Equal, reached(max)));
                }
            }
            if ord != Ordering::Equal || common.left_special || common.right_special {
                common.final_depth = reached_depth;
                return Ok((ord, common));
            }
            depth = reached_depth;
        }
    }
}

fn reached(max: u64) -> CommonUnits {
    CommonUnits {
        final_depth: max,
        ..CommonUnits::default()
    }
}
