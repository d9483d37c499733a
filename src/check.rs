//! Brute-force consistency checks
//!
//! Each check recomputes a result the fast paths produce by a slow, obviously
//! correct method and reports the first disagreement as a [`CheckError`].

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::alphabet::{is_special, SEPARATOR};
use crate::error::CheckError;
use crate::{EncodedSequence, ReadMode, Result};

/// Compares sequential reading with random access
///
/// Reads the whole sequence once, then `trials` stretches from random start
/// positions.
pub fn check_random_access(
    encseq: &EncodedSequence,
    readmode: ReadMode,
    trials: usize,
    seed: u64,
) -> Result<()> {
    let total = encseq.total_length();
    let compare_from = |startpos: u64, len: u64| -> Result<()> {
        let reader = encseq.reader(readmode, startpos);
        for (pos, sequential) in (startpos..).zip(reader.take(len as usize)) {
            let random = encseq.get_encoded_char(readmode, pos);
            if random != sequential {
                return Err(CheckError::AccessMismatch {
                    readmode,
                    pos,
                    random,
                    sequential,
                }
                .into());
            }
        }
        Ok(())
    };

    compare_from(0, total)?;
    let mut rng = SmallRng::seed_from_u64(seed);
    for _ in 0..trials {
        let startpos = rng.random_range(0..total);
        let len = rng.random_range(1..=(total - startpos).min(1000));
        compare_from(startpos, len)?;
    }
    debug!(%readmode, trials, "random access agrees with sequential reading");
    Ok(())
}

/// Compares the forward special ranges with the reversed backward ones
pub fn check_special_ranges(encseq: &EncodedSequence) -> Result<()> {
    let forward: Vec<_> = encseq.special_ranges(true).collect();
    let mut backward: Vec<_> = encseq.special_ranges(false).collect();
    backward.reverse();
    if forward != backward {
        return Err(CheckError::RangeMismatch {
            forward: forward.len(),
            backward: backward.len(),
        }
        .into());
    }
    Ok(())
}

/// Checks sequence numbers and start positions against a forward scan
pub fn check_marks(encseq: &EncodedSequence) -> Result<()> {
    let mut current = 0u64;
    for (pos, code) in encseq.reader(ReadMode::Forward, 0).enumerate() {
        let pos = pos as u64;
        // separators count towards the sequence before them
        let found = encseq.seqnum(pos);
        if found != current {
            return Err(CheckError::SeqnumMismatch {
                pos,
                expected: current,
                found,
            }
            .into());
        }
        if code == SEPARATOR {
            current += 1;
            let found = encseq.seqstartpos(current)?;
            if found != pos + 1 {
                return Err(CheckError::MarkMismatch {
                    index: current,
                    expected: pos + 1,
                    found,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Symbol-wise suffix comparison, the reference for [`EncodedSequence::compare_via_two_bit`]
///
/// A special character at position `p` compares as `256 + p`, the end of the
/// sequence as `256 + total_length`.
#[must_use]
pub fn compare_naive(
    encseq: &EncodedSequence,
    readmode: ReadMode,
    pos1: u64,
    pos2: u64,
    maxdepth: Option<u64>,
) -> (Ordering, u64) {
    let total = encseq.total_length();
    let key = |pos: u64| {
        if pos >= total {
            return 256 + total;
        }
        let code = encseq.get_encoded_char(readmode, pos);
        if is_special(code) {
            256 + pos
        } else {
            u64::from(code)
        }
    };
    let mut depth = 0;
    loop {
        if let Some(max) = maxdepth {
            if depth >= max {
                return (Ordering::Equal, max);
            }
        }
        let (key1, key2) = (key(pos1 + depth), key(pos2 + depth));
        if key1 != key2 {
            return (key1.cmp(&key2), depth);
        }
        if key1 >= 256 {
            return (Ordering::Equal, depth);
        }
        depth += 1;
    }
}

/// Compares two-bit suffix comparison with [`compare_naive`] on random pairs
///
/// Fails with [`crate::ReadError::NoTwoBitEncoding`] for byte-based strategies.
pub fn check_two_bit_compare(
    encseq: &EncodedSequence,
    readmode: ReadMode,
    trials: usize,
    seed: u64,
) -> Result<()> {
    let total = encseq.total_length();
    let mut rng = SmallRng::seed_from_u64(seed);
    for _ in 0..trials {
        let pos1 = rng.random_range(0..total);
        let pos2 = rng.random_range(0..total);
        let maxdepth = rng.random_bool(0.3).then(|| rng.random_range(1..100));
        let (ord, common) = encseq.compare_via_two_bit(readmode, pos1, pos2, 0, maxdepth)?;
        let twobit = (ord, common.final_depth);
        let naive = compare_naive(encseq, readmode, pos1, pos2, maxdepth);
        if twobit != naive {
            return Err(CheckError::CompareMismatch {
                pos1,
                pos2,
                twobit,
                naive,
            }
            .into());
        }
    }
    debug!(%readmode, trials, "two-bit comparison agrees with symbol-wise comparison");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessType;
    use crate::encseq::EncseqBuilder;
    use crate::source::MemorySource;

    #[test]
    fn naive_order() -> anyhow::Result<()> {
        let source = MemorySource::new()
            .with_sequence(b"acgn")
            .with_sequence(b"acg");
        let encseq = EncseqBuilder::default().build(source)?;
        // "acgn|acg"
        let forward = ReadMode::Forward;
        assert_eq!(compare_naive(&encseq, forward, 0, 5, None), (Ordering::Less, 3));
        assert_eq!(compare_naive(&encseq, forward, 3, 4, None), (Ordering::Less, 0));
        assert_eq!(compare_naive(&encseq, forward, 1, 1, None), (Ordering::Equal, 2));
        assert_eq!(compare_naive(&encseq, forward, 0, 5, Some(2)), (Ordering::Equal, 2));
        assert_eq!(compare_naive(&encseq, forward, 7, 2, None), (Ordering::Greater, 1));
        Ok(())
    }

    #[test]
    fn checks_pass_on_consistent_data() -> anyhow::Result<()> {
        let mut seq = b"acgt".repeat(40);
        seq[70..75].fill(b'n');
        let source = MemorySource::new()
            .with_sequence(&seq)
            .with_sequence(b"ggggnnnnacgtacgt")
            .with_sequence(&b"ca".repeat(50));
        let mut encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::UshortTables))
            .build(source)?;
        for mirrored in [false, true] {
            if mirrored {
                encseq.mirror();
            }
            check_special_ranges(&encseq)?;
            check_marks(&encseq)?;
            for readmode in ReadMode::ALL {
                check_random_access(&encseq, readmode, 20, 1)?;
                check_two_bit_compare(&encseq, readmode, 200, 2)?;
            }
        }
        Ok(())
    }

    #[test]
    fn byte_strategies_cannot_compare_blocks() -> anyhow::Result<()> {
        let source = MemorySource::new().with_sequence(b"acgt");
        let encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::ByteCompress))
            .build(source)?;
        assert!(check_two_bit_compare(&encseq, ReadMode::Forward, 1, 0).is_err());
        check_random_access(&encseq, ReadMode::Reverse, 5, 0)?;
        Ok(())
    }
}
