//! Maximal runs of special characters
//!
//! [`SpecialRangeIterator`] reports every maximal run of wildcards and
//! separators as a half-open range of logical positions. Touching runs are
//! reported once, whether they come from the same table, from both tables,
//! or from a table entry split at a page boundary.

use std::ops::Range;

use crate::encseq::{EncodedSequence, Payload};
use crate::table::{AnySpecialTable, TableCursor};

/// A sequential traversal of the physical special runs in one direction
#[derive(Debug, Clone)]
pub(crate) struct PhysicalScan {
    forward: bool,
    /// Forward: first position not yet scanned. Backward: last position not yet scanned.
    next: Option<u64>,
    wildcards: Option<TableCursor>,
    separators: Option<TableCursor>,
}

impl PhysicalScan {
    pub(crate) fn new(payload: &Payload, total_length: u64, forward: bool) -> Self {
        let next = if total_length == 0 {
            None
        } else if forward {
            Some(0)
        } else {
            Some(total_length - 1)
        };
        let (wildcards, separators) = match payload {
            Payload::Tables {
                wildcards,
                separators,
                ..
            } => {
                let prepare = |table: &Option<AnySpecialTable>| {
                    let start = next?;
                    table
                        .as_ref()
                        .map(|t| TableCursor::prepare(t, start, forward))
                };
                (prepare(wildcards), prepare(separators))
            }
            _ => (None, None),
        };
        Self {
            forward,
            next,
            wildcards,
            separators,
        }
    }

    /// The next maximal run in the direction of travel
    pub(crate) fn next_range(&mut self, payload: &Payload, total_length: u64) -> Option<Range<u64>> {
        if let Payload::Tables {
            wildcards,
            separators,
            ..
        } = payload
        {
            return self.next_merged(wildcards.as_ref(), separators.as_ref());
        }
        let pos = self.next?;
        if self.forward {
            let start = payload.next_special_forward(pos, total_length);
            if start >= total_length {
                self.next = None;
                return None;
            }
            let end = payload.special_run_end(start, total_length);
            self.next = (end < total_length).then_some(end);
            Some(start..end)
        } else {
            let Some(last) = payload.next_special_backward(pos) else {
                self.next = None;
                return None;
            };
            let start = payload.special_run_start(last);
            self.next = start.checked_sub(1);
            Some(start..last + 1)
        }
    }

    /// Next range of the cursor that comes first in the direction of travel
    fn front(&self) -> Option<(bool, Range<u64>)> {
        let wildcard = self.wildcards.as_ref().and_then(TableCursor::current);
        let separator = self.separators.as_ref().and_then(TableCursor::current);
        match (wildcard, separator) {
            (Some(w), Some(s)) => {
                let wildcard_first = if self.forward {
                    w.start <= s.start
                } else {
                    w.end >= s.end
                };
                Some(if wildcard_first {
                    (true, w.clone())
                } else {
                    (false, s.clone())
                })
            }
            (Some(w), None) => Some((true, w.clone())),
            (None, Some(s)) => Some((false, s.clone())),
            (None, None) => None,
        }
    }

    fn next_merged(
        &mut self,
        wildcards: Option<&AnySpecialTable>,
        separators: Option<&AnySpecialTable>,
    ) -> Option<Range<u64>> {
        let mut merged: Option<Range<u64>> = None;
        while let Some((is_wildcard, range)) = self.front() {
            match merged.as_mut() {
                None => merged = Some(range),
                Some(current) if self.forward && range.start <= current.end => {
                    current.end = current.end.max(range.end);
                }
                Some(current) if !self.forward && range.end >= current.start => {
                    current.start = current.start.min(range.start);
                }
                Some(_) => break,
            }
            let (cursor, table) = if is_wildcard {
                (&mut self.wildcards, wildcards)
            } else {
                (&mut self.separators, separators)
            };
            if let (Some(cursor), Some(table)) = (cursor.as_mut(), table) {
                cursor.advance(table);
            }
        }
        merged
    }
}

enum Stage {
    Physical { scan: PhysicalScan, reflect: bool },
    Center,
}

/// Iterates the maximal special runs of an [`EncodedSequence`] in logical positions
///
/// On a mirrored sequence the runs of the stored data come first, then the
/// center separator on its own, then the reflected runs; a backward traversal
/// visits them in the opposite order.
pub struct SpecialRangeIterator {
    encseq: EncodedSequence,
    /// Remaining stages, the current one last
    stages: Vec<Stage>,
}

impl SpecialRangeIterator {
    #[must_use]
    pub fn new(encseq: &EncodedSequence, forward: bool) -> Self {
        let payload = &encseq.rep.payload;
        let total = encseq.rep.total_length;
        let physical = |forward: bool, reflect: bool| Stage::Physical {
            scan: PhysicalScan::new(payload, total, forward),
            reflect,
        };
        let stages = match (encseq.is_mirrored(), forward) {
            (false, _) => vec![physical(forward, false)],
            (true, true) => vec![physical(false, true), Stage::Center, physical(true, false)],
            (true, false) => vec![physical(false, false), Stage::Center, physical(true, true)],
        };
        Self {
            encseq: encseq.clone(),
            stages,
        }
    }
}

impl Iterator for SpecialRangeIterator {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Range<u64>> {
        let rep = &*self.encseq.rep;
        let total = rep.total_length;
        while let Some(stage) = self.stages.last_mut() {
            match stage {
                Stage::Center => {
                    self.stages.pop();
                    return Some(total..total + 1);
                }
                Stage::Physical { scan, reflect } => {
                    if let Some(range) = scan.next_range(&rep.payload, total) {
                        return Some(if *reflect {
                            2 * total - range.end + 1..2 * total - range.start + 1
                        } else {
                            range
                        });
                    }
                    self.stages.pop();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::access::AccessType;
    use crate::encseq::EncseqBuilder;
    use crate::source::MemorySource;
    use crate::ReadMode;

    fn random_input(rng: &mut SmallRng) -> MemorySource {
        let mut source = MemorySource::new();
        for _ in 0..6 {
            let len = rng.random_range(1..900);
            let mut seq = Vec::with_capacity(len);
            while seq.len() < len {
                if rng.random_bool(0.02) {
                    let run = rng.random_range(1..300);
                    seq.resize(seq.len() + run, b'n');
                } else {
                    seq.push(b"acgt"[rng.random_range(0..4)]);
                }
            }
            seq.truncate(len);
            source = source.with_sequence(&seq);
        }
        source.with_sequence(b"nn").with_sequence(b"acnn")
    }

    /// Wildcard-free sequences of one random length
    fn fixed_length_input(rng: &mut SmallRng) -> MemorySource {
        let len = rng.random_range(1..200);
        let mut source = MemorySource::new();
        for _ in 0..8 {
            let seq: Vec<u8> = (0..len).map(|_| b"acgt"[rng.random_range(0..4)]).collect();
            source.add(b"", &seq);
        }
        source
    }

    /// Maximal special runs by linear scan, split around the mirror center
    fn expected_ranges(encseq: &EncodedSequence) -> Vec<Range<u64>> {
        let center = encseq
            .is_mirrored()
            .then(|| encseq.physical_total_length());
        let mut ranges: Vec<Range<u64>> = Vec::new();
        for pos in 0..encseq.total_length() {
            if !encseq.is_special(ReadMode::Forward, pos) {
                continue;
            }
            let isolated = |p: u64| center.is_some_and(|c| p == c || p == c + 1);
            match ranges.last_mut() {
                Some(last) if last.end == pos && !isolated(pos) => last.end += 1,
                _ => ranges.push(pos..pos + 1),
            }
        }
        ranges
    }

    fn check(encseq: &mut EncodedSequence) {
        for mirrored in [false, true] {
            if mirrored {
                encseq.mirror();
            } else {
                encseq.unmirror();
            }
            let expected = expected_ranges(encseq);
            let forward: Vec<_> = encseq.special_ranges(true).collect();
            assert_eq!(forward, expected, "{} mirrored {mirrored}", encseq.access_type());
            let mut backward: Vec<_> = encseq.special_ranges(false).collect();
            backward.reverse();
            assert_eq!(backward, expected, "{} mirrored {mirrored}", encseq.access_type());
        }
        encseq.unmirror();
    }

    #[test]
    fn ranges_match_linear_scan() -> anyhow::Result<()> {
        for seed in 0..3 {
            for access in AccessType::ALL {
                let mut rng = SmallRng::seed_from_u64(seed);
                let source = if access == AccessType::EqualLength {
                    fixed_length_input(&mut rng)
                } else {
                    random_input(&mut rng)
                };
                let mut encseq = EncseqBuilder::default()
                    .access_type(Some(access))
                    .build(source)?;
                check(&mut encseq);
            }
        }
        Ok(())
    }

    #[test]
    fn equal_length_separators() -> anyhow::Result<()> {
        let source = MemorySource::new()
            .with_sequence(b"acg")
            .with_sequence(b"ttt")
            .with_sequence(b"gca");
        let mut encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::EqualLength))
            .build(source)?;
        assert_eq!(encseq.special_ranges(true).collect::<Vec<_>>(), vec![3..4, 7..8]);
        check(&mut encseq);
        Ok(())
    }

    #[test]
    fn touching_wildcards_and_separators_coalesce() -> anyhow::Result<()> {
        let mut seq = vec![b'a'; 250];
        seq.extend_from_slice(&[b'n'; 20]);
        let source = MemorySource::new()
            .with_sequence(&seq)
            .with_sequence(b"nnac");
        let encseq = EncseqBuilder::default()
            .access_type(Some(AccessType::UcharTables))
            .build(source)?;
        assert_eq!(encseq.special_ranges(true).collect::<Vec<_>>(), vec![250..273]);
        assert_eq!(encseq.special_ranges(false).collect::<Vec<_>>(), vec![250..273]);
        Ok(())
    }

    #[test]
    fn mirror_center_stands_alone() -> anyhow::Result<()> {
        let source = MemorySource::new().with_sequence(b"acgn");
        let mut encseq = EncseqBuilder::default().build(source)?;
        encseq.mirror();
        // "acgn|ncgt"
        let forward: Vec<_> = encseq.special_ranges(true).collect();
        assert_eq!(forward, vec![3..4, 4..5, 5..6]);
        let backward: Vec<_> = encseq.special_ranges(false).collect();
        assert_eq!(backward, vec![5..6, 4..5, 3..4]);
        Ok(())
    }
}
