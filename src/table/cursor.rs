use std::ops::Range;

use super::AnySpecialTable;

/// Position of a sequential traversal within a [`AnySpecialTable`]
///
/// Moving forward, `current` is the first range ending after the last queried
/// position; moving backward it is the last range starting at or before it.
/// `None` means no range is left in the direction of travel.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableCursor {
    forward: bool,
    idx: usize,
    page: usize,
    current: Option<Range<u64>>,
}

impl TableCursor {
    /// Locates the range relevant for `pos` by binary search
    pub(crate) fn prepare(table: &AnySpecialTable, pos: u64, forward: bool) -> Self {
        let found = if forward {
            table.first_ending_after(pos)
        } else {
            table.last_starting_at_or_before(pos)
        };
        match found {
            Some((idx, page)) => Self {
                forward,
                idx,
                page,
                current: Some(table.range_at(idx, page)),
            },
            None => Self {
                forward,
                ..Self::default()
            },
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> Option<&Range<u64>> {
        self.current.as_ref()
    }

    /// Steps to the next entry in the direction of travel
    pub(crate) fn advance(&mut self, table: &AnySpecialTable) {
        if self.forward {
            if self.idx + 1 < table.num_entries() {
                self.idx += 1;
                self.page = table.page_of(self.idx, self.page, true);
                self.current = Some(table.range_at(self.idx, self.page));
            } else {
                self.current = None;
            }
        } else if self.current.is_some() && self.idx > 0 {
            self.idx -= 1;
            self.page = table.page_of(self.idx, self.page, false);
            self.current = Some(table.range_at(self.idx, self.page));
        } else {
            self.current = None;
        }
    }

    /// True if `pos` is inside a range; positions must be queried monotonically
    /// in the direction of travel.
    #[inline]
    pub(crate) fn is_special(&mut self, table: &AnySpecialTable, pos: u64) -> bool {
        if self.forward {
            while let Some(range) = &self.current {
                if range.end > pos {
                    return range.start <= pos;
                }
                self.advance(table);
            }
        } else {
            while let Some(range) = &self.current {
                if range.start <= pos {
                    return pos < range.end;
                }
                self.advance(table);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableWidth;

    #[test]
    fn sequential_matches_random() {
        let runs = vec![0..2, 255..258, 600..601, 601..700, 1023..1024];
        for width in TableWidth::ALL {
            let table = AnySpecialTable::from_runs(width, runs.clone(), 1024);
            let mut cursor = TableCursor::prepare(&table, 0, true);
            for pos in 0..1024 {
                assert_eq!(cursor.is_special(&table, pos), table.contains(pos));
            }
            let mut cursor = TableCursor::prepare(&table, 1023, false);
            for pos in (0..1024).rev() {
                assert_eq!(cursor.is_special(&table, pos), table.contains(pos));
            }
        }
    }
}
