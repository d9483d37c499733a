//! Paged sparse tables of special-character runs
//!
//! A table stores sorted, non-overlapping runs `[start, start + len)` of one kind
//! of special character. Positions are split into pages of `2^W::BITS` positions;
//! every entry stores its start as an offset inside its page and its length minus
//! one, both as `W`. A run that crosses a page boundary is stored as one entry per
//! page. For each page the table keeps the number of entries up to and including
//! that page, which locates the entries of a page in O(1) and the page of an entry
//! by binary search.

mod cursor;
mod exception;

pub(crate) use cursor::TableCursor;
pub use exception::ExceptionTable;
pub(crate) use exception::ExceptionBuilder;

use std::fmt;
use std::ops::Range;

use bytemuck::Pod;

use crate::blob::Blob;

/// Integer width of the in-page offsets of a [`SparseSpecialTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableWidth {
    U8,
    U16,
    U32,
}

impl TableWidth {
    pub const ALL: [TableWidth; 3] = [TableWidth::U8, TableWidth::U16, TableWidth::U32];

    /// Number of position bits covered by one page
    #[must_use]
    pub fn page_bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
        }
    }

    /// Bytes per stored offset
    #[must_use]
    pub fn bytes(self) -> u64 {
        u64::from(self.page_bits() / 8)
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::U8 => 0,
            Self::U16 => 1,
            Self::U32 => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::U8),
            1 => Some(Self::U16),
            2 => Some(Self::U32),
            _ => None,
        }
    }

    /// Number of pages for a sequence of `total_length` positions
    #[must_use]
    pub fn num_pages(self, total_length: u64) -> u64 {
        (total_length >> self.page_bits()) + 1
    }

    /// Number of entries the run `[start, start + len)` needs
    #[must_use]
    pub fn entries_for_run(self, start: u64, len: u64) -> u64 {
        debug_assert!(len > 0);
        let bits = self.page_bits();
        ((start + len - 1) >> bits) - (start >> bits) + 1
    }

    /// Bytes of a table with `entries` entries over `total_length` positions
    #[must_use]
    pub fn table_size(self, entries: u64, total_length: u64) -> u64 {
        2 * self.bytes() * entries + 8 * self.num_pages(total_length)
    }
}

impl fmt::Display for TableWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => f.write_str("uchar"),
            Self::U16 => f.write_str("ushort"),
            Self::U32 => f.write_str("uint32"),
        }
    }
}

/// Unsigned integer types usable as in-page offsets
pub trait PageWidth: Pod + Send + Sync + fmt::Debug + 'static {
    const WIDTH: TableWidth;
    const BITS: u32;

    fn from_u64(value: u64) -> Self;
    fn to_u64(self) -> u64;
}

impl PageWidth for u8 {
    const WIDTH: TableWidth = TableWidth::U8;
    const BITS: u32 = 8;

    #[inline]
    fn from_u64(value: u64) -> Self {
        value as u8
    }
    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl PageWidth for u16 {
    const WIDTH: TableWidth = TableWidth::U16;
    const BITS: u32 = 16;

    #[inline]
    fn from_u64(value: u64) -> Self {
        value as u16
    }
    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl PageWidth for u32 {
    const WIDTH: TableWidth = TableWidth::U32;
    const BITS: u32 = 32;

    #[inline]
    fn from_u64(value: u64) -> Self {
        value as u32
    }
    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

/// Splits a run into pieces that do not cross page boundaries
pub(crate) fn split_at_pages(run: Range<u64>, bits: u32) -> impl Iterator<Item = Range<u64>> {
    let mut start = run.start;
    std::iter::from_fn(move || {
        if start >= run.end {
            return None;
        }
        let page_end = ((start >> bits) + 1) << bits;
        let end = page_end.min(run.end);
        let piece = start..end;
        start = end;
        Some(piece)
    })
}

pub struct SparseSpecialTable<W: PageWidth> {
    positions: Blob<W>,
    lengths: Blob<W>,
    end_of_page: Blob<u64>,
}

impl<W: PageWidth> SparseSpecialTable<W> {
    /// Builds a table from sorted, non-overlapping runs
    pub fn from_runs<I>(runs: I, total_length: u64) -> Self
    where
        I: IntoIterator<Item = Range<u64>>,
    {
        let num_pages = W::WIDTH.num_pages(total_length) as usize;
        let mut positions = Vec::new();
        let mut lengths = Vec::new();
        let mut end_of_page = vec![0u64; num_pages];
        let mut page = 0usize;
        for run in runs {
            debug_assert!(run.end <= total_length);
            for piece in split_at_pages(run, W::BITS) {
                let piece_page = (piece.start >> W::BITS) as usize;
                while page < piece_page {
                    end_of_page[page] = positions.len() as u64;
                    page += 1;
                }
                positions.push(W::from_u64(piece.start - ((piece_page as u64) << W::BITS)));
                lengths.push(W::from_u64(piece.end - piece.start - 1));
            }
        }
        for slot in end_of_page.iter_mut().skip(page) {
            *slot = positions.len() as u64;
        }
        Self {
            positions: positions.into(),
            lengths: lengths.into(),
            end_of_page: end_of_page.into(),
        }
    }

    pub(crate) fn from_blobs(positions: Blob<W>, lengths: Blob<W>, end_of_page: Blob<u64>) -> Self {
        debug_assert_eq!(positions.len(), lengths.len());
        Self {
            positions,
            lengths,
            end_of_page,
        }
    }

    pub(crate) fn blobs(&self) -> (&Blob<W>, &Blob<W>, &Blob<u64>) {
        (&self.positions, &self.lengths, &self.end_of_page)
    }

    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.end_of_page.len()
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        (2 * self.positions.len() * size_of::<W>() + 8 * self.end_of_page.len()) as u64
    }

    /// Entry index range of `page`
    #[inline]
    fn page_bounds(&self, page: usize) -> (usize, usize) {
        let start = if page == 0 {
            0
        } else {
            self.end_of_page[page - 1] as usize
        };
        (start, self.end_of_page[page] as usize)
    }

    /// Page holding entry `idx`, searching forward or backward from `hint`
    #[inline]
    fn page_of(&self, idx: usize, hint: usize, forward: bool) -> usize {
        let idx = idx as u64;
        if forward {
            hint + self.end_of_page[hint..].partition_point(|&end| end <= idx)
        } else {
            self.end_of_page[..=hint].partition_point(|&end| end <= idx)
        }
    }

    /// Absolute positions of entry `idx` stored on `page`
    #[inline]
    fn range_at(&self, idx: usize, page: usize) -> Range<u64> {
        let start = ((page as u64) << W::BITS) + self.positions[idx].to_u64();
        start..start + self.lengths[idx].to_u64() + 1
    }

    /// First entry whose range ends after `pos`
    fn first_ending_after(&self, pos: u64) -> Option<(usize, usize)> {
        let page = (pos >> W::BITS) as usize;
        if page >= self.num_pages() {
            return None;
        }
        let (start, end) = self.page_bounds(page);
        let offset = pos - ((page as u64) << W::BITS);
        // entries of a page are sorted and disjoint, so their ends ascend too
        let (mut lo, mut hi) = (start, end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.positions[mid].to_u64() + self.lengths[mid].to_u64() < offset {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let idx = lo;
        if idx < end {
            Some((idx, page))
        } else if idx < self.num_entries() {
            Some((idx, self.page_of(idx, page, true)))
        } else {
            None
        }
    }

    /// Last entry whose range starts at or before `pos`
    fn last_starting_at_or_before(&self, pos: u64) -> Option<(usize, usize)> {
        let page = ((pos >> W::BITS) as usize).min(self.num_pages() - 1);
        let (start, end) = self.page_bounds(page);
        let offset = pos.saturating_sub((page as u64) << W::BITS);
        let within = self.positions[start..end].partition_point(|p| p.to_u64() <= offset);
        if within > 0 {
            Some((start + within - 1, page))
        } else if start > 0 {
            Some((start - 1, self.page_of(start - 1, page, false)))
        } else {
            None
        }
    }

    /// True if `pos` lies inside a stored run
    #[must_use]
    pub fn contains(&self, pos: u64) -> bool {
        self.first_ending_after(pos)
            .is_some_and(|(idx, page)| self.range_at(idx, page).start <= pos)
    }

    /// True if any stored run intersects `range`
    #[must_use]
    pub fn intersects(&self, range: Range<u64>) -> bool {
        if range.is_empty() {
            return false;
        }
        self.first_ending_after(range.start)
            .is_some_and(|(idx, page)| self.range_at(idx, page).start < range.end)
    }

    /// All stored entries in ascending order, split at page boundaries
    pub fn entries(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        let mut page = 0usize;
        (0..self.num_entries()).map(move |idx| {
            page = self.page_of(idx, page, true);
            self.range_at(idx, page)
        })
    }
}

impl<W: PageWidth> fmt::Debug for SparseSpecialTable<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseSpecialTable")
            .field("width", &W::WIDTH)
            .field("entries", &self.num_entries())
            .field("pages", &self.num_pages())
            .finish()
    }
}

/// A sparse table of any of the three widths
#[derive(Debug)]
pub enum AnySpecialTable {
    U8(SparseSpecialTable<u8>),
    U16(SparseSpecialTable<u16>),
    U32(SparseSpecialTable<u32>),
}

impl AnySpecialTable {
    pub fn from_runs<I>(width: TableWidth, runs: I, total_length: u64) -> Self
    where
        I: IntoIterator<Item = Range<u64>>,
    {
        match width {
            TableWidth::U8 => Self::U8(SparseSpecialTable::from_runs(runs, total_length)),
            TableWidth::U16 => Self::U16(SparseSpecialTable::from_runs(runs, total_length)),
            TableWidth::U32 => Self::U32(SparseSpecialTable::from_runs(runs, total_length)),
        }
    }

    #[must_use]
    pub fn width(&self) -> TableWidth {
        match self {
            Self::U8(_) => TableWidth::U8,
            Self::U16(_) => TableWidth::U16,
            Self::U32(_) => TableWidth::U32,
        }
    }

    #[must_use]
    pub fn num_entries(&self) -> usize {
        match self {
            Self::U8(t) => t.num_entries(),
            Self::U16(t) => t.num_entries(),
            Self::U32(t) => t.num_entries(),
        }
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            Self::U8(t) => t.size_in_bytes(),
            Self::U16(t) => t.size_in_bytes(),
            Self::U32(t) => t.size_in_bytes(),
        }
    }

    #[must_use]
    pub fn contains(&self, pos: u64) -> bool {
        match self {
            Self::U8(t) => t.contains(pos),
            Self::U16(t) => t.contains(pos),
            Self::U32(t) => t.contains(pos),
        }
    }

    #[must_use]
    pub fn intersects(&self, range: Range<u64>) -> bool {
        match self {
            Self::U8(t) => t.intersects(range),
            Self::U16(t) => t.intersects(range),
            Self::U32(t) => t.intersects(range),
        }
    }

    pub(crate) fn first_ending_after(&self, pos: u64) -> Option<(usize, usize)> {
        match self {
            Self::U8(t) => t.first_ending_after(pos),
            Self::U16(t) => t.first_ending_after(pos),
            Self::U32(t) => t.first_ending_after(pos),
        }
    }

    pub(crate) fn last_starting_at_or_before(&self, pos: u64) -> Option<(usize, usize)> {
        match self {
            Self::U8(t) => t.last_starting_at_or_before(pos),
            Self::U16(t) => t.last_starting_at_or_before(pos),
            Self::U32(t) => t.last_starting_at_or_before(pos),
        }
    }

    pub(crate) fn page_of(&self, idx: usize, hint: usize, forward: bool) -> usize {
        match self {
            Self::U8(t) => t.page_of(idx, hint, forward),
            Self::U16(t) => t.page_of(idx, hint, forward),
            Self::U32(t) => t.page_of(idx, hint, forward),
        }
    }

    pub(crate) fn range_at(&self, idx: usize, page: usize) -> Range<u64> {
        match self {
            Self::U8(t) => t.range_at(idx, page),
            Self::U16(t) => t.range_at(idx, page),
            Self::U32(t) => t.range_at(idx, page),
        }
    }

    /// Next special position at or after `pos`
    pub(crate) fn next_special_at_or_after(&self, pos: u64) -> Option<u64> {
        self.first_ending_after(pos)
            .map(|(idx, page)| self.range_at(idx, page).start.max(pos))
    }

    /// Last special position at or before `pos`
    pub(crate) fn last_special_at_or_before(&self, pos: u64) -> Option<u64> {
        self.last_starting_at_or_before(pos).map(|(idx, page)| {
            let range = self.range_at(idx, page);
            if pos < range.end {
                pos
            } else {
                range.end - 1
            }
        })
    }

    /// Byte blocks in persisted order: offsets, lengths, page ends
    pub(crate) fn byte_blocks(&self) -> [&[u8]; 3] {
        match self {
            Self::U8(t) => blocks_of(t),
            Self::U16(t) => blocks_of(t),
            Self::U32(t) => blocks_of(t),
        }
    }
}

fn blocks_of<W: PageWidth>(table: &SparseSpecialTable<W>) -> [&[u8]; 3] {
    let (positions, lengths, end_of_page) = table.blobs();
    [positions.as_bytes(), lengths.as_bytes(), end_of_page.as_bytes()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs() -> Vec<Range<u64>> {
        vec![3..5, 250..260, 511..512, 700..1300, 70_000..70_010]
    }

    #[test]
    fn runs_are_split_at_pages() {
        let table = SparseSpecialTable::<u8>::from_runs(runs(), 100_000);
        let entries: Vec<_> = table.entries().collect();
        assert_eq!(entries[0], 3..5);
        assert_eq!(entries[1], 250..256);
        assert_eq!(entries[2], 256..260);
        assert_eq!(entries[3], 511..512);
        assert_eq!(entries[4], 700..768);
        let expected: u64 = runs()
            .iter()
            .map(|r| TableWidth::U8.entries_for_run(r.start, r.end - r.start))
            .sum();
        assert_eq!(table.num_entries() as u64, expected);
        assert_eq!(
            table.size_in_bytes(),
            TableWidth::U8.table_size(expected, 100_000)
        );

        let wide = SparseSpecialTable::<u16>::from_runs(runs(), 100_000);
        assert_eq!(wide.entries().collect::<Vec<_>>(), runs());
    }

    #[test]
    fn membership_matches_runs() {
        for width in TableWidth::ALL {
            let table = AnySpecialTable::from_runs(width, runs(), 100_000);
            for pos in (0..2000).chain(69_990..70_020) {
                let expected = runs().iter().any(|r| r.contains(&pos));
                assert_eq!(table.contains(pos), expected, "{width} at {pos}");
            }
            assert!(table.intersects(0..4));
            assert!(!table.intersects(5..250));
            assert!(table.intersects(1299..1400));
            assert!(!table.intersects(1300..69_999));
        }
    }

    #[test]
    fn neighbouring_specials() {
        let table = AnySpecialTable::from_runs(TableWidth::U8, runs(), 100_000);
        assert_eq!(table.next_special_at_or_after(0), Some(3));
        assert_eq!(table.next_special_at_or_after(4), Some(4));
        assert_eq!(table.next_special_at_or_after(5), Some(250));
        assert_eq!(table.next_special_at_or_after(513), Some(700));
        assert_eq!(table.next_special_at_or_after(70_010), None);
        assert_eq!(table.last_special_at_or_before(2), None);
        assert_eq!(table.last_special_at_or_before(100), Some(4));
        assert_eq!(table.last_special_at_or_before(600), Some(511));
        assert_eq!(table.last_special_at_or_before(99_999), Some(70_009));
    }

    #[test]
    fn empty_table() {
        let table = AnySpecialTable::from_runs(TableWidth::U16, Vec::new(), 10);
        assert_eq!(table.num_entries(), 0);
        assert!(!table.contains(3));
        assert_eq!(table.next_special_at_or_after(0), None);
        assert_eq!(table.last_special_at_or_before(9), None);
    }
}
