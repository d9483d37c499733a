//! Access strategies and the cost model choosing between them

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::BuildError;
use crate::packed::BitPackedArray;
use crate::stats::SequenceStats;
use crate::table::TableWidth;
use crate::twobit;

/// How the symbols of an encoded sequence are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    /// One byte per symbol
    DirectAccess,
    /// Bit-packed codes, with two extra codes for wildcard and separator
    ByteCompress,
    /// Two-bit codes; all sequences have the same length and separators are implied
    EqualLength,
    /// Two-bit codes plus one bit per position marking special characters
    BitAccess,
    /// Two-bit codes plus sparse tables with 8-bit page offsets
    UcharTables,
    /// Two-bit codes plus sparse tables with 16-bit page offsets
    UshortTables,
    /// Two-bit codes plus sparse tables with 32-bit page offsets
    Uint32Tables,
}

impl AccessType {
    pub const ALL: [AccessType; 7] = [
        AccessType::DirectAccess,
        AccessType::ByteCompress,
        AccessType::EqualLength,
        AccessType::BitAccess,
        AccessType::UcharTables,
        AccessType::UshortTables,
        AccessType::Uint32Tables,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DirectAccess => "direct",
            Self::ByteCompress => "bytecompress",
            Self::EqualLength => "eqlen",
            Self::BitAccess => "bit",
            Self::UcharTables => "uchar",
            Self::UshortTables => "ushort",
            Self::Uint32Tables => "uint32",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::DirectAccess => 0,
            Self::ByteCompress => 1,
            Self::EqualLength => 2,
            Self::BitAccess => 3,
            Self::UcharTables => 4,
            Self::UshortTables => 5,
            Self::Uint32Tables => 6,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|access| access.tag() == tag)
    }

    /// Width of the wildcard table for the table strategies
    #[must_use]
    pub fn table_width(self) -> Option<TableWidth> {
        match self {
            Self::UcharTables => Some(TableWidth::U8),
            Self::UshortTables => Some(TableWidth::U16),
            Self::Uint32Tables => Some(TableWidth::U32),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_table_width(width: TableWidth) -> Self {
        match width {
            TableWidth::U8 => Self::UcharTables,
            TableWidth::U16 => Self::UshortTables,
            TableWidth::U32 => Self::Uint32Tables,
        }
    }

    /// True for the strategies storing symbols as two-bit words
    #[must_use]
    pub fn is_two_bit(self) -> bool {
        !matches!(self, Self::DirectAccess | Self::ByteCompress)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AccessType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|access| access.name() == s)
            .ok_or_else(|| BuildError::UnknownAccessType(s.to_string()).into())
    }
}

/// The outcome of the cost model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessChoice {
    pub access: AccessType,
    /// Width of the separator table; only meaningful for table strategies
    pub separator_width: TableWidth,
    /// Bytes needed by the payload and its side tables
    pub size: u64,
}

/// Bytes of the two-bit words for `total_length` symbols
fn two_bit_size(total_length: u64) -> u64 {
    8 * twobit::num_words(total_length) as u64
}

/// Cheapest separator table width and its cost
fn separator_table(stats: &SequenceStats) -> (TableWidth, u64) {
    if stats.info.separators == 0 {
        return (TableWidth::U8, 0);
    }
    TableWidth::ALL
        .into_iter()
        .map(|width| {
            let size = width.table_size(stats.separator_entries(width), stats.total_length);
            (width, size)
        })
        .min_by_key(|&(_, size)| size)
        .unwrap_or((TableWidth::U32, 0))
}

/// Why `access` cannot encode the input, if it cannot
fn incompatibility(access: AccessType, stats: &SequenceStats, num_of_chars: u8) -> Option<&'static str> {
    if access.is_two_bit() && num_of_chars != 4 {
        return Some("two-bit encodings need an alphabet of four symbols");
    }
    if access == AccessType::EqualLength {
        if stats.equal_length.is_none() {
            return Some("sequences differ in length");
        }
        if stats.info.wildcards > 0 {
            return Some("input contains wildcards");
        }
    }
    None
}

/// Bytes the payload and side tables of `access` need, or `None` if `access`
/// cannot represent the input
#[must_use]
pub fn determine_size(access: AccessType, stats: &SequenceStats, num_of_chars: u8) -> Option<u64> {
    if incompatibility(access, stats, num_of_chars).is_some() {
        return None;
    }
    let total = stats.total_length;
    let size = match access {
        AccessType::DirectAccess => total,
        AccessType::ByteCompress => {
            let bits = crate::alphabet::bits_per_symbol(u32::from(num_of_chars) + 2);
            8 * BitPackedArray::num_words(total, bits) as u64
        }
        AccessType::EqualLength => two_bit_size(total),
        AccessType::BitAccess => {
            let mut size = two_bit_size(total);
            if stats.info.special_characters > 0 {
                size += 8 * (total + 64).div_ceil(64);
            }
            size
        }
        AccessType::UcharTables | AccessType::UshortTables | AccessType::Uint32Tables => {
            let width = access.table_width()?;
            let mut size = two_bit_size(total) + separator_table(stats).1;
            let entries = stats.wildcard_entries(width);
            if entries > 0 {
                size += width.table_size(entries, total);
            }
            size
        }
    };
    Some(size)
}

/// Picks the access strategy for `stats`, honouring a forced choice
pub fn choose_access_type(
    stats: &SequenceStats,
    num_of_chars: u8,
    forced: Option<AccessType>,
) -> crate::Result<AccessChoice> {
    let separator_width = separator_table(stats).0;
    if let Some(access) = forced {
        if let Some(reason) = incompatibility(access, stats, num_of_chars) {
            return Err(BuildError::IncompatibleAccessType { access, reason }.into());
        }
        let size = determine_size(access, stats, num_of_chars).unwrap_or_default();
        return Ok(AccessChoice {
            access,
            separator_width,
            size,
        });
    }

    let candidates: &[AccessType] = if num_of_chars == 4 {
        &[
            AccessType::EqualLength,
            AccessType::BitAccess,
            AccessType::UcharTables,
            AccessType::UshortTables,
            AccessType::Uint32Tables,
            AccessType::DirectAccess,
        ]
    } else {
        &[AccessType::ByteCompress, AccessType::DirectAccess]
    };

    let mut best: Option<AccessChoice> = None;
    for &access in candidates {
        let Some(size) = determine_size(access, stats, num_of_chars) else {
            continue;
        };
        debug!(access = %access, size, "candidate access type");
        if best.is_none_or(|b| size < b.size) {
            best = Some(AccessChoice {
                access,
                separator_width,
                size,
            });
        }
    }
    Ok(best.unwrap_or(AccessChoice {
        access: AccessType::DirectAccess,
        separator_width,
        size: stats.total_length,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::stats::StatsCollector;

    fn stats_for(seqs: &[&[u8]], alpha: &Alphabet) -> SequenceStats {
        let mut collector = StatsCollector::new(alpha, false);
        for seq in seqs {
            collector.start_sequence(0);
            for &ch in *seq {
                collector.push(alpha.encode(ch).unwrap(), None);
            }
        }
        collector.finish()
    }

    #[test]
    fn names_round_trip() -> anyhow::Result<()> {
        for access in AccessType::ALL {
            assert_eq!(access.name().parse::<AccessType>()?, access);
            assert_eq!(AccessType::from_tag(access.tag()), Some(access));
        }
        assert!("nope".parse::<AccessType>().is_err());
        assert_eq!(AccessType::from_tag(99), None);
        Ok(())
    }

    #[test]
    fn small_inputs_use_direct_access() -> anyhow::Result<()> {
        let alpha = Alphabet::dna();
        let stats = stats_for(&[b"agctttnttgca"], &alpha);
        let choice = choose_access_type(&stats, 4, None)?;
        assert_eq!(choice.access, AccessType::DirectAccess);
        assert_eq!(choice.size, 12);
        Ok(())
    }

    #[test]
    fn large_inputs_use_two_bits() -> anyhow::Result<()> {
        let alpha = Alphabet::dna();
        let long: Vec<u8> = (0..5000).map(|i| b"acgt"[i % 4]).collect();
        let mut with_n = long.clone();
        with_n[100] = b'n';

        let stats = stats_for(&[&long, &long], &alpha);
        assert_eq!(choose_access_type(&stats, 4, None)?.access, AccessType::EqualLength);

        let stats = stats_for(&[&with_n, &long[..4000]], &alpha);
        let choice = choose_access_type(&stats, 4, None)?;
        assert!(choice.access.is_two_bit());
        assert_ne!(choice.access, AccessType::EqualLength);
        assert!(choice.size < stats.total_length / 3);
        Ok(())
    }

    #[test]
    fn forced_incompatible_choices() {
        let alpha = Alphabet::dna();
        let stats = stats_for(&[b"acgtn", b"ac"], &alpha);
        assert!(choose_access_type(&stats, 4, Some(AccessType::EqualLength)).is_err());
        let protein = Alphabet::protein();
        let stats = stats_for(&[b"MKV"], &protein);
        assert!(choose_access_type(&stats, 20, Some(AccessType::BitAccess)).is_err());
        assert!(choose_access_type(&stats, 20, Some(AccessType::ByteCompress)).is_ok());
        assert_eq!(
            determine_size(AccessType::ByteCompress, &stats, 20),
            Some(8)
        );
    }
}
