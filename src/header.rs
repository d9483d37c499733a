//! Header of the `.esq` index file
//!
//! The header is a fixed-size little-endian record at the start of the index
//! file. It holds everything needed to compute the size and location of every
//! block that follows, so a mapped file can be validated before any block is
//! interpreted.

use byteorder::{ByteOrder, LittleEndian};

use crate::access::AccessType;
use crate::stats::SpecialCharInfo;
use crate::table::TableWidth;
use crate::{error::Result, HeaderError};

/// Current magic number: "ENSQ" in ASCII (in little-endian byte order)
const MAGIC: u32 = 0x5153_4E45;

/// Current format version of the index file
const FORMAT: u8 = 1;

/// Bits per two-bit payload word
const WORD_BITS: u8 = 64;

/// Size of the fixed part of the header in bytes
pub const SIZE_HEADER: usize = 200;

/// A `.ssp` file with separator positions exists
pub const FLAG_SSP: u64 = 1;
/// `.des` and `.sds` files with descriptions exist
pub const FLAG_DESCRIPTIONS: u64 = 1 << 1;
/// An `.exc` file with the lossless exception table exists
pub const FLAG_EXCEPTIONS: u64 = 1 << 2;
/// An `.md5` file with per-sequence checksums exists
pub const FLAG_CHECKSUMS: u64 = 1 << 3;

const UNDEFINED_LENGTH: u64 = u64::MAX;

/// Header of an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncseqHeader {
    /// Magic number to identify the file format
    pub magic: u32,

    /// Version of the file format
    pub format: u8,

    /// Bits per payload word, always 64
    pub word_bits: u8,

    /// Access strategy of the payload
    pub access: AccessType,

    /// Width of the separator table, meaningful for table strategies only
    pub separator_width: TableWidth,

    /// Which optional side files exist
    pub flags: u64,

    pub total_length: u64,
    pub num_sequences: u64,
    pub num_files: u64,

    /// Common sequence length, if all sequences have the same length
    pub equal_length: Option<u64>,
    pub min_seq_len: u64,
    pub max_seq_len: u64,

    pub info: SpecialCharInfo,

    /// Entries of the wildcard table
    pub wildcard_entries: u64,
    /// Entries of the separator table
    pub separator_entries: u64,
    /// Entries of the exception table
    pub exception_entries: u64,

    /// Bytes of the alphabet symbol map following the fixed part
    pub alphabet_len: u64,
    /// Bytes of the NUL-separated filenames following the symbol map
    pub filenames_len: u64,
}

impl EncseqHeader {
    /// A header with the current magic number and format, everything else zero
    #[must_use]
    pub fn new(access: AccessType, total_length: u64, num_sequences: u64) -> Self {
        Self {
            magic: MAGIC,
            format: FORMAT,
            word_bits: WORD_BITS,
            access,
            separator_width: TableWidth::U8,
            flags: 0,
            total_length,
            num_sequences,
            num_files: 0,
            equal_length: None,
            min_seq_len: 0,
            max_seq_len: 0,
            info: SpecialCharInfo::default(),
            wildcard_entries: 0,
            separator_entries: 0,
            exception_entries: 0,
            alphabet_len: 0,
            filenames_len: 0,
        }
    }

    #[must_use]
    pub fn has(&self, flag: u64) -> bool {
        self.flags & flag != 0
    }

    pub fn set(&mut self, flag: u64, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// Parses and validates a header from a fixed-size byte array
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let magic = LittleEndian::read_u32(&buffer[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }
        let format = buffer[4];
        if format != FORMAT {
            return Err(HeaderError::InvalidFormatVersion(format).into());
        }
        let word_bits = buffer[5];
        if word_bits != WORD_BITS {
            return Err(HeaderError::InvalidWordSize(word_bits).into());
        }
        let access =
            AccessType::from_tag(buffer[6]).ok_or(HeaderError::InvalidAccessType(buffer[6]))?;
        let separator_width =
            TableWidth::from_tag(buffer[7]).ok_or(HeaderError::InvalidTableWidth(buffer[7]))?;

        let mut values = [0u64; 24];
        LittleEndian::read_u64_into(&buffer[8..], &mut values);
        let mut info = [0u64; SpecialCharInfo::NUM_FIELDS];
        info.copy_from_slice(&values[7..7 + SpecialCharInfo::NUM_FIELDS]);

        Ok(Self {
            magic,
            format,
            word_bits,
            access,
            separator_width,
            flags: values[0],
            total_length: values[1],
            num_sequences: values[2],
            num_files: values[3],
            equal_length: (values[4] != UNDEFINED_LENGTH).then_some(values[4]),
            min_seq_len: values[5],
            max_seq_len: values[6],
            info: SpecialCharInfo::from_array(info),
            wildcard_entries: values[19],
            separator_entries: values[20],
            exception_entries: values[21],
            alphabet_len: values[22],
            filenames_len: values[23],
        })
    }

    /// Parses a header from the start of a buffer of at least [`SIZE_HEADER`] bytes
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        let mut bytes = [0u8; SIZE_HEADER];
        if buffer.len() < SIZE_HEADER {
            return Err(HeaderError::InvalidSize(buffer.len(), SIZE_HEADER).into());
        }
        bytes.copy_from_slice(&buffer[..SIZE_HEADER]);
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], self.magic);
        buffer[4] = self.format;
        buffer[5] = self.word_bits;
        buffer[6] = self.access.tag();
        buffer[7] = self.separator_width.tag();

        let mut values = [0u64; 24];
        values[0] = self.flags;
        values[1] = self.total_length;
        values[2] = self.num_sequences;
        values[3] = self.num_files;
        values[4] = self.equal_length.unwrap_or(UNDEFINED_LENGTH);
        values[5] = self.min_seq_len;
        values[6] = self.max_seq_len;
        values[7..7 + SpecialCharInfo::NUM_FIELDS].copy_from_slice(&self.info.to_array());
        values[19] = self.wildcard_entries;
        values[20] = self.separator_entries;
        values[21] = self.exception_entries;
        values[22] = self.alphabet_len;
        values[23] = self.filenames_len;
        LittleEndian::write_u64_into(&values, &mut buffer[8..]);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncseqHeader {
        let mut header = EncseqHeader::new(AccessType::UshortTables, 25, 2);
        header.separator_width = TableWidth::U32;
        header.set(FLAG_SSP, true);
        header.set(FLAG_CHECKSUMS, true);
        header.num_files = 1;
        header.equal_length = Some(12);
        header.min_seq_len = 12;
        header.max_seq_len = 12;
        header.info.special_characters = 3;
        header.info.longest_non_special = 6;
        header.wildcard_entries = 2;
        header.separator_entries = 1;
        header.alphabet_len = 40;
        header.filenames_len = 10;
        header
    }

    #[test]
    fn header_round_trip() -> anyhow::Result<()> {
        let header = sample();
        let mut buffer = header.to_bytes().to_vec();
        buffer.extend_from_slice(b"trailing block");
        let parsed = EncseqHeader::from_buffer(&buffer)?;
        assert_eq!(parsed, header);
        assert!(parsed.has(FLAG_SSP));
        assert!(!parsed.has(FLAG_DESCRIPTIONS));
        assert_eq!(&buffer[..4], b"ENSQ");
        Ok(())
    }

    #[test]
    fn undefined_equal_length() -> anyhow::Result<()> {
        let mut header = sample();
        header.equal_length = None;
        let parsed = EncseqHeader::from_bytes(&header.to_bytes())?;
        assert_eq!(parsed.equal_length, None);
        Ok(())
    }

    #[test]
    fn corrupt_fields_are_rejected() {
        let bytes = sample().to_bytes();

        let mut bad = bytes;
        bad[0] = b'X';
        assert!(matches!(
            EncseqHeader::from_bytes(&bad),
            Err(crate::Error::HeaderError(HeaderError::InvalidMagicNumber(_)))
        ));

        let mut bad = bytes;
        bad[6] = 42;
        assert!(matches!(
            EncseqHeader::from_bytes(&bad),
            Err(crate::Error::HeaderError(HeaderError::InvalidAccessType(42)))
        ));

        let mut bad = bytes;
        bad[5] = 32;
        assert!(EncseqHeader::from_bytes(&bad).is_err());

        assert!(EncseqHeader::from_buffer(&bytes[..100]).is_err());
    }
}
