//! Writing an encoded sequence to disk and mapping it back
//!
//! An index `<name>` is stored as `<name>.esq` holding the header, the
//! metadata and the payload, plus optional side files for separator positions
//! (`.ssp`), descriptions (`.des` and `.sds`), the exception table (`.exc`)
//! and checksums (`.md5`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use bytemuck::cast_slice;
use tracing::debug;

use super::payload::{num_bitmap_words, Payload};
use super::{Descriptions, EncodedSequence, EncseqRep};
use crate::access::AccessType;
use crate::alphabet::Alphabet;
use crate::blob::Blob;
use crate::error::{HeaderError, ReadError};
use crate::header::{
    EncseqHeader, FLAG_CHECKSUMS, FLAG_DESCRIPTIONS, FLAG_EXCEPTIONS, FLAG_SSP, SIZE_HEADER,
};
use crate::mapspec::{block_size, total_size, write_blocks, MappedRegion};
use crate::packed::BitPackedArray;
use crate::stats::FileLength;
use crate::table::{
    AnySpecialTable, ExceptionTable, PageWidth, SparseSpecialTable, TableWidth,
};
use crate::twobit;
use crate::Result;

/// Path of the index file with the given suffix
fn index_file(indexname: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(indexname.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Byte size of a persisted table of `entries` entries
fn table_block_size(width: TableWidth, entries: u64, total_length: u64) -> Option<usize> {
    let column = block_size::<u8>(entries.checked_mul(width.bytes())?);
    total_size(&[
        column,
        column,
        block_size::<u64>(width.num_pages(total_length)),
    ])
}

fn payload_block_size(header: &EncseqHeader, alphabet: &Alphabet) -> Option<usize> {
    let total = header.total_length;
    let words = block_size::<u64>(twobit::num_words(total) as u64);
    match header.access {
        AccessType::DirectAccess => block_size::<u8>(total),
        AccessType::ByteCompress => block_size::<u64>(BitPackedArray::checked_num_words(
            total,
            alphabet.bits_per_packed_symbol(),
        )?),
        AccessType::EqualLength => words,
        AccessType::BitAccess => {
            if header.info.special_characters > 0 {
                total_size(&[words, block_size::<u64>(num_bitmap_words(total) as u64)])
            } else {
                words
            }
        }
        AccessType::UcharTables | AccessType::UshortTables | AccessType::Uint32Tables => {
            let mut sizes = vec![words];
            if header.wildcard_entries > 0 {
                let width = header.access.table_width().unwrap_or(TableWidth::U32);
                sizes.push(table_block_size(width, header.wildcard_entries, total));
            }
            if header.separator_entries > 0 {
                sizes.push(table_block_size(
                    header.separator_width,
                    header.separator_entries,
                    total,
                ));
            }
            total_size(&sizes)
        }
    }
}

/// Size of the `.esq` file the header describes, `None` if it overflows
fn declared_size(header: &EncseqHeader, alphabet: &Alphabet) -> Option<usize> {
    total_size(&[
        Some(SIZE_HEADER),
        block_size::<u8>(header.alphabet_len),
        block_size::<u8>(header.filenames_len),
        block_size::<u64>(header.num_files.checked_mul(2)?),
        block_size::<u64>(u64::from(alphabet.num_of_chars())),
        payload_block_size(header, alphabet),
    ])
}

fn exception_file_size(entries: u64, num_of_classes: usize, total_length: u64) -> Option<usize> {
    total_size(&[
        block_size::<u8>(num_of_classes as u64),
        table_block_size(TableWidth::U32, entries, total_length),
        block_size::<u8>(entries),
    ])
}

fn table_entries(table: Option<&AnySpecialTable>) -> u64 {
    table.map_or(0, |t| t.num_entries() as u64)
}

impl EncodedSequence {
    /// Writes the index files for `indexname`
    ///
    /// A mirrored handle writes the stored data only.
    pub fn persist<P: AsRef<Path>>(&self, indexname: P) -> Result<()> {
        let indexname = indexname.as_ref();
        let rep = &*self.rep;

        let mut header = EncseqHeader::new(self.access_type(), rep.total_length, rep.num_sequences);
        header.separator_width = rep.separator_width;
        header.num_files = rep.file_lengths.len() as u64;
        header.equal_length = rep.equal_length;
        header.min_seq_len = rep.min_seq_len;
        header.max_seq_len = rep.max_seq_len;
        header.info = rep.info;
        header.set(FLAG_SSP, rep.ssp_table);
        header.set(FLAG_DESCRIPTIONS, rep.descriptions.is_some());
        header.set(FLAG_EXCEPTIONS, rep.exceptions.is_some());
        header.set(FLAG_CHECKSUMS, rep.checksums.is_some());
        if let Payload::Tables {
            wildcards,
            separators,
            ..
        } = &rep.payload
        {
            header.wildcard_entries = table_entries(wildcards.as_ref());
            header.separator_entries = table_entries(separators.as_ref());
        }
        header.exception_entries = rep
            .exceptions
            .as_ref()
            .map_or(0, |e| e.num_entries() as u64);

        let alphabet = rep.alphabet.to_symbol_map();
        let filenames = rep.filenames.join("\0");
        header.alphabet_len = alphabet.len() as u64;
        header.filenames_len = filenames.len() as u64;
        let file_lengths: Vec<u64> = rep
            .file_lengths
            .iter()
            .flat_map(|f| [f.length, f.effective_length])
            .collect();

        let header_bytes = header.to_bytes();
        let mut blocks: Vec<&[u8]> = vec![
            &header_bytes[..],
            alphabet.as_bytes(),
            filenames.as_bytes(),
            cast_slice(&file_lengths),
            cast_slice(&rep.char_distribution),
        ];
        match &rep.payload {
            Payload::Direct(bytes) => blocks.push(bytes.as_bytes()),
            Payload::ByteCompress { packed, .. } => blocks.push(packed.words().as_bytes()),
            Payload::EqualLength { words, .. } => blocks.push(words.as_bytes()),
            Payload::BitAccess {
                words,
                special_bits,
            } => {
                blocks.push(words.as_bytes());
                if let Some(bits) = special_bits {
                    blocks.push(bits.as_bytes());
                }
            }
            Payload::Tables {
                words,
                wildcards,
                separators,
                ..
            } => {
                blocks.push(words.as_bytes());
                for table in [wildcards, separators].into_iter().flatten() {
                    blocks.extend(table.byte_blocks());
                }
            }
        }
        let written = write_blocks(&index_file(indexname, "esq"), &blocks)?;
        debug_assert_eq!(Some(written), declared_size(&header, &rep.alphabet));

        if rep.ssp_table && rep.num_sequences > 1 {
            let ssp = rep.separator_positions();
            write_blocks(&index_file(indexname, "ssp"), &[cast_slice(ssp)])?;
        }
        if let Some(descriptions) = &rep.descriptions {
            write_blocks(
                &index_file(indexname, "des"),
                &[descriptions.text.as_bytes()],
            )?;
            write_blocks(
                &index_file(indexname, "sds"),
                &[descriptions.ends.as_bytes()],
            )?;
        }
        if let Some(exceptions) = &rep.exceptions {
            let (positions, lengths, end_of_page) = exceptions.table().blobs();
            write_blocks(
                &index_file(indexname, "exc"),
                &[
                    exceptions.representative_blob().as_bytes(),
                    positions.as_bytes(),
                    lengths.as_bytes(),
                    end_of_page.as_bytes(),
                    exceptions.sub_indices().as_bytes(),
                ],
            )?;
        }
        if let Some(checksums) = &rep.checksums {
            write_blocks(&index_file(indexname, "md5"), &[checksums.as_bytes()])?;
        }
        debug!(
            index = %indexname.display(),
            access = %header.access,
            bytes = written,
            "persisted encoded sequence"
        );
        Ok(())
    }
}

/// Maps a persisted index back into memory
///
/// The main file is always loaded; each side table is mapped only when
/// requested. Requesting a table the index was written without is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncseqLoader {
    ssp: bool,
    descriptions: bool,
    exceptions: bool,
    checksums: bool,
}

impl EncseqLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps the separator positions instead of recomputing them on demand
    #[must_use]
    pub fn with_ssp(mut self, ssp: bool) -> Self {
        self.ssp = ssp;
        self
    }

    #[must_use]
    pub fn with_descriptions(mut self, descriptions: bool) -> Self {
        self.descriptions = descriptions;
        self
    }

    #[must_use]
    pub fn with_exceptions(mut self, exceptions: bool) -> Self {
        self.exceptions = exceptions;
        self
    }

    #[must_use]
    pub fn with_checksums(mut self, checksums: bool) -> Self {
        self.checksums = checksums;
        self
    }

    fn require(header: &EncseqHeader, flag: u64, name: &'static str) -> Result<()> {
        if header.has(flag) {
            Ok(())
        } else {
            Err(ReadError::MissingTable(name).into())
        }
    }

    pub fn load<P: AsRef<Path>>(&self, indexname: P) -> Result<EncodedSequence> {
        let indexname = indexname.as_ref();
        let mut region = MappedRegion::open(&index_file(indexname, "esq"))?;
        let header = EncseqHeader::from_buffer(region.remaining())?;
        region.skip(SIZE_HEADER as u64)?;

        let alphabet_text = std::str::from_utf8(region.take_bytes(header.alphabet_len)?)?;
        let alphabet = Alphabet::from_symbol_map(alphabet_text)?;
        region.expect_size(declared_size(&header, &alphabet))?;

        let filenames_block = region.take_bytes(header.filenames_len)?;
        let filenames: Vec<String> = if header.num_files == 0 {
            Vec::new()
        } else {
            String::from_utf8_lossy(filenames_block)
                .split('\0')
                .map(str::to_string)
                .collect()
        };
        if filenames.len() as u64 != header.num_files {
            return Err(HeaderError::InvalidFilenames {
                expected: header.num_files,
                found: filenames.len(),
            }
            .into());
        }
        let file_lengths: Blob<u64> = region.take(2 * header.num_files)?;
        let file_lengths = file_lengths
            .chunks_exact(2)
            .map(|pair| FileLength {
                length: pair[0],
                effective_length: pair[1],
            })
            .collect();
        let char_distribution: Blob<u64> = region.take(u64::from(alphabet.num_of_chars()))?;
        let char_distribution = char_distribution.to_vec();

        let payload = Self::load_payload(&mut region, &header, &alphabet)?;

        let ssp = if self.ssp {
            Self::require(&header, FLAG_SSP, "ssp")?;
            OnceLock::from(Self::load_ssp(indexname, header.num_sequences)?)
        } else {
            OnceLock::new()
        };
        let descriptions = if self.descriptions {
            Self::require(&header, FLAG_DESCRIPTIONS, "description")?;
            Some(Self::load_descriptions(indexname, header.num_sequences)?)
        } else {
            None
        };
        let exceptions = if self.exceptions {
            Self::require(&header, FLAG_EXCEPTIONS, "exception")?;
            Some(Self::load_exceptions(indexname, &header, &alphabet)?)
        } else {
            None
        };
        let checksums = if self.checksums {
            Self::require(&header, FLAG_CHECKSUMS, "checksum")?;
            let path = index_file(indexname, "md5");
            let mut region = MappedRegion::open(&path)?;
            region.expect_size(block_size::<[u8; 16]>(header.num_sequences))?;
            Some(region.take(header.num_sequences)?)
        } else {
            None
        };

        debug!(
            index = %indexname.display(),
            access = %header.access,
            total_length = header.total_length,
            num_sequences = header.num_sequences,
            "loaded encoded sequence"
        );

        Ok(EncodedSequence::from_rep(EncseqRep {
            payload,
            alphabet,
            total_length: header.total_length,
            num_sequences: header.num_sequences,
            info: header.info,
            separator_width: header.separator_width,
            equal_length: header.equal_length,
            min_seq_len: header.min_seq_len,
            max_seq_len: header.max_seq_len,
            filenames,
            file_lengths,
            char_distribution,
            ssp_table: header.has(FLAG_SSP),
            ssp,
            descriptions,
            exceptions,
            checksums,
        }))
    }

    fn load_payload(
        region: &mut MappedRegion,
        header: &EncseqHeader,
        alphabet: &Alphabet,
    ) -> Result<Payload> {
        let total = header.total_length;
        let num_words = twobit::num_words(total) as u64;
        let payload = match header.access {
            AccessType::DirectAccess => Payload::Direct(region.take(total)?),
            AccessType::ByteCompress => {
                let bits = alphabet.bits_per_packed_symbol();
                let words = region.take(BitPackedArray::num_words(total, bits) as u64)?;
                Payload::ByteCompress {
                    packed: BitPackedArray::from_blob(total, bits, words),
                    num_of_chars: alphabet.num_of_chars(),
                }
            }
            AccessType::EqualLength => Payload::EqualLength {
                words: region.take(num_words)?,
                seq_len: header.equal_length.unwrap_or(total),
            },
            AccessType::BitAccess => {
                let words = region.take(num_words)?;
                let special_bits = if header.info.special_characters > 0 {
                    Some(region.take(num_bitmap_words(total) as u64)?)
                } else {
                    None
                };
                Payload::BitAccess {
                    words,
                    special_bits,
                }
            }
            AccessType::UcharTables | AccessType::UshortTables | AccessType::Uint32Tables => {
                let width = header.access.table_width().unwrap_or(TableWidth::U32);
                let words = region.take(num_words)?;
                let wildcards = if header.wildcard_entries > 0 {
                    Some(load_table(region, width, header.wildcard_entries, total)?)
                } else {
                    None
                };
                let separators = if header.separator_entries > 0 {
                    Some(load_table(
                        region,
                        header.separator_width,
                        header.separator_entries,
                        total,
                    )?)
                } else {
                    None
                };
                Payload::Tables {
                    words,
                    width,
                    wildcards,
                    separators,
                }
            }
        };
        Ok(payload)
    }

    fn load_ssp(indexname: &Path, num_sequences: u64) -> Result<Blob<u64>> {
        if num_sequences < 2 {
            return Ok(Blob::default());
        }
        let count = num_sequences - 1;
        let mut region = MappedRegion::open(&index_file(indexname, "ssp"))?;
        region.expect_size(block_size::<u64>(count))?;
        region.take(count)
    }

    fn load_descriptions(indexname: &Path, num_sequences: u64) -> Result<Descriptions> {
        let mut ends_region = MappedRegion::open(&index_file(indexname, "sds"))?;
        ends_region.expect_size(block_size::<u64>(num_sequences))?;
        let ends: Blob<u64> = ends_region.take(num_sequences)?;
        let text_len = ends.last().map_or(Some(0), |&end| end.checked_add(1));

        let mut text_region = MappedRegion::open(&index_file(indexname, "des"))?;
        text_region.expect_size(text_len.and_then(block_size::<u8>))?;
        let text = text_region.take(text_len.unwrap_or(0))?;
        Ok(Descriptions { text, ends })
    }

    fn load_exceptions(
        indexname: &Path,
        header: &EncseqHeader,
        alphabet: &Alphabet,
    ) -> Result<ExceptionTable> {
        let entries = header.exception_entries;
        let classes = alphabet.num_of_classes();
        let mut region = MappedRegion::open(&index_file(indexname, "exc"))?;
        region.expect_size(exception_file_size(
            header.exception_entries,
            classes,
            header.total_length,
        ))?;
        let representatives = region.take(classes as u64)?;
        let table = take_table::<u32>(&mut region, entries, header.total_length)?;
        let sub_index = region.take(entries)?;
        Ok(ExceptionTable::from_parts(table, sub_index, representatives))
    }
}

fn take_table<W: PageWidth>(
    region: &mut MappedRegion,
    entries: u64,
    total_length: u64,
) -> Result<SparseSpecialTable<W>> {
    let positions = region.take(entries)?;
    let lengths = region.take(entries)?;
    let end_of_page = region.take(W::WIDTH.num_pages(total_length))?;
    Ok(SparseSpecialTable::from_blobs(positions, lengths, end_of_page))
}

fn load_table(
    region: &mut MappedRegion,
    width: TableWidth,
    entries: u64,
    total_length: u64,
) -> Result<AnySpecialTable> {
    Ok(match width {
        TableWidth::U8 => AnySpecialTable::U8(take_table(region, entries, total_length)?),
        TableWidth::U16 => AnySpecialTable::U16(take_table(region, entries, total_length)?),
        TableWidth::U32 => AnySpecialTable::U32(take_table(region, entries, total_length)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encseq::EncseqBuilder;
    use crate::source::MemorySource;
    use crate::ReadMode;

    fn sample() -> MemorySource {
        [
            ("chr1 first", "acgtnnacgtACGTRYacgt"),
            ("chr2", "ggggccccaaaattttnacg"),
            ("chr3 last", "ttttttttttttttttttta"),
        ]
        .into_iter()
        .collect()
    }

    fn assert_same(a: &EncodedSequence, b: &EncodedSequence) {
        assert_eq!(a.total_length(), b.total_length());
        for readmode in ReadMode::ALL {
            for pos in 0..a.total_length() {
                assert_eq!(
                    a.get_encoded_char(readmode, pos),
                    b.get_encoded_char(readmode, pos),
                    "{readmode} at {pos}"
                );
            }
        }
    }

    #[test]
    fn all_side_tables() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let index = dir.path().join("sample");
        let built = EncseqBuilder::default()
            .lossless(true)
            .descriptions(true)
            .ssp_table(true)
            .checksum(|seq| {
                let mut digest = [0u8; 16];
                digest[0] = seq.len() as u8;
                digest
            })
            .build(sample())?;
        built.persist(&index)?;

        let loaded = EncseqLoader::new()
            .with_ssp(true)
            .with_descriptions(true)
            .with_exceptions(true)
            .with_checksums(true)
            .load(&index)?;
        assert_same(&built, &loaded);
        assert_eq!(loaded.access_type(), built.access_type());
        assert_eq!(loaded.separator_positions(), &[20, 41]);
        assert_eq!(loaded.description(2)?, b"chr3 last");
        assert_eq!(loaded.checksum(1)?[0], 20);
        assert_eq!(loaded.filenames(), built.filenames());
        assert_eq!(loaded.file_lengths(), built.file_lengths());
        assert_eq!(loaded.special_char_info(), built.special_char_info());
        let mut original = Vec::new();
        loaded.extract_original(ReadMode::Forward, 0, 20, &mut original)?;
        assert_eq!(original, b"acgtnnacgtACGTRYacgt");
        Ok(())
    }

    #[test]
    fn missing_side_table() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let index = dir.path().join("plain");
        EncseqBuilder::default().build(sample())?.persist(&index)?;
        let result = EncseqLoader::new().with_descriptions(true).load(&index);
        assert!(matches!(
            result,
            Err(crate::Error::ReadError(ReadError::MissingTable("description")))
        ));
        let loaded = EncseqLoader::new().load(&index)?;
        assert_eq!(loaded.separator_positions(), &[20, 41]);
        Ok(())
    }

    #[test]
    fn overflowing_header_fields_are_size_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for access in AccessType::ALL {
            let source = if access == AccessType::EqualLength {
                MemorySource::new().with_sequence(b"acgt").with_sequence(b"ggta")
            } else {
                MemorySource::new().with_sequence(b"acgtn").with_sequence(b"ggt")
            };
            let index = dir.path().join(access.name());
            EncseqBuilder::default()
                .access_type(Some(access))
                .build(source)?
                .persist(&index)?;
            let path = index_file(&index, "esq");
            let pristine = std::fs::read(&path)?;

            // total_length and num_files, then the table entry counts
            let mut offsets = vec![16, 32];
            if access.table_width().is_some() {
                offsets.extend([160, 168]);
            }
            for offset in offsets {
                for value in [u64::MAX, 1 << 62, 1 << 61] {
                    let mut bytes = pristine.clone();
                    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
                    std::fs::write(&path, &bytes)?;
                    let result = EncseqLoader::new().load(&index);
                    assert!(
                        matches!(
                            result,
                            Err(crate::Error::HeaderError(HeaderError::InvalidSize(..)))
                        ),
                        "{access}: {value} at {offset} gave {result:?}"
                    );
                }
            }

            // symbol map length, read before the file size is known
            let mut bytes = pristine.clone();
            bytes[184..192].copy_from_slice(&u64::MAX.to_le_bytes());
            std::fs::write(&path, &bytes)?;
            assert!(EncseqLoader::new().load(&index).is_err());
        }
        Ok(())
    }

    #[test]
    fn size_mismatch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let index = dir.path().join("short");
        EncseqBuilder::default().build(sample())?.persist(&index)?;
        let path = index_file(&index, "esq");
        let mut bytes = std::fs::read(&path)?;
        bytes.truncate(bytes.len() - 8);
        std::fs::write(&path, &bytes)?;
        assert!(matches!(
            EncseqLoader::new().load(&index),
            Err(crate::Error::HeaderError(HeaderError::InvalidSize(..)))
        ));

        bytes[6] = 99;
        std::fs::write(&path, &bytes)?;
        assert!(matches!(
            EncseqLoader::new().load(&index),
            Err(crate::Error::HeaderError(HeaderError::InvalidAccessType(99)))
        ));
        Ok(())
    }
}
