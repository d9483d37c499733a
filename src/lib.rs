//! Compact random-access storage for large sequence collections
//!
//! Sequences are concatenated with a separator between neighbours and
//! encoded with one of several access strategies, chosen by a cost model from
//! the distribution of wildcard and separator runs. The result can be read
//! position by position or sequentially in any of four read modes, persisted
//! to a set of memory-mapped index files, and mirrored to expose the reverse
//! complement strand without storing it.
//!
//! ```
//! use encseq::{EncseqBuilder, MemorySource, ReadMode};
//!
//! let source = MemorySource::new()
//!     .with_sequence(b"agctttnttgca")
//!     .with_sequence(b"ggtt");
//! let mut encseq = EncseqBuilder::default().build(source).unwrap();
//! assert_eq!(encseq.total_length(), 17);
//! assert_eq!(encseq.get_decoded_char(ReadMode::ReverseComplement, 0), b'a');
//!
//! encseq.mirror();
//! assert_eq!(encseq.num_sequences(), 4);
//! ```

mod access;
mod alphabet;
mod blob;
pub mod check;
mod encseq;
mod error;
mod header;
mod mapspec;
mod packed;
pub mod parallel;
pub mod prelude;
mod range_iter;
mod reader;
mod readmode;
mod source;
mod stats;
mod table;
mod twobit;

pub use access::{choose_access_type, determine_size, AccessChoice, AccessType};
pub use alphabet::{Alphabet, SEPARATOR, WILDCARD};
pub use encseq::{EncodedSequence, EncseqBuilder, EncseqLoader};
pub use error::{AlphabetError, BuildError, CheckError, Error, HeaderError, ReadError, Result};
pub use header::EncseqHeader;
pub use packed::BitPackedArray;
pub use parallel::{ParallelProcessor, ParallelReader, SequenceView};
pub use range_iter::SpecialRangeIterator;
pub use reader::EncseqReader;
pub use readmode::ReadMode;
pub use source::{FastaSource, MemorySource, SequenceSource, SourceRecord};
pub use stats::{FileLength, SequenceStats, SpecialCharInfo};
pub use table::{AnySpecialTable, ExceptionTable, PageWidth, SparseSpecialTable, TableWidth};
pub use twobit::{compare_two_bit_blocks, CommonUnits, TwoBitBlock};
