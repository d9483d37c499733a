use crate::access::AccessType;

/// Custom Result type for encseq operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the encseq library, encompassing all possible error cases
/// that can occur while building, persisting or reading encoded sequences.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to the persisted header
    HeaderError(#[from] HeaderError),
    /// Errors that occur while loading or reading an encoded sequence
    ReadError(#[from] ReadError),
    /// Errors that occur while building an encoded sequence
    BuildError(#[from] BuildError),
    /// Errors in an alphabet definition
    AlphabetError(#[from] AlphabetError),
    /// Failed consistency checks
    CheckError(#[from] CheckError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Errors from the bitnuc nucleotide processing library
    BitnucError(#[from] bitnuc::Error),
    /// Errors from the FASTA parser
    FastaError(#[from] seq_io::fasta::Error),
    /// Errors while detecting or opening a compressed input
    NifflerError(#[from] niffler::Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to processing and validating the persisted header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `u8` - The unsupported version number that was found
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The index was written with a two-bit word size other than 64 bits
    #[error("Unsupported word size: {0} bits")]
    InvalidWordSize(u8),

    /// The access type tag is not one of the known strategies
    #[error("Invalid access type tag: {0}")]
    InvalidAccessType(u8),

    /// The separator table width tag is not one of the known widths
    #[error("Invalid table width tag: {0}")]
    InvalidTableWidth(u8),

    /// The filenames block could not be split into the declared number of files
    #[error("Filename block holds {found} names, expected {expected}")]
    InvalidFilenames { expected: u64, found: usize },

    /// The size of the data does not match what was specified in the header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The expected number of bytes according to the header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),
}

/// Errors that can occur while loading or reading encoded sequence data
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The file being read is not a regular file (e.g., it might be a directory or special file)
    #[error("File is not regular: {0}")]
    IncompatibleFile(String),

    /// A mapped block does not have the size declared for it
    #[error("Block {name} has {actual} bytes, expected {expected}")]
    BlockSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// An optional table was requested but is not part of the index
    #[error("Index has no {0} table")]
    MissingTable(&'static str),

    /// Two-bit block operations require a two-bit payload
    #[error("Access type {0} has no two-bit encoding")]
    NoTwoBitEncoding(AccessType),

    /// Two-bit output needs an alphabet of four symbols
    #[error("Alphabet has {0} symbols, two-bit output needs 4")]
    NotTwoBitAlphabet(u8),

    /// Attempted to access a sequence number that is beyond the available range
    ///
    /// # Arguments
    /// * First `u64` - The requested index
    /// * Second `u64` - The number of available entries
    #[error("Requested index ({0}) is out of range ({1})")]
    OutOfRange(u64, u64),
}

/// Errors that can occur while building an encoded sequence
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// The input contains a character the alphabet cannot encode
    #[error("Invalid character {ch:?} in sequence {seqnum} at offset {offset}")]
    InvalidCharacter { ch: char, seqnum: u64, offset: u64 },

    /// The source yields no sequences
    #[error("Input contains no sequences")]
    EmptyInput,

    /// A sequence of length zero was found
    #[error("Sequence {0} is empty")]
    EmptySequence(u64),

    /// A forced access type cannot represent the input
    #[error("Access type {access} cannot encode this input: {reason}")]
    IncompatibleAccessType {
        access: AccessType,
        reason: &'static str,
    },

    /// The source delivered different data in the encode pass than in the statistics pass
    #[error("Source changed between passes: expected {expected} symbols, got {got}")]
    SourceChanged { expected: u64, got: u64 },

    /// An access type name could not be parsed
    #[error("Unknown access type: {0}")]
    UnknownAccessType(String),

    /// A read mode name could not be parsed
    #[error("Unknown read mode: {0}")]
    UnknownReadMode(String),
}

/// Errors in alphabet definitions
#[derive(thiserror::Error, Debug)]
pub enum AlphabetError {
    /// The definition contains no symbol lines
    #[error("Alphabet definition is empty")]
    Empty,

    /// More symbols than fit below the wildcard code
    #[error("Alphabet has {0} symbols, at most 253 are supported")]
    TooManySymbols(usize),

    /// A character appears in more than one symbol class
    #[error("Character {0:?} is mapped twice")]
    DuplicateCharacter(char),

    /// A line of the definition contains no characters
    #[error("Line {0} of the alphabet definition is empty")]
    EmptyLine(usize),
}

/// Disagreements found by the consistency checks in [`crate::check`]
#[derive(thiserror::Error, Debug)]
pub enum CheckError {
    /// Random and sequential access differ
    #[error("{readmode}: position {pos} decodes to {random} randomly but {sequential} sequentially")]
    AccessMismatch {
        readmode: crate::ReadMode,
        pos: u64,
        random: u8,
        sequential: u8,
    },

    /// Forward and backward special range traversals differ
    #[error("Special ranges differ: {forward} forward, {backward} backward")]
    RangeMismatch { forward: usize, backward: usize },

    /// A separator mark does not match the recorded sequence layout
    #[error("Sequence {index} starts at {found}, expected {expected}")]
    MarkMismatch { index: u64, expected: u64, found: u64 },

    /// A position is attributed to the wrong sequence
    #[error("Position {pos} belongs to sequence {found}, expected {expected}")]
    SeqnumMismatch { pos: u64, expected: u64, found: u64 },

    /// Two-bit comparison disagrees with symbol-wise comparison
    #[error("Comparing {pos1} and {pos2}: two-bit result {twobit:?}, symbol-wise {naive:?}")]
    CompareMismatch {
        pos1: u64,
        pos2: u64,
        twobit: (std::cmp::Ordering, u64),
        naive: (std::cmp::Ordering, u64),
    },
}
