//! Symbol alphabets
//!
//! An [`Alphabet`] maps input characters onto dense symbol codes `0..num_of_chars`.
//! Characters that denote an ambiguous residue map onto the shared [`WILDCARD`] code,
//! and sequence boundaries are represented by the [`SEPARATOR`] code. Both are
//! "special" codes and are never complemented.
//!
//! Alphabets are described by a symbol map: one line per symbol class, where the
//! first character of each line is the character printed when decoding and the
//! remaining characters are aliases. The last line lists the wildcard characters.
//!
//! ```text
//! aA
//! cC
//! gG
//! tTuU
//! nsywrkvbdhmNSYWRKVBDHM
//! ```

use std::path::Path;

use crate::{error::AlphabetError, Result};

/// Code of an ambiguous character
pub const WILDCARD: u8 = 254;

/// Code of the boundary between two sequences
pub const SEPARATOR: u8 = 255;

/// Character printed for a separator when decoding
pub const SEPARATOR_SHOW: u8 = b'|';

/// Marks characters without a mapping
const UNDEFINED: u8 = 253;

/// Largest number of regular symbols, so that codes stay below [`UNDEFINED`]
const MAX_SYMBOLS: usize = UNDEFINED as usize;

const DNA_SYMBOL_MAP: &str = "aA\ncC\ngG\ntTuU\nnsywrkvbdhmNSYWRKVBDHM\n";

const PROTEIN_SYMBOL_MAP: &str = "Ll\nVv\nIi\nFf\nKk\nRr\nEe\nDd\nAa\nGg\nSs\nTt\nNn\nQq\nYy\nWw\nPp\nHh\nMm\nCc\nXxUuBbZz*-\n";

/// True for the wildcard and separator codes
#[inline]
#[must_use]
pub fn is_special(code: u8) -> bool {
    code >= WILDCARD
}

/// Complement of a nucleotide code; special codes are left unchanged
#[inline]
#[must_use]
pub fn complement_base(code: u8) -> u8 {
    if is_special(code) {
        code
    } else {
        3 - code
    }
}

/// Number of bits needed to store `n` distinct values
#[must_use]
pub fn bits_per_symbol(n: u32) -> u32 {
    if n <= 1 {
        1
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    /// Character to code lookup
    symbol_map: [u8; 256],
    /// Characters of each class, regular symbols first and the wildcard class last
    classes: Vec<Vec<u8>>,
    /// Number of regular symbols
    num_of_chars: u8,
    /// Symbol codes can be complemented
    complementable: bool,
}

impl Alphabet {
    /// The nucleotide alphabet `acgt` with IUPAC ambiguity codes as wildcards
    #[must_use]
    pub fn dna() -> Self {
        // the built-in definition is well formed
        Self::from_symbol_map(DNA_SYMBOL_MAP).unwrap_or_else(|_| unreachable!())
    }

    /// The twenty amino acids with `X`, `U`, `B`, `Z`, `*` and `-` as wildcards
    #[must_use]
    pub fn protein() -> Self {
        Self::from_symbol_map(PROTEIN_SYMBOL_MAP).unwrap_or_else(|_| unreachable!())
    }

    /// Parses a symbol map definition
    ///
    /// Each non-empty line defines one class. Characters after the first
    /// whitespace of a line are ignored, and lines starting with `#` are comments.
    /// The last class is the wildcard class.
    pub fn from_symbol_map(text: &str) -> Result<Self> {
        let mut classes: Vec<Vec<u8>> = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let chars: Vec<u8> = line
                .split_whitespace()
                .next()
                .map(|field| field.bytes().collect())
                .unwrap_or_default();
            if chars.is_empty() {
                return Err(AlphabetError::EmptyLine(lineno + 1).into());
            }
            classes.push(chars);
        }
        if classes.len() < 2 {
            return Err(AlphabetError::Empty.into());
        }
        let num_of_chars = classes.len() - 1;
        if num_of_chars > MAX_SYMBOLS {
            return Err(AlphabetError::TooManySymbols(num_of_chars).into());
        }

        let mut symbol_map = [UNDEFINED; 256];
        for (class, chars) in classes.iter().enumerate() {
            let code = if class == num_of_chars {
                WILDCARD
            } else {
                class as u8
            };
            for &ch in chars {
                if symbol_map[ch as usize] != UNDEFINED {
                    return Err(AlphabetError::DuplicateCharacter(char::from(ch)).into());
                }
                symbol_map[ch as usize] = code;
            }
        }

        let complementable = num_of_chars == 4
            && classes[..4]
                .iter()
                .zip(b"acgt")
                .all(|(chars, base)| chars[0].to_ascii_lowercase() == *base);

        Ok(Self {
            symbol_map,
            classes,
            num_of_chars: num_of_chars as u8,
            complementable,
        })
    }

    /// Reads a symbol map definition from a file
    pub fn from_symbol_map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_symbol_map(&text)
    }

    /// Renders the definition in the format accepted by [`Alphabet::from_symbol_map`]
    #[must_use]
    pub fn to_symbol_map(&self) -> String {
        let mut text = String::new();
        for chars in &self.classes {
            for &ch in chars {
                text.push(char::from(ch));
            }
            text.push('\n');
        }
        text
    }

    /// Number of regular (non-special) symbols
    #[must_use]
    pub fn num_of_chars(&self) -> u8 {
        self.num_of_chars
    }

    /// Number of character classes, including the wildcard class
    #[must_use]
    pub fn num_of_classes(&self) -> usize {
        self.classes.len()
    }

    /// True if symbols can be complemented, i.e. this is a nucleotide alphabet
    #[must_use]
    pub fn is_complementable(&self) -> bool {
        self.complementable
    }

    /// Maps a character onto its code
    #[inline]
    #[must_use]
    pub fn encode(&self, ch: u8) -> Option<u8> {
        match self.symbol_map[ch as usize] {
            UNDEFINED => None,
            code => Some(code),
        }
    }

    /// Maps a code onto its printable character
    #[inline]
    #[must_use]
    pub fn decode(&self, code: u8) -> u8 {
        match code {
            SEPARATOR => SEPARATOR_SHOW,
            WILDCARD => self.classes[self.num_of_chars as usize][0],
            code => self.classes[code as usize][0],
        }
    }

    /// Complement of a code. Special codes and non-nucleotide alphabets are left unchanged.
    #[inline]
    #[must_use]
    pub fn complement(&self, code: u8) -> u8 {
        if self.complementable {
            complement_base(code)
        } else {
            code
        }
    }

    /// Class index of a non-separator code
    #[inline]
    #[must_use]
    pub fn class_of(&self, code: u8) -> usize {
        debug_assert!(code != SEPARATOR);
        if code == WILDCARD {
            self.num_of_chars as usize
        } else {
            code as usize
        }
    }

    /// All characters of a class, in definition order
    #[must_use]
    pub fn class_chars(&self, class: usize) -> &[u8] {
        &self.classes[class]
    }

    /// Index of `ch` within its class
    #[must_use]
    pub fn sub_index(&self, ch: u8) -> Option<(usize, u8)> {
        let code = self.encode(ch)?;
        let class = self.class_of(code);
        self.classes[class]
            .iter()
            .position(|&c| c == ch)
            .map(|idx| (class, idx as u8))
    }

    /// Bits needed per element when the two special codes share the packed range
    #[must_use]
    pub fn bits_per_packed_symbol(&self) -> u32 {
        bits_per_symbol(u32::from(self.num_of_chars) + 2)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::dna()
    }
}
