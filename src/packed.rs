use crate::blob::Blob;

/// Fixed-width bit-packed array of small unsigned values
///
/// Element `i` occupies bits `i * bits .. (i + 1) * bits`, counted from the least
/// significant bit of the first word. Elements may straddle two words.
#[derive(Debug)]
pub struct BitPackedArray {
    bits: u32,
    len: u64,
    words: Blob<u64>,
}

impl BitPackedArray {
    /// Number of words needed to hold `len` elements of `bits` bits
    #[must_use]
    pub fn num_words(len: u64, bits: u32) -> usize {
        (len * u64::from(bits)).div_ceil(64) as usize
    }

    /// [`Self::num_words`] for untrusted lengths, `None` on overflow
    #[must_use]
    pub fn checked_num_words(len: u64, bits: u32) -> Option<u64> {
        Some(len.checked_mul(u64::from(bits))?.div_ceil(64))
    }

    /// A zero-filled array
    #[must_use]
    pub fn new(len: u64, bits: u32) -> Self {
        assert!((1..=32).contains(&bits));
        Self {
            bits,
            len,
            words: Blob::Owned(vec![0; Self::num_words(len, bits)]),
        }
    }

    pub(crate) fn from_blob(len: u64, bits: u32, words: Blob<u64>) -> Self {
        debug_assert_eq!(words.len(), Self::num_words(len, bits));
        Self { bits, len, words }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Size of the payload in bytes
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.words.len() * 8
    }

    pub(crate) fn words(&self) -> &Blob<u64> {
        &self.words
    }

    #[inline]
    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    /// Value at `idx`
    #[inline]
    #[must_use]
    pub fn get(&self, idx: u64) -> u32 {
        debug_assert!(idx < self.len);
        let bitpos = idx * u64::from(self.bits);
        let word = (bitpos / 64) as usize;
        let offset = (bitpos % 64) as u32;
        let mut value = self.words[word] >> offset;
        if offset + self.bits > 64 {
            value |= self.words[word + 1] << (64 - offset);
        }
        (value & self.mask()) as u32
    }

    /// Stores `value` at `idx`
    ///
    /// # Panics
    ///
    /// Panics if the array is memory-mapped. Arrays loaded from disk are read-only.
    pub fn set(&mut self, idx: u64, value: u32) {
        debug_assert!(idx < self.len);
        let mask = self.mask();
        let value = u64::from(value) & mask;
        let bitpos = idx * u64::from(self.bits);
        let word = (bitpos / 64) as usize;
        let offset = (bitpos % 64) as u32;
        let bits = self.bits;
        let Blob::Owned(words) = &mut self.words else {
            panic!("cannot modify a mapped bit-packed array");
        };
        words[word] = (words[word] & !(mask << offset)) | (value << offset);
        if offset + bits > 64 {
            let spill = 64 - offset;
            words[word + 1] = (words[word + 1] & !(mask >> spill)) | (value >> spill);
        }
    }
}
