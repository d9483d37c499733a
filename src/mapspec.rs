//! Flat binary files of 8-byte aligned typed blocks
//!
//! Every index file is a sequence of blocks, each padded with zeros to a
//! multiple of eight bytes. Readers map a file once and hand out typed views
//! into the shared map, so no block is ever copied.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use bytemuck::Pod;
use memmap2::Mmap;
use tracing::debug;

use crate::blob::Blob;
use crate::error::{HeaderError, ReadError};
use crate::Result;

const ALIGNMENT: usize = 8;

/// `len` rounded up to the block alignment
#[inline]
#[must_use]
pub(crate) fn padded(len: usize) -> usize {
    len.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Padded byte size of a block of `count` elements of `T`, `None` on overflow
#[inline]
#[must_use]
pub(crate) fn block_size<T>(count: u64) -> Option<usize> {
    usize::try_from(count)
        .ok()?
        .checked_mul(size_of::<T>())?
        .checked_next_multiple_of(ALIGNMENT)
}

/// Sum of block sizes, `None` if any of them or the total overflows
#[must_use]
pub(crate) fn total_size(sizes: &[Option<usize>]) -> Option<usize> {
    sizes
        .iter()
        .try_fold(0usize, |total, &size| total.checked_add(size?))
}

/// Writes `blocks` to `path`, padding each to the alignment
///
/// Returns the number of bytes written, which must equal the size the header
/// declares for the file.
pub(crate) fn write_blocks(path: &Path, blocks: &[&[u8]]) -> Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let zeros = [0u8; ALIGNMENT];
    let mut written = 0;
    for block in blocks {
        writer.write_all(block)?;
        let padding = padded(block.len()) - block.len();
        writer.write_all(&zeros[..padding])?;
        written += block.len() + padding;
    }
    writer.flush()?;
    debug!(path = %path.display(), bytes = written, "wrote index file");
    Ok(written)
}

/// A read-only mapped file consumed block by block
#[derive(Debug)]
pub(crate) struct MappedRegion {
    map: Arc<Mmap>,
    offset: usize,
    name: String,
}

impl MappedRegion {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;

        // Verify it's a regular file before attempting to map
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile(path.display().to_string()).into());
        }

        // Safety: the file is open and won't be modified while mapped
        let map = unsafe { Mmap::map(&file)? };
        debug!(path = %path.display(), bytes = map.len(), "mapped index file");
        Ok(Self {
            map: Arc::new(map),
            offset: 0,
            name: path.display().to_string(),
        })
    }

    /// The unconsumed bytes
    #[must_use]
    pub(crate) fn remaining(&self) -> &[u8] {
        &self.map[self.offset..]
    }

    /// Fails unless the mapped size equals the size the header declares
    ///
    /// A declared size that overflowed (`None`) never matches.
    pub(crate) fn expect_size(&self, declared: Option<usize>) -> Result<()> {
        match declared {
            Some(declared) if declared == self.map.len() => Ok(()),
            _ => Err(
                HeaderError::InvalidSize(self.map.len(), declared.unwrap_or(usize::MAX)).into(),
            ),
        }
    }

    /// Skips `bytes` bytes, rounded up to the alignment
    pub(crate) fn skip(&mut self, bytes: u64) -> Result<()> {
        let size = self.ensure(block_size::<u8>(bytes))?;
        self.offset += size;
        Ok(())
    }

    /// A typed view of the next block of `count` elements
    pub(crate) fn take<T: Pod>(&mut self, count: u64) -> Result<Blob<T>> {
        let size = self.ensure(block_size::<T>(count))?;
        // the block fits the map, so the count fits a usize
        let blob = Blob::mapped(Arc::clone(&self.map), self.offset, count as usize);
        self.offset += size;
        Ok(blob)
    }

    /// The next block of `len` bytes
    pub(crate) fn take_bytes(&mut self, len: u64) -> Result<&[u8]> {
        let size = self.ensure(block_size::<u8>(len))?;
        let start = self.offset;
        self.offset += size;
        Ok(&self.map[start..start + len as usize])
    }

    /// The block size, if the rest of the map holds it
    fn ensure(&self, size: Option<usize>) -> Result<usize> {
        let available = self.map.len() - self.offset;
        match size {
            Some(size) if size <= available => Ok(size),
            Some(size) => Err(ReadError::BlockSize {
                name: self.name.clone(),
                expected: size,
                actual: available,
            }
            .into()),
            None => Err(HeaderError::InvalidSize(available, usize::MAX).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_aligned() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("blocks.bin");
        let words: Vec<u64> = vec![1, 2, u64::MAX];
        let bytes = b"abc";
        let shorts: Vec<u16> = vec![7, 8, 9];
        let written = write_blocks(
            &path,
            &[&bytes[..], bytemuck::cast_slice(&shorts), bytemuck::cast_slice(&words)],
        )?;
        assert_eq!(written, 8 + 8 + 24);

        let mut region = MappedRegion::open(&path)?;
        region.expect_size(Some(written))?;
        assert!(region.expect_size(Some(written + 8)).is_err());
        assert!(region.expect_size(None).is_err());
        assert_eq!(region.take_bytes(3)?, b"abc");
        let view: Blob<u16> = region.take(3)?;
        assert_eq!(&view[..], &[7, 8, 9]);
        let view: Blob<u64> = region.take(3)?;
        assert!(view.is_mapped());
        assert_eq!(&view[..], &words[..]);
        assert!(region.remaining().is_empty());
        assert!(region.take::<u64>(1).is_err());
        Ok(())
    }

    #[test]
    fn oversized_blocks_are_errors() -> anyhow::Result<()> {
        assert_eq!(block_size::<u64>(3), Some(24));
        assert_eq!(block_size::<u8>(9), Some(16));
        assert_eq!(block_size::<u64>(u64::MAX / 4), None);
        assert_eq!(total_size(&[Some(8), Some(16)]), Some(24));
        assert_eq!(total_size(&[Some(8), None]), None);
        assert_eq!(total_size(&[Some(usize::MAX), Some(8)]), None);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("small.bin");
        write_blocks(&path, &[&b"abcdefgh"[..]])?;
        let mut region = MappedRegion::open(&path)?;
        let err = region.take::<u64>(u64::MAX / 4).map(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::HeaderError(HeaderError::InvalidSize(8, usize::MAX))
        ));
        assert!(region.take_bytes(u64::MAX).is_err());
        assert!(region.skip(u64::MAX - 3).is_err());
        assert_eq!(region.take_bytes(8)?, b"abcdefgh");
        Ok(())
    }

    #[test]
    fn directories_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(MappedRegion::open(dir.path()).is_err());
        Ok(())
    }
}
