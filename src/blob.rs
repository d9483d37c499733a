use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use bytemuck::{cast_slice, Pod};
use memmap2::Mmap;

/// A typed array that is either owned or a view into a shared memory map
///
/// Mapped views keep the map alive through the `Arc`, so the region is unmapped
/// once the last view referencing it is dropped.
pub(crate) enum Blob<T: Pod> {
    Owned(Vec<T>),
    Mapped {
        map: Arc<Mmap>,
        offset: usize,
        len: usize,
        _marker: PhantomData<T>,
    },
}

impl<T: Pod> Blob<T> {
    /// A view of `len` elements starting at byte `offset` of the map
    ///
    /// The offset must be aligned for `T`, which holds for the 8-byte aligned
    /// block layout written by [`crate::mapspec`].
    pub(crate) fn mapped(map: Arc<Mmap>, offset: usize, len: usize) -> Self {
        debug_assert!(offset + len * size_of::<T>() <= map.len());
        Self::Mapped {
            map,
            offset,
            len,
            _marker: PhantomData,
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        cast_slice(self)
    }

    pub(crate) fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped { .. })
    }
}

impl<T: Pod> Deref for Blob<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        match self {
            Self::Owned(values) => values,
            Self::Mapped {
                map, offset, len, ..
            } => {
                if *len == 0 {
                    return &[];
                }
                cast_slice(&map[*offset..*offset + *len * size_of::<T>()])
            }
        }
    }
}

impl<T: Pod> From<Vec<T>> for Blob<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Owned(values)
    }
}

impl<T: Pod> Default for Blob<T> {
    fn default() -> Self {
        Self::Owned(Vec::new())
    }
}

impl<T: Pod> fmt::Debug for Blob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
