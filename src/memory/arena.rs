//! Address-stable growable memory region.
//!
//! A [`VirtualArena`] reserves its maximum size as one range of address space when it is
//! created and commits pages from the front of that range as it grows. Because the reservation
//! never moves, the base address and every byte committed so far stay where they are for the
//! arena's whole lifetime: growth only ever appends.
//!
//! ```text
//! base                         committed_len                  reserved_len
//! |----------- committed -------------|------------ reserved -------------|
//!                                     ^ grow() commits pages from here
//! ```
//!
//! The range is released exactly once, when the arena is dropped.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use glr::memory::{SystemPages, VirtualArena};
//!
//! let mut arena = VirtualArena::reserve(Arc::new(SystemPages::new()), 1 << 20)?;
//! let base = arena.base();
//!
//! let first = arena.grow(100)?;
//! assert_eq!(first.start, 0);
//! assert_eq!(first.end, arena.page_size());
//!
//! arena.committed_mut()[0] = 42;
//! arena.grow(arena.page_size())?;
//! assert_eq!(arena.base(), base);
//! assert_eq!(arena.committed()[0], 42);
//! # Ok::<(), glr::Error>(())
//! ```

use std::{mem::ManuallyDrop, ops::Range, sync::Arc};

use crate::{
    memory::page::{PageMapper, PageRange},
    Error, Result,
};

/// A reserved address range that is committed page by page.
pub struct VirtualArena {
    mapper: Arc<dyn PageMapper>,
    range: ManuallyDrop<PageRange>,
    committed: usize,
    page_size: usize,
}

impl VirtualArena {
    /// Reserve `max_bytes`, rounded up to whole pages, without committing anything.
    ///
    /// # Errors
    /// Returns [`Error::ReservationFailed`] if `max_bytes` is zero, overflows when rounded, or
    /// the mapper refuses the reservation.
    pub fn reserve(mapper: Arc<dyn PageMapper>, max_bytes: usize) -> Result<VirtualArena> {
        let page_size = mapper.page_size();
        let Some(size) = round_to_page(max_bytes, page_size) else {
            return Err(Error::ReservationFailed {
                size: max_bytes,
                message: format!("size does not round to {page_size} byte pages"),
            });
        };

        if size == 0 {
            return Err(Error::ReservationFailed {
                size,
                message: "cannot reserve an empty range".to_string(),
            });
        }

        let range = mapper.reserve(size)?;
        if range.len() < size {
            return Err(Error::ReservationFailed {
                size,
                message: format!("mapper returned only {} bytes", range.len()),
            });
        }

        Ok(VirtualArena {
            mapper,
            range: ManuallyDrop::new(range),
            committed: 0,
            page_size,
        })
    }

    /// Commit the next `additional` bytes, rounded up to whole pages, and return the newly
    /// committed byte range. Growing by zero bytes commits nothing.
    ///
    /// On failure nothing is committed and the arena is unchanged.
    ///
    /// # Errors
    /// - [`Error::ReservationExhausted`] if the growth would pass the reservation
    /// - [`Error::CommitFailed`] if the mapper cannot back the pages
    pub fn grow(&mut self, additional: usize) -> Result<Range<usize>> {
        let start = self.committed;
        if additional == 0 {
            return Ok(start..start);
        }

        let reserved = self.reserved_len();
        let end = round_to_page(additional, self.page_size)
            .and_then(|size| start.checked_add(size))
            .filter(|end| *end <= reserved);

        let Some(end) = end else {
            return Err(Error::ReservationExhausted {
                requested: start.saturating_add(additional),
                reserved,
            });
        };

        self.mapper.commit(&mut self.range, start, end - start)?;
        self.committed = end;

        Ok(start..end)
    }

    /// Base address of the reservation, fixed for the arena's lifetime.
    #[must_use]
    pub fn base(&self) -> *const u8 {
        self.range.as_ptr()
    }

    /// The committed bytes.
    #[must_use]
    pub fn committed(&self) -> &[u8] {
        &self.range.as_slice()[..self.committed]
    }

    /// The committed bytes, writable.
    pub fn committed_mut(&mut self) -> &mut [u8] {
        let committed = self.committed;
        &mut self.range.as_mut_slice()[..committed]
    }

    /// Number of committed bytes.
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.committed
    }

    /// Number of reserved bytes.
    #[must_use]
    pub fn reserved_len(&self) -> usize {
        self.range.len()
    }

    /// Commit granularity in bytes.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Drop for VirtualArena {
    fn drop(&mut self) {
        // SAFETY: `range` is not touched again after this point
        let range = unsafe { ManuallyDrop::take(&mut self.range) };
        if let Err(error) = self.mapper.release(range) {
            log::warn!("Failed to release arena reservation: {error}");
        }
    }
}

/// Round `size` up to a multiple of `page_size`, a power of two.
fn round_to_page(size: usize, page_size: usize) -> Option<usize> {
    let mask = page_size - 1;
    size.checked_add(mask).map(|size| size & !mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::page::SystemPages;
    use crate::test::{FlakyPages, TrackingPages};

    fn system() -> Arc<dyn PageMapper> {
        Arc::new(SystemPages::new())
    }

    #[test]
    fn reserve_rounds_to_pages() {
        let arena = VirtualArena::reserve(system(), 1).unwrap();
        assert_eq!(arena.reserved_len(), arena.page_size());
        assert_eq!(arena.committed_len(), 0);
        assert!(arena.committed().is_empty());
    }

    #[test]
    fn reserve_errors() {
        assert!(matches!(
            VirtualArena::reserve(system(), 0),
            Err(Error::ReservationFailed { .. })
        ));
        assert!(matches!(
            VirtualArena::reserve(system(), usize::MAX),
            Err(Error::ReservationFailed { .. })
        ));
    }

    #[test]
    fn grow_is_append_only() {
        let mut arena = VirtualArena::reserve(system(), 1 << 20).unwrap();
        let page = arena.page_size();
        let base = arena.base();

        assert_eq!(arena.grow(0).unwrap(), 0..0);
        assert_eq!(arena.grow(1).unwrap(), 0..page);
        arena.committed_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(arena.grow(page + 1).unwrap(), page..3 * page);
        assert_eq!(arena.base(), base);
        assert_eq!(&arena.committed()[..4], &[1, 2, 3, 4]);
        assert!(arena.committed()[page..].iter().all(|b| *b == 0));
    }

    #[test]
    fn grow_past_reservation() {
        let mut arena = VirtualArena::reserve(system(), 4 * system_page()).unwrap();
        let page = arena.page_size();
        arena.grow(3 * page).unwrap();

        assert!(matches!(
            arena.grow(2 * page),
            Err(Error::ReservationExhausted { .. })
        ));
        assert_eq!(arena.committed_len(), 3 * page);
        assert_eq!(arena.grow(page).unwrap(), 3 * page..4 * page);

        assert!(matches!(
            arena.grow(usize::MAX),
            Err(Error::ReservationExhausted { .. })
        ));
    }

    #[test]
    fn failed_commit_leaves_arena_unchanged() {
        let mapper = Arc::new(FlakyPages::failing_after(1));
        let mut arena = VirtualArena::reserve(mapper, 1 << 20).unwrap();
        let page = arena.page_size();

        arena.grow(page).unwrap();
        assert!(matches!(
            arena.grow(page),
            Err(Error::CommitFailed { .. })
        ));
        assert_eq!(arena.committed_len(), page);
    }

    #[test]
    fn released_once_on_drop() {
        let mapper = Arc::new(TrackingPages::default());
        {
            let mut arena = VirtualArena::reserve(mapper.clone(), 1 << 16).unwrap();
            arena.grow(1).unwrap();
            assert_eq!(mapper.reservations(), 1);
            assert_eq!(mapper.releases(), 0);
        }
        assert_eq!(mapper.releases(), 1);
    }

    fn system_page() -> usize {
        SystemPages::new().page_size()
    }
}
