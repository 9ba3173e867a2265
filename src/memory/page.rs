//! Page mapping collaborator.
//!
//! The registry never talks to the operating system directly. It asks a [`PageMapper`] to
//! reserve a range of address space once and to commit pages inside that range as the slot
//! table grows. [`SystemPages`] is the default mapper: it backs reservations with anonymous
//! `memmap2` mappings and queries the platform for its page sizes. Tests and embedders can supply
//! their own mapper, for example to simulate commit failures or to account for memory use.
//!
//! # Thread Safety
//!
//! Mappers are shared between arenas through an `Arc` and must be [`Send`] and [`Sync`].

use std::sync::OnceLock;

use memmap2::{MmapMut, MmapOptions};

use crate::{Error, Result};

/// Fallback page size when the platform cannot be queried.
const DEFAULT_PAGE_SIZE: usize = 4096;

/// Fallback huge page size when the platform cannot be queried.
const DEFAULT_HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// A reserved range of address space.
///
/// The range owns its mapping; its base address is fixed for its lifetime and the mapping is
/// unmapped when the range is dropped or handed back through [`PageMapper::release`].
pub struct PageRange {
    map: MmapMut,
}

impl PageRange {
    /// Wrap an existing writable mapping.
    #[must_use]
    pub fn from_mmap(map: MmapMut) -> Self {
        PageRange { map }
    }

    /// Length of the range in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` for an empty range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Base address of the range.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.map.as_ptr()
    }

    /// The whole range as bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.map[..]
    }

    /// The whole range as mutable bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map[..]
    }

    /// The underlying mapping.
    #[must_use]
    pub fn mmap(&self) -> &MmapMut {
        &self.map
    }
}

/// Platform page operations used by [`crate::memory::VirtualArena`].
pub trait PageMapper: Send + Sync {
    /// Granularity of commits in bytes, a power of two.
    fn page_size(&self) -> usize;

    /// Size of a huge page in bytes, a power of two.
    fn huge_page_size(&self) -> usize;

    /// Reserve `size` bytes of address space. `size` is a multiple of [`PageMapper::page_size`].
    ///
    /// # Errors
    /// Returns [`Error::ReservationFailed`] if the platform refuses the reservation.
    fn reserve(&self, size: usize) -> Result<PageRange>;

    /// Back `size` bytes at `offset` inside `range` with memory.
    ///
    /// Committed pages read as zero until written.
    ///
    /// # Errors
    /// Returns [`Error::CommitFailed`] if the pages cannot be backed.
    fn commit(&self, range: &mut PageRange, offset: usize, size: usize) -> Result<()>;

    /// Release a reservation.
    ///
    /// # Errors
    /// Mapper specific; the default mapper cannot fail.
    fn release(&self, range: PageRange) -> Result<()>;
}

/// The default [`PageMapper`], backed by anonymous memory mappings.
///
/// A reservation is one private read-write anonymous mapping; the kernel backs its pages on first
/// touch. [`PageMapper::commit`] only checks the range against the reservation and advises the
/// kernel to prefetch it, so commits track growth but never observe memory pressure, and hosts
/// with strict overcommit accounting charge the whole reservation when it is made. Embedders that
/// need commit-time failures supply their own mapper.
#[derive(Debug, Clone, Copy)]
pub struct SystemPages {
    page_size: usize,
    huge_page_size: usize,
}

impl SystemPages {
    /// Create a mapper using the platform's page sizes.
    #[must_use]
    pub fn new() -> Self {
        SystemPages {
            page_size: system_page_size(),
            huge_page_size: system_huge_page_size(),
        }
    }
}

impl Default for SystemPages {
    fn default() -> Self {
        Self::new()
    }
}

impl PageMapper for SystemPages {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn huge_page_size(&self) -> usize {
        self.huge_page_size
    }

    fn reserve(&self, size: usize) -> Result<PageRange> {
        if size == 0 {
            return Err(Error::ReservationFailed {
                size,
                message: "cannot reserve an empty range".to_string(),
            });
        }

        let map = MmapOptions::new()
            .len(size)
            .map_anon()
            .map_err(|error| Error::ReservationFailed {
                size,
                message: error.to_string(),
            })?;

        Ok(PageRange::from_mmap(map))
    }

    fn commit(&self, range: &mut PageRange, offset: usize, size: usize) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= range.len() => {}
            _ => {
                return Err(Error::CommitFailed {
                    offset,
                    size,
                    message: format!("range ends past the {} byte reservation", range.len()),
                })
            }
        }

        if size == 0 {
            return Ok(());
        }

        advise_will_need(range, offset, size).map_err(|error| Error::CommitFailed {
            offset,
            size,
            message: error.to_string(),
        })
    }

    fn release(&self, range: PageRange) -> Result<()> {
        drop(range);
        Ok(())
    }
}

// Anonymous mappings are backed on first touch; the advice only prefetches
#[cfg(unix)]
fn advise_will_need(range: &PageRange, offset: usize, size: usize) -> std::io::Result<()> {
    range
        .map
        .advise_range(memmap2::Advice::WillNeed, offset, size)
}

#[cfg(not(unix))]
fn advise_will_need(_range: &PageRange, _offset: usize, _size: usize) -> std::io::Result<()> {
    Ok(())
}

/// The platform page size, queried once.
#[must_use]
pub fn system_page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(query_page_size)
}

/// The platform huge page size, queried once.
#[must_use]
pub fn system_huge_page_size() -> usize {
    static HUGE_PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *HUGE_PAGE_SIZE.get_or_init(query_huge_page_size)
}

#[cfg(unix)]
fn query_page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    match usize::try_from(size) {
        Ok(size) if size.is_power_of_two() => size,
        _ => DEFAULT_PAGE_SIZE,
    }
}

#[cfg(not(unix))]
fn query_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[cfg(target_os = "linux")]
fn query_huge_page_size() -> usize {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|meminfo| parse_huge_page_size(&meminfo))
        .unwrap_or(DEFAULT_HUGE_PAGE_SIZE)
}

#[cfg(not(target_os = "linux"))]
fn query_huge_page_size() -> usize {
    DEFAULT_HUGE_PAGE_SIZE
}

/// Extract `Hugepagesize` from `/proc/meminfo` contents.
fn parse_huge_page_size(meminfo: &str) -> Option<usize> {
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("Hugepagesize:"))?;

    let mut parts = line["Hugepagesize:".len()..].split_whitespace();
    let value: usize = parts.next()?.parse().ok()?;
    let size = match parts.next() {
        Some("kB") => value.checked_mul(1024)?,
        Some("MB") => value.checked_mul(1024 * 1024)?,
        None => value,
        Some(_) => return None,
    };

    size.is_power_of_two().then_some(size)
}
