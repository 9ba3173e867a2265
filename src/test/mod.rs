use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    classfile::{AccessFlags, CallKind, ClassDescriptor, ClassFileWriter, ClassKind},
    config::DecodeLimits,
    memory::{PageMapper, PageRange, SystemPages},
    Error, Result,
};

// Helper function to create the smallest valid class file: pub struct, no constants or members
pub fn minimal_class() -> Vec<u8> {
    b"$GLR\x01\x01\x00\x00\x00".to_vec()
}

// Helper function to create a `Point` struct with two fields and two methods
pub fn sample_class_bytes() -> Vec<u8> {
    let mut writer = ClassFileWriter::named(
        "Point",
        ClassKind::Struct,
        AccessFlags::PUB | AccessFlags::CONST,
    );

    writer
        .field(AccessFlags::PUB, "x", &["f64"])
        .unwrap()
        .field(AccessFlags::PUB, "y", &["f64"])
        .unwrap()
        .method(AccessFlags::PUB, CallKind::Call, "length", &[], &[0x01, 0x02, 0x00])
        .unwrap()
        .method(
            AccessFlags::PUB,
            CallKind::VirtualCall,
            "scale",
            &["Point", "f64"],
            &[0x00],
        )
        .unwrap();

    writer.build()
}

// Helper function to create a decoded descriptor for an empty struct called `name`
pub fn descriptor_named(name: &str) -> ClassDescriptor {
    let bytes = ClassFileWriter::named(name, ClassKind::Struct, AccessFlags::PUB).build();
    ClassDescriptor::from_bytes(&bytes, DecodeLimits::default()).unwrap()
}

/// Page mapper that commits successfully a fixed number of times, then fails every commit.
pub struct FlakyPages {
    inner: SystemPages,
    remaining: AtomicUsize,
}

impl FlakyPages {
    pub fn failing_after(commits: usize) -> Self {
        FlakyPages {
            inner: SystemPages::new(),
            remaining: AtomicUsize::new(commits),
        }
    }
}

impl PageMapper for FlakyPages {
    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn huge_page_size(&self) -> usize {
        self.inner.huge_page_size()
    }

    fn reserve(&self, size: usize) -> Result<PageRange> {
        self.inner.reserve(size)
    }

    fn commit(&self, range: &mut PageRange, offset: usize, size: usize) -> Result<()> {
        let granted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();

        if !granted {
            return Err(Error::CommitFailed {
                offset,
                size,
                message: "no commits left".to_string(),
            });
        }

        self.inner.commit(range, offset, size)
    }

    fn release(&self, range: PageRange) -> Result<()> {
        self.inner.release(range)
    }
}

/// Page mapper that counts reservations and releases.
#[derive(Default)]
pub struct TrackingPages {
    inner: SystemPages,
    reservations: AtomicUsize,
    releases: AtomicUsize,
}

impl TrackingPages {
    pub fn reservations(&self) -> usize {
        self.reservations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl PageMapper for TrackingPages {
    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn huge_page_size(&self) -> usize {
        self.inner.huge_page_size()
    }

    fn reserve(&self, size: usize) -> Result<PageRange> {
        self.reservations.fetch_add(1, Ordering::SeqCst);
        self.inner.reserve(size)
    }

    fn commit(&self, range: &mut PageRange, offset: usize, size: usize) -> Result<()> {
        self.inner.commit(range, offset, size)
    }

    fn release(&self, range: PageRange) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(range)
    }
}
