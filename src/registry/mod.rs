//! Class registry: name to descriptor lookup.
//!
//! The [`ClassRegistry`] owns every loaded [`ClassDescriptor`] and indexes them by name. It has
//! two parts:
//!
//! - descriptor storage, an append-only `boxcar::Vec`: a class's [`ClassId`] is its index there
//!   and never changes, and a [`ClassHandle`] borrows the descriptor for as long as the registry
//!   lives
//! - the [`table::ClassTable`], a Robin-Hood hash table of `(hash, id)` words living in a
//!   [`crate::memory::VirtualArena`], guarded by an `RwLock`
//!
//! Lookups hash the name, probe the table under a shared lock and confirm candidates by exact
//! comparison against the stored descriptor's name. Insertions take the exclusive lock, reject
//! duplicates, grow the table if needed and only then store the descriptor, so a failed insert
//! leaves the registry exactly as it was.
//!
//! # Thread Safety
//!
//! [`ClassRegistry`] is [`Send`] and [`Sync`]. Lookups run concurrently with each other and are
//! serialized against insertions.
//!
//! # Examples
//!
//! ```rust
//! use glr::classfile::{AccessFlags, ClassDescriptor, ClassFileWriter, ClassKind};
//! use glr::registry::ClassRegistry;
//! use glr::{DecodeLimits, RegistryConfig};
//!
//! let registry = ClassRegistry::new(&RegistryConfig::default())?;
//!
//! let bytes = ClassFileWriter::named("Point", ClassKind::Struct, AccessFlags::PUB).build();
//! let id = registry.insert(ClassDescriptor::from_bytes(&bytes, DecodeLimits::default())?)?;
//!
//! let point = registry.find("Point").unwrap();
//! assert_eq!(point.id(), id);
//! assert!(registry.find("Line").is_none());
//! # Ok::<(), glr::Error>(())
//! ```

pub mod hash;
pub mod table;

use std::{fmt, ops::Deref, sync::Arc, sync::RwLock};

use crate::{
    classfile::ClassDescriptor,
    config::RegistryConfig,
    memory::{PageMapper, SystemPages},
    registry::{hash::hash_name, table::ClassTable},
    Error, Result,
};

pub use hash::NameHash;
pub use table::ProbeStats;

/// Stable identifier of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    /// Position of the class in registration order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The raw id.
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A borrowed registered class.
///
/// Dereferences to the [`ClassDescriptor`].
#[derive(Debug, Clone, Copy)]
pub struct ClassHandle<'a> {
    id: ClassId,
    class: &'a ClassDescriptor,
}

impl<'a> ClassHandle<'a> {
    /// The class id.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// The descriptor, borrowed for the registry's lifetime.
    #[must_use]
    pub fn descriptor(&self) -> &'a ClassDescriptor {
        self.class
    }
}

impl Deref for ClassHandle<'_> {
    type Target = ClassDescriptor;

    fn deref(&self) -> &ClassDescriptor {
        self.class
    }
}

impl PartialEq for ClassHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.class, other.class)
    }
}

/// Occupancy and probe statistics of a [`ClassRegistry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryStats {
    /// Slot count of the table
    pub slots: usize,
    /// Occupied slots, equal to the number of registered classes
    pub occupied: usize,
    /// Bytes committed for the slot array
    pub committed_bytes: usize,
    /// Largest probe distance of any entry
    pub max_probe: usize,
    /// Mean probe distance over all entries
    pub mean_probe: f64,
}

impl RegistryStats {
    /// Occupied share of the slots, between 0 and 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn load(&self) -> f64 {
        if self.slots == 0 {
            0.0
        } else {
            self.occupied as f64 / self.slots as f64
        }
    }
}

/// Registry of loaded classes, keyed by name.
pub struct ClassRegistry {
    classes: boxcar::Vec<ClassDescriptor>,
    table: RwLock<ClassTable>,
}

impl ClassRegistry {
    /// Create a registry backed by [`SystemPages`].
    ///
    /// # Errors
    /// See [`ClassRegistry::with_mapper`].
    pub fn new(config: &RegistryConfig) -> Result<ClassRegistry> {
        Self::with_mapper(config, Arc::new(SystemPages::new()))
    }

    /// Create a registry whose slot table is backed by `mapper`.
    ///
    /// # Errors
    /// - [`Error::InvalidConfig`] for invalid sizing
    /// - [`Error::ReservationFailed`] / [`Error::CommitFailed`] if the slot table cannot be set up
    pub fn with_mapper(
        config: &RegistryConfig,
        mapper: Arc<dyn PageMapper>,
    ) -> Result<ClassRegistry> {
        Ok(ClassRegistry {
            classes: boxcar::Vec::new(),
            table: RwLock::new(ClassTable::new(mapper, config)?),
        })
    }

    /// Register `descriptor` under its name.
    ///
    /// # Errors
    /// - [`Error::DuplicateClass`] if a class with the same name is registered
    /// - [`Error::RegistryFull`] if the table is full and at its maximum size
    /// - [`Error::ReservationExhausted`] / [`Error::CommitFailed`] if the table cannot grow
    /// - [`Error::LockError`] if the table lock is poisoned
    ///
    /// On error the registry is unchanged.
    pub fn insert(&self, descriptor: ClassDescriptor) -> Result<ClassId> {
        self.register(descriptor).map(|class| class.id())
    }

    /// Register `descriptor` and return a handle to the stored class.
    ///
    /// # Errors
    /// See [`ClassRegistry::insert`].
    pub fn register(&self, descriptor: ClassDescriptor) -> Result<ClassHandle<'_>> {
        let hash = hash_name(descriptor.name.as_bytes());
        let mut table = write_lock!(self.table)?;

        if self.lookup(&table, hash, &descriptor.name).is_some() {
            return Err(Error::DuplicateClass(descriptor.name));
        }

        table.reserve_one()?;

        // Storage only grows under the write lock, so the next index is known
        let Ok(id) = u32::try_from(self.classes.count()) else {
            return Err(Error::RegistryFull {
                slots: table.capacity(),
            });
        };

        log::debug!("Registering class '{}' as {}", descriptor.name, ClassId(id));

        let index = self.classes.push(descriptor);
        debug_assert_eq!(index, id as usize);
        table.insert(hash, id)?;

        Ok(ClassHandle {
            id: ClassId(id),
            class: &self.classes[index],
        })
    }

    /// Look up a class by exact name.
    ///
    /// A poisoned lock is logged and reported as not found.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ClassHandle<'_>> {
        let table = match self.table.read() {
            Ok(table) => table,
            Err(_) => {
                log::error!("Class table lock poisoned, lookup of '{name}' failed");
                return None;
            }
        };

        let id = self.lookup(&table, hash_name(name.as_bytes()), name)?;
        self.get(id)
    }

    fn lookup(&self, table: &ClassTable, hash: u32, name: &str) -> Option<ClassId> {
        table
            .find(hash, |id| {
                self.classes
                    .get(id as usize)
                    .is_some_and(|class| class.name.as_bytes() == name.as_bytes())
            })
            .map(ClassId)
    }

    /// The class registered as `id`.
    #[must_use]
    pub fn get(&self, id: ClassId) -> Option<ClassHandle<'_>> {
        self.classes
            .get(id.index())
            .map(|class| ClassHandle { id, class })
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.count()
    }

    /// Returns `true` if no class is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.count() == 0
    }

    /// Current slot count of the table.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self.table.read() {
            Ok(table) => table.capacity(),
            Err(_) => 0,
        }
    }

    /// Iterate registered classes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = ClassHandle<'_>> {
        self.classes.iter().filter_map(|(index, class)| {
            let id = u32::try_from(index).ok()?;
            Some(ClassHandle {
                id: ClassId(id),
                class,
            })
        })
    }

    /// Occupancy and probe statistics.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the table lock is poisoned.
    pub fn stats(&self) -> Result<RegistryStats> {
        let table = read_lock!(self.table)?;
        let probes = table.probe_stats();

        Ok(RegistryStats {
            slots: table.capacity(),
            occupied: table.len(),
            committed_bytes: table.committed_bytes(),
            max_probe: probes.max,
            mean_probe: probes.mean,
        })
    }

    /// Base address of the slot table; fixed for the registry's lifetime.
    #[must_use]
    pub fn table_base(&self) -> Option<*const u8> {
        self.table.read().ok().map(|table| table.base())
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.len())
            .field("slots", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{descriptor_named, FlakyPages};

    fn registry(initial: usize) -> ClassRegistry {
        ClassRegistry::new(&RegistryConfig::default().with_initial_slots(initial)).unwrap()
    }

    #[test]
    fn insert_and_find() {
        let registry = registry(8);
        let a = registry.insert(descriptor_named("A")).unwrap();
        let b = registry.insert(descriptor_named("B")).unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.find("A").unwrap().id(), a);
        assert_eq!(registry.find("B").unwrap().name(), "B");
        assert!(registry.find("C").is_none());
        assert!(registry.find("").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn names_compare_exactly() {
        let registry = registry(8);
        registry.insert(descriptor_named("List")).unwrap();

        assert!(registry.find("Lis").is_none());
        assert!(registry.find("List ").is_none());
        assert!(registry.find("list").is_none());
        assert!(registry.find("List").is_some());
    }

    #[test]
    fn duplicate_leaves_registry_unchanged() {
        let registry = registry(8);
        registry.insert(descriptor_named("Map")).unwrap();
        let before = registry.stats().unwrap();

        assert!(matches!(
            registry.insert(descriptor_named("Map")),
            Err(Error::DuplicateClass(name)) if name == "Map"
        ));
        assert_eq!(registry.stats().unwrap(), before);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handles_survive_growth() {
        let registry = registry(8);
        let id = registry.insert(descriptor_named("first")).unwrap();
        let first = registry.get(id).unwrap();
        let descriptor = first.descriptor() as *const ClassDescriptor;
        let base = registry.table_base();

        for index in 0..500 {
            registry
                .insert(descriptor_named(&format!("class{index}")))
                .unwrap();
        }

        assert!(registry.capacity() >= 1024);
        assert_eq!(registry.table_base(), base);
        assert_eq!(first.name(), "first");
        let found = registry.find("first").unwrap();
        assert_eq!(found.id(), first.id());
        assert!(std::ptr::eq(found.descriptor(), descriptor));

        for index in 0..500 {
            assert!(registry.find(&format!("class{index}")).is_some());
        }
    }

    #[test]
    fn stats_track_load() {
        let registry = registry(64);
        for index in 0..40 {
            registry
                .insert(descriptor_named(&format!("T{index}")))
                .unwrap();
        }

        let stats = registry.stats().unwrap();
        assert_eq!(stats.slots, 64);
        assert_eq!(stats.occupied, 40);
        assert!(stats.load() <= 0.7);
        assert!(stats.committed_bytes >= 64 * 8);
        assert!(stats.mean_probe <= stats.max_probe as f64);
    }

    #[test]
    fn failed_growth_keeps_classes() {
        let page = SystemPages::new().page_size();
        let initial = page / 8;
        let config = RegistryConfig::default()
            .with_initial_slots(initial)
            .with_max_slots(initial * 2);
        let registry =
            ClassRegistry::with_mapper(&config, Arc::new(FlakyPages::failing_after(1))).unwrap();

        let fill = initial * 70 / 100;
        for index in 0..fill {
            registry
                .insert(descriptor_named(&format!("C{index}")))
                .unwrap();
        }

        assert!(matches!(
            registry.insert(descriptor_named("overflow")),
            Err(Error::CommitFailed { .. })
        ));
        assert_eq!(registry.len(), fill);
        assert!(registry.find("overflow").is_none());
        assert!(registry.find("C0").is_some());
    }

    #[test]
    fn iteration_in_registration_order() {
        let registry = registry(8);
        for name in ["c", "a", "b"] {
            registry.insert(descriptor_named(name)).unwrap();
        }

        let names: Vec<_> = registry.iter().map(|class| class.name().to_string()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
