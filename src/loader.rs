//! Class loading entry point.
//!
//! [`ClassLoader`] ties the pieces together: it decodes class files with the configured
//! [`DecodeLimits`](crate::DecodeLimits), registers the resulting descriptors in its
//! [`ClassRegistry`] and answers lookups by name. There is no global loader; embedders create one
//! and pass it to whatever needs to resolve classes.
//!
//! Loading is all or nothing: a class file that fails to decode, or whose name is already taken,
//! leaves the registry untouched.
//!
//! # Examples
//!
//! ```rust
//! use glr::classfile::{AccessFlags, ClassFileWriter, ClassKind};
//! use glr::{ClassLoader, LoaderConfig, ResolvedType};
//!
//! let loader = ClassLoader::new(LoaderConfig::default())?;
//!
//! let mut node = ClassFileWriter::named("Node", ClassKind::Struct, AccessFlags::PUB);
//! node.field(AccessFlags::PUB, "next", &["Node"])?;
//! node.field(AccessFlags::PUB, "value", &["i64"])?;
//!
//! let class = loader.load_class(&node.build())?;
//! let next = class.field("next").unwrap();
//!
//! match loader.resolve_type(&next.ty, &class.pool).as_slice() {
//!     [ResolvedType::Class(target)] => assert_eq!(target.id(), class.id()),
//!     other => panic!("unexpected resolution {:?}", other),
//! }
//! # Ok::<(), glr::Error>(())
//! ```

use std::{fs, path::Path, sync::Arc};

use memmap2::Mmap;
use rayon::prelude::*;

use crate::{
    classfile::{ClassDescriptor, ConstantPool, DescriptorBuilder, TypeRef},
    config::LoaderConfig,
    memory::{PageMapper, SystemPages},
    registry::{ClassHandle, ClassRegistry},
    Result,
};

/// One type name of a [`TypeRef`], resolved against the loaded classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedType<'r, 'p> {
    /// The name refers to a loaded class
    Class(ClassHandle<'r>),
    /// The name refers to no loaded class, such as a primitive or a class loaded later
    Unresolved(&'p str),
    /// The tag does not refer to a string constant
    NotAName(u16),
}

/// Decodes class files and keeps the registry of loaded classes.
pub struct ClassLoader {
    config: LoaderConfig,
    registry: ClassRegistry,
}

impl ClassLoader {
    /// Create a loader backed by [`SystemPages`].
    ///
    /// # Errors
    /// See [`ClassLoader::with_mapper`].
    pub fn new(config: LoaderConfig) -> Result<ClassLoader> {
        Self::with_mapper(config, Arc::new(SystemPages::new()))
    }

    /// Create a loader whose registry table is backed by `mapper`.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidConfig`] if `config` is invalid
    /// - [`crate::Error::ReservationFailed`] / [`crate::Error::CommitFailed`] if the registry
    ///   cannot reserve its table
    pub fn with_mapper(config: LoaderConfig, mapper: Arc<dyn PageMapper>) -> Result<ClassLoader> {
        config.validate()?;

        Ok(ClassLoader {
            registry: ClassRegistry::with_mapper(&config.registry, mapper)?,
            config,
        })
    }

    /// The loader's configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The registry of loaded classes.
    #[must_use]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Decode `bytes` without registering the result.
    ///
    /// # Errors
    /// Returns the decoding error; see [`crate::Error`].
    pub fn decode(&self, bytes: &[u8]) -> Result<ClassDescriptor> {
        DescriptorBuilder::new(bytes, self.config.limits).build()
    }

    /// Decode `bytes` and register the class.
    ///
    /// # Errors
    /// Any decoding error, or a registry error such as [`crate::Error::DuplicateClass`]. On error
    /// nothing is registered.
    pub fn load_class(&self, bytes: &[u8]) -> Result<ClassHandle<'_>> {
        let descriptor = self.decode(bytes)?;
        self.register(descriptor)
    }

    /// Load the class file at `path`.
    ///
    /// The file is memory mapped for decoding; the descriptor owns copies of everything it keeps.
    ///
    /// # Errors
    /// [`crate::Error::FileError`] if the file cannot be opened or mapped, otherwise as
    /// [`ClassLoader::load_class`].
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ClassHandle<'_>> {
        let file = fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return self.load_class(&[]);
        }

        let map = unsafe { Mmap::map(&file) }?;
        self.load_class(&map)
    }

    /// Load many class files, decoding them in parallel.
    ///
    /// Results are returned in input order and classes are registered in input order, so the
    /// outcome matches calling [`ClassLoader::load_class`] on each file in turn.
    pub fn load_classes<B>(&self, files: &[B]) -> Vec<Result<ClassHandle<'_>>>
    where
        B: AsRef<[u8]> + Sync,
    {
        let decoded: Vec<Result<ClassDescriptor>> = files
            .par_iter()
            .map(|bytes| self.decode(bytes.as_ref()))
            .collect();

        decoded
            .into_iter()
            .map(|descriptor| self.register(descriptor?))
            .collect()
    }

    /// Look up a loaded class by exact name.
    #[must_use]
    pub fn find_class(&self, name: &str) -> Option<ClassHandle<'_>> {
        self.registry.find(name)
    }

    /// Resolve each type name of `ty`, looked up in `pool`, to a loaded class.
    ///
    /// Names that do not match a loaded class are reported as [`ResolvedType::Unresolved`]; a
    /// later call resolves them once the class is loaded.
    pub fn resolve_type<'p>(
        &self,
        ty: &TypeRef,
        pool: &'p ConstantPool,
    ) -> Vec<ResolvedType<'_, 'p>> {
        ty.tags()
            .iter()
            .map(|tag| match pool.get_str(usize::from(*tag)) {
                Some(name) => match self.find_class(name) {
                    Some(class) => ResolvedType::Class(class),
                    None => ResolvedType::Unresolved(name),
                },
                None => ResolvedType::NotAName(*tag),
            })
            .collect()
    }

    fn register(&self, descriptor: ClassDescriptor) -> Result<ClassHandle<'_>> {
        self.registry.register(descriptor)
    }
}

impl std::fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassLoader")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
