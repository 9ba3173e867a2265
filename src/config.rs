//! Loader and registry configuration
//!
//! [`LoaderConfig`] bundles the decode limits applied to every class file and the sizing of the
//! class registry. All values have conservative defaults; the builder-style setters allow
//! adjusting individual values, and [`LoaderConfig::validate`] is run by
//! [`crate::ClassLoader::new`] before any memory is reserved.
//!
//! # Examples
//!
//! ```rust
//! use glr::{DecodeLimits, LoaderConfig, RegistryConfig};
//!
//! let config = LoaderConfig::default()
//!     .with_limits(DecodeLimits::default().with_max_methods(128))
//!     .with_registry(RegistryConfig::default().with_initial_slots(16));
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.limits.max_methods, 128);
//! ```

use crate::{Error, Result};

/// Size of one registry slot in bytes.
pub(crate) const SLOT_SIZE: usize = std::mem::size_of::<u64>();

/// Caps applied while decoding a single class file.
///
/// Counts above a cap are rejected before anything is allocated for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum number of constant pool entries (default: 65536, every index a `u16` can address)
    pub max_constants: usize,
    /// Maximum number of fields per class (default: 4096)
    pub max_fields: usize,
    /// Maximum number of methods per class (default: 4096)
    pub max_methods: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_constants: 65_536,
            max_fields: 4_096,
            max_methods: 4_096,
        }
    }
}

impl DecodeLimits {
    /// Limits that accept everything the wire format can express.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_constants: usize::MAX,
            max_fields: usize::MAX,
            max_methods: usize::MAX,
        }
    }

    /// Set the maximum constant pool size.
    #[must_use]
    pub fn with_max_constants(mut self, max: usize) -> Self {
        self.max_constants = max;
        self
    }

    /// Set the maximum field count.
    #[must_use]
    pub fn with_max_fields(mut self, max: usize) -> Self {
        self.max_fields = max;
        self
    }

    /// Set the maximum method count.
    #[must_use]
    pub fn with_max_methods(mut self, max: usize) -> Self {
        self.max_methods = max;
        self
    }
}

/// Sizing of the class registry's slot table.
///
/// The registry reserves address space for `max_slots` slots up front and commits pages as the
/// table doubles from `initial_slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Slot count of a fresh registry, a power of two (default: 64)
    pub initial_slots: usize,
    /// Largest slot count the table may grow to, a power of two (default: 4M slots, 32 MiB)
    pub max_slots: usize,
    /// Occupancy in percent above which the table doubles (default: 70)
    pub load_factor_percent: u8,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_slots: 64,
            max_slots: 1 << 22,
            load_factor_percent: 70,
        }
    }
}

impl RegistryConfig {
    /// Set the initial slot count.
    #[must_use]
    pub fn with_initial_slots(mut self, slots: usize) -> Self {
        self.initial_slots = slots;
        self
    }

    /// Set the maximum slot count.
    #[must_use]
    pub fn with_max_slots(mut self, slots: usize) -> Self {
        self.max_slots = slots;
        self
    }

    /// Set the load factor in percent.
    #[must_use]
    pub fn with_load_factor(mut self, percent: u8) -> Self {
        self.load_factor_percent = percent;
        self
    }

    /// Number of bytes to reserve for the slot table.
    #[must_use]
    pub fn reservation_size(&self) -> usize {
        self.max_slots.saturating_mul(SLOT_SIZE)
    }

    /// Check the sizing for consistency.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if a slot count is zero or not a power of two, if
    /// `initial_slots` exceeds `max_slots`, if the table would not fit into 32-bit slot ids, or
    /// if the load factor is outside `1..=95`.
    pub fn validate(&self) -> Result<()> {
        if !self.initial_slots.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "initial_slots must be a power of two, got {}",
                self.initial_slots
            )));
        }

        if !self.max_slots.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "max_slots must be a power of two, got {}",
                self.max_slots
            )));
        }

        if self.initial_slots > self.max_slots {
            return Err(Error::InvalidConfig(format!(
                "initial_slots ({}) exceeds max_slots ({})",
                self.initial_slots, self.max_slots
            )));
        }

        if self.max_slots > (1 << 31) {
            return Err(Error::InvalidConfig(format!(
                "max_slots ({}) exceeds the 2^31 slot limit",
                self.max_slots
            )));
        }

        if !(1..=95).contains(&self.load_factor_percent) {
            return Err(Error::InvalidConfig(format!(
                "load_factor_percent must be within 1..=95, got {}",
                self.load_factor_percent
            )));
        }

        Ok(())
    }
}

/// Complete configuration of a [`crate::ClassLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderConfig {
    /// Limits applied to every decoded class file
    pub limits: DecodeLimits,
    /// Sizing of the class registry
    pub registry: RegistryConfig,
}

impl LoaderConfig {
    /// Replace the decode limits.
    #[must_use]
    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the registry sizing.
    #[must_use]
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Check the configuration for consistency.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the registry sizing is invalid.
    pub fn validate(&self) -> Result<()> {
        self.registry.validate()
    }
}
