// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'memory/page.rs' maps anonymous memory for the registry table
// - 'registry/table.rs' views committed table pages as a slice of slot words
// - 'loader.rs' uses mmap to map a class file into memory

//! # glr
//!
//! The class-loading core of a small managed runtime. `glr` decodes compact binary class files
//! into owned descriptors and keeps every loaded class in a concurrent registry backed by a
//! reserve-then-commit virtual memory arena.
//!
//! ## Features
//!
//! - **Strict decoding** - every read is bounds checked, truncated or malformed input is rejected
//!   with a precise [`Error`], never a panic
//! - **Owned descriptors** - a decoded class owns its constant pool and method bodies, the input
//!   buffer can be dropped right after loading
//! - **Robin-Hood registry** - open addressing with 32-bit FNV-1a hashes, a 70% load factor and
//!   growth in place inside a single address-space reservation
//! - **Stable handles** - a [`ClassHandle`] stays valid across registry growth
//! - **Parallel batches** - [`ClassLoader::load_classes`] decodes many files in parallel and
//!   registers them in input order
//!
//! ## Quick Start
//!
//! ```rust
//! use glr::prelude::*;
//!
//! let loader = ClassLoader::new(LoaderConfig::default())?;
//!
//! let mut writer = ClassFileWriter::named("Point", ClassKind::Struct, AccessFlags::PUB);
//! writer
//!     .field(AccessFlags::PUB, "x", &["f64"])?
//!     .field(AccessFlags::PUB, "y", &["f64"])?
//!     .method(AccessFlags::PUB, CallKind::Call, "length", &[], &[0x00])?;
//!
//! let point = loader.load_class(&writer.build())?;
//! assert_eq!(point.fields.len(), 2);
//! assert_eq!(loader.find_class("Point").map(|class| class.id()), Some(point.id()));
//! # Ok::<(), glr::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`classfile`] - byte cursor, constant pool, descriptor builder, writer and opcode tables
//! - [`memory`] - page mapping and the growable [`memory::VirtualArena`]
//! - [`registry`] - the concurrent [`ClassRegistry`] and its slot table
//! - [`loader`] - the [`ClassLoader`] entry point
//! - [`config`] - decode limits and registry sizing
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Class File Format
//!
//! All integers are little endian; counts are LEB128 varints.
//!
//! ```text
//! magic      "$GLR"
//! version    u8
//! header     u8          bits 0..=5 access, bits 6..=7 kind
//! constants  varint n, then n tagged constants
//! fields     varint n, then n fields
//! methods    varint n, then n methods
//! ```
//!
//! Constant 0 names the class. Members refer to constants by `u16` index.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use glr::prelude::*;
///
/// let loader = ClassLoader::new(LoaderConfig::default())?;
/// assert!(loader.registry().is_empty());
/// # Ok::<(), glr::Error>(())
/// ```
pub mod prelude;

/// Class file decoding and encoding.
///
/// The decoding path is [`classfile::Parser`] (the byte cursor), [`classfile::ConstantPool`]
/// and [`classfile::DescriptorBuilder`], producing a [`classfile::ClassDescriptor`].
/// [`classfile::ClassFileWriter`] produces the same format.
pub mod classfile;

/// Loader, decoder and registry configuration.
pub mod config;

/// The class loader entry point.
pub mod loader;

/// Virtual memory management: reserved address ranges that commit pages on demand.
pub mod memory;

/// The concurrent class registry.
pub mod registry;

/// `glr` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use glr::{ClassLoader, LoaderConfig, Result};
///
/// fn empty_loader() -> Result<ClassLoader> {
///     ClassLoader::new(LoaderConfig::default())
/// }
/// # empty_loader().unwrap();
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `glr` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use glr::{ClassLoader, Error, LoaderConfig};
///
/// let loader = ClassLoader::new(LoaderConfig::default())?;
/// match loader.load_class(b"XGLR\x01\x01\x00\x00\x00") {
///     Err(Error::BadMagic(magic)) => assert_eq!(&magic, b"XGLR"),
///     other => panic!("unexpected {:?}", other),
/// }
/// # Ok::<(), glr::Error>(())
/// ```
pub use error::Error;

/// Low-level byte cursor used by the class file decoder.
///
/// # Example
///
/// ```rust
/// use glr::Parser;
///
/// let mut parser = Parser::new(&[0xE5, 0x8E, 0x26]);
/// assert_eq!(parser.read_varint()?, 624_485);
/// assert!(!parser.has_more_data());
/// # Ok::<(), glr::Error>(())
/// ```
pub use classfile::parser::Parser;

/// Main entry point for loading classes.
pub use loader::{ClassLoader, ResolvedType};

/// Configuration types.
pub use config::{DecodeLimits, LoaderConfig, RegistryConfig};

/// Registry types.
pub use registry::{ClassHandle, ClassId, ClassRegistry};

/// Decoded class descriptor.
pub use classfile::ClassDescriptor;
